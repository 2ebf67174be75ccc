//! Durable catalog store.
//!
//! CRUD plus the specific read patterns the reminder engine needs, as async
//! functions over a SeaORM connection:
//!
//! - `customers` / `products` / `subscriptions` - admin-facing catalog state
//! - `sends` - the daily send guard and the legacy per-threshold audit
//! - `settings` - the raw key/value documents (typed view in
//!   [`crate::settings`])

pub mod customers;
pub mod products;
pub mod sends;
pub mod settings;
pub mod subscriptions;
