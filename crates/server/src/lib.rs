//! Subscription renewal reminder service.
//!
//! Tracks customer subscriptions to catalog products and emails renewal
//! reminders before they expire. The reminder engine guarantees at most one
//! reminder per subscription per calendar day, with the calendar day defined
//! by the configured time zone.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::mailer::Mailer;

pub mod config;
pub mod entity;
pub mod error;
pub mod mailer;
pub mod render;
pub mod reminder;
pub mod settings;
pub mod store;

/// Shared handles threaded through the engine and the scan loop.
#[derive(Clone)]
pub struct AppResources {
    pub db: Arc<DatabaseConnection>,
    pub mailer: Arc<dyn Mailer>,
    pub config: Arc<AppConfig>,
}
