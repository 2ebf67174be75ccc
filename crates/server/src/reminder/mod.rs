//! The expiration reminder engine.
//!
//! - `rules` - pure threshold selection for display
//! - `engine` - scan passes and single-subscription sends, enforcing the
//!   at-most-one-reminder-per-calendar-day guarantee
//! - `scheduler` - the periodic scan loop

pub mod engine;
pub mod rules;
pub mod scheduler;

pub use engine::{
    RenewalOutcome, ScanMode, ScanStats, SendOutcome, compute_renewal, renew_subscription,
    scan_and_send, send_renewal_confirm, send_subscription_now,
};
pub use rules::pick_display_rule;
pub use scheduler::run_scan_loop;
