//! Periodic scan trigger.

use std::sync::Arc;

use tokio::time::{Duration, interval};
use tracing::{error, info};

use crate::AppResources;
use crate::reminder::engine;

/// Runs the automatic scan on the configured interval. Never returns; a
/// failed pass is logged and the next tick retries.
pub async fn run_scan_loop(resources: Arc<AppResources>) {
    let period = Duration::from_secs(resources.config.scan_interval_minutes * 60);
    let mut ticker = interval(period);
    loop {
        ticker.tick().await;
        match engine::scan_and_send(&resources, None).await {
            Ok(stats) => info!(
                mode = ?stats.mode,
                threshold_days = stats.threshold_days,
                checked = stats.checked_subscriptions,
                eligible = stats.eligible,
                already_sent_today = stats.skipped_already_sent_today,
                sent = stats.sent,
                errors = stats.errors,
                "reminder scan finished"
            ),
            Err(e) => error!(error = %e, "reminder scan failed"),
        }
    }
}
