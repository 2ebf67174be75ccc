use std::sync::Arc;

use migration::{Migrator, MigratorTrait};
use renewal_reminder::AppResources;
use renewal_reminder::config::load_config_or_panic;
use renewal_reminder::mailer::SmtpMailer;
use renewal_reminder::reminder::run_scan_loop;
use renewal_reminder::settings;
use sea_orm::Database;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "renewal_reminder=info,sea_orm=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install().expect("Failed to install `color_eyre::install`");
    initialize_tracing();
    let _ = dotenvy::dotenv();

    let config = Arc::new(load_config_or_panic());

    let db = Arc::new(
        Database::connect(&config.database_url)
            .await
            .expect("Failed to connect to database"),
    );

    // The legacy upgrade must land before anything reads the catalog; a
    // half-migrated schema is unsafe to run against.
    Migrator::up(db.as_ref(), None)
        .await
        .expect("Migration failed; refusing to start on a partial schema");

    settings::ensure_defaults(db.as_ref())
        .await
        .expect("Failed to seed default settings");

    let mailer = Arc::new(
        SmtpMailer::from_config(&config.smtp).expect("Failed to build the SMTP transport"),
    );

    let resources = Arc::new(AppResources {
        db,
        mailer,
        config,
    });

    tracing::info!(
        interval_minutes = resources.config.scan_interval_minutes,
        timezone = %resources.config.timezone,
        "starting reminder scan loop"
    );
    run_scan_loop(resources).await;
    Ok(())
}
