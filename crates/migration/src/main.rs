use config::Config;
use sea_orm_migration::prelude::*;
use std::env;

#[tokio::main]
async fn main() {
    // The CLI honours DATABASE_URL; when unset, fall back to the server's
    // config.yaml so `cargo run -p migration` works from a deployment dir.
    if env::var("DATABASE_URL").is_err() {
        let file = Config::builder()
            .add_source(config::File::with_name("config.yaml"))
            .build();
        if let Ok(settings) = file {
            if let Ok(url) = settings.get_string("database_url") {
                env::set_var("DATABASE_URL", url);
            }
        }
    }
    cli::run_cli(migration::Migrator).await;
}
