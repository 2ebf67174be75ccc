use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, Deserialize)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub from: String,
    #[serde(default = "default_smtp_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    /// IANA zone defining the local calendar day for the daily send guard.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_company_name")]
    pub company_name: String,
    #[serde(default = "default_contact_name")]
    pub contact_name: String,
    #[serde(default = "default_contact_url")]
    pub contact_url: String,
    #[serde(default = "default_scan_interval_minutes")]
    pub scan_interval_minutes: u64,
    pub smtp: SmtpConfig,
}

impl AppConfig {
    /// The configured zone; validated at load, so the parse only falls back
    /// to UTC for hand-built configs that skipped validation.
    pub fn tz(&self) -> chrono_tz::Tz {
        self.timezone.parse().unwrap_or(chrono_tz::UTC)
    }
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_company_name() -> String {
    "YourCompany".to_string()
}

fn default_contact_name() -> String {
    "Support".to_string()
}

fn default_contact_url() -> String {
    "mailto:support@example.com".to_string()
}

fn default_scan_interval_minutes() -> u64 {
    15
}

fn default_smtp_timeout_seconds() -> u64 {
    30
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Environment variable override convention: any var matching the key path
/// separated by double underscores (e.g. `SMTP__PORT`) overrides the file
/// value.
///
/// Returns a `ConfigError` instead of panicking so the caller can decide how
/// to fail.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name("config.yaml"))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    validate(&app)?;
    Ok(app)
}

fn validate(app: &AppConfig) -> Result<(), ConfigError> {
    if app.timezone.parse::<chrono_tz::Tz>().is_err() {
        return Err(ConfigError::Validation(format!(
            "unknown timezone {:?}",
            app.timezone
        )));
    }
    if app.smtp.port == 0 {
        return Err(ConfigError::Validation("smtp.port must be > 0".into()));
    }
    if app.smtp.from.parse::<lettre::message::Mailbox>().is_err() {
        return Err(ConfigError::Validation(
            "smtp.from must be a valid mailbox".into(),
        ));
    }
    if app.scan_interval_minutes == 0 {
        return Err(ConfigError::Validation(
            "scan_interval_minutes must be >= 1".into(),
        ));
    }
    Ok(())
}

/// Convenience helper for binaries wanting the old panic-on-error behaviour.
pub fn load_config_or_panic() -> AppConfig {
    match load_config() {
        Ok(c) => c,
        Err(e) => panic!("Failed to load configuration: {e}"),
    }
}
