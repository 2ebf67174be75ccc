use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Store-level failures. Constraint and reference violations are the
/// caller's input to fix; `NotFound` is a missing id; anything else is a
/// database fault.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("invalid reference: {0}")]
    Reference(String),
    #[error(transparent)]
    Db(#[from] DbErr),
}

impl StoreError {
    /// Maps driver errors onto the taxonomy so callers can tell a duplicate
    /// natural key or a dangling foreign key apart from a genuine fault.
    pub fn classify(err: DbErr, context: &str) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(msg)) => {
                StoreError::Constraint(format!("{context}: {msg}"))
            }
            Some(SqlErr::ForeignKeyConstraintViolation(msg)) => {
                StoreError::Reference(format!("{context}: {msg}"))
            }
            _ => StoreError::Db(err),
        }
    }
}

/// Failures while loading or updating the persisted settings documents.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("settings document {key} is not valid JSON: {source}")]
    Json {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("reminder rule {0} is negative")]
    NegativeRule(i64),
    #[error("template does not parse: {0}")]
    Template(#[from] minijinja::Error),
}

/// Mail transport failures. Transport-level errors (including timeouts) are
/// retryable: the send is simply not marked and the next scan tries again.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("recipient address is empty")]
    EmptyRecipient,
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

impl MailError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, MailError::Smtp(_))
    }
}

/// Per-subscription failure inside a scan pass; folded into the scan
/// counters, never fatal to the batch.
#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("template render failed: {0}")]
    Render(#[from] minijinja::Error),
    #[error(transparent)]
    Mail(#[from] MailError),
}

/// Failure of an engine entry point as a whole (settings unreadable, store
/// unavailable, or a single-subscription send hitting the transport).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("template render failed: {0}")]
    Render(#[from] minijinja::Error),
    #[error(transparent)]
    Mail(#[from] MailError),
}

impl From<SendError> for EngineError {
    fn from(err: SendError) -> Self {
        match err {
            SendError::Store(e) => EngineError::Store(e),
            SendError::Render(e) => EngineError::Render(e),
            SendError::Mail(e) => EngineError::Mail(e),
        }
    }
}
