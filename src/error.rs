use thiserror::Error;

use crate::domain::error::DomainError;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Failures reported by the external point ledger.
///
/// The ledger is the authority on user balances; this core never mutates
/// balances directly. A failed credit during settlement must leave the
/// market in `Resolved` so a retry (idempotent via the credit key) is safe.
#[derive(Error, Debug, Clone)]
pub enum LedgerError {
    #[error("insufficient balance for user {user}: requested {requested}")]
    InsufficientBalance { user: String, requested: i64 },

    #[error("credit rejected for user {user} (key {key}): {reason}")]
    CreditRejected {
        user: String,
        key: String,
        reason: String,
    },

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl From<diesel::result::Error> for Error {
    fn from(e: diesel::result::Error) -> Self {
        Error::Database(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error is an expected outcome of concurrent settlement
    /// triggers rather than a real failure. The scheduler treats these as
    /// no-ops instead of logging them as errors.
    #[must_use]
    pub fn is_benign_race(&self) -> bool {
        matches!(
            self,
            Error::Domain(DomainError::AlreadySettled { .. })
                | Error::Domain(DomainError::InvalidState { .. })
        )
    }
}
