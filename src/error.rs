//! Error types for joinprobe
//!
//! Fetch-time failures are classified separately (see [`crate::cursor::FetchError`]);
//! only the ones that abort a variant surface here.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// joinprobe error types
#[derive(Error, Debug)]
pub enum Error {
    /// Checkpoint schedule is empty, unsorted or contains zero
    #[error("Invalid checkpoint schedule: {0}")]
    InvalidSchedule(String),

    /// Sweep configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Template could not be parsed or rendered
    #[error("Template error: {0}")]
    Template(String),

    /// Variant parameter value or identifier is not safe to substitute
    #[error("Invalid parameter `{name}`: {value:?} (allowed: letters, digits, `_` and `.`)")]
    InvalidParameter {
        /// Parameter (or identifier) name
        name: String,
        /// Rejected value
        value: String,
    },

    /// Rendered query is not a single SQL query statement
    #[error("SQL parse error: {0}")]
    ParseError(String),

    /// Database connection lost while a variant was running (not retried)
    #[error("Database connection lost: {0}\nThe current variant is aborted; remaining variants will still be attempted.")]
    ConnectionLost(String),

    /// Query could not be prepared or executed
    #[error("Database error: {0}")]
    Database(String),

    /// Summary input is malformed
    #[error("Malformed summary line {line} in {path}: {reason}")]
    MalformedSummary {
        /// File the line came from
        path: String,
        /// 1-based line number
        line: usize,
        /// What was wrong with it
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (config or report) error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match crate::cursor::postgres::classify(&err) {
            crate::cursor::FetchError::ConnectionLost(msg) => Self::ConnectionLost(msg),
            other => Self::Database(other.to_string()),
        }
    }
}
