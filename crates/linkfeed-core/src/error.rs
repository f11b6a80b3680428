//! Error types for linkfeed.

use thiserror::Error;

/// Result type alias using linkfeed's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for linkfeed operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP/network request to the upstream page failed
    #[error("Request error: {0}")]
    Request(String),

    /// Upstream content could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Sort field is not one of the store's sortable columns
    #[error("Unknown sort field: {0}")]
    UnknownSortField(String),

    /// The update scheduler is no longer running
    #[error("Update scheduler is not running")]
    SchedulerStopped,

    /// An operation exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Config(e.to_string())
    }
}
