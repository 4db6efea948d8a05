//! Error types for ilert-zabbix-core

use thiserror::Error;

/// Main error type for the ilert-zabbix-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error (queue directory, event files, lockfile)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Queue lock could not be acquired or released
    #[error("lock error: {0}")]
    Lock(String),
}

/// Result type alias for ilert-zabbix-core
pub type Result<T> = std::result::Result<T, Error>;
