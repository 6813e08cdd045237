//! Error types shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

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

/// Run-lock errors. Only contention under the `fail` policy stops a run.
#[derive(Error, Debug)]
pub enum LockError {
    #[error("lock {path} is held by live process {owner_pid}")]
    Contended { path: PathBuf, owner_pid: u32 },

    #[error("lock wait cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("{driver} failed: {message}")]
    Driver {
        driver: &'static str,
        message: String,
    },

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl Error {
    /// Shorthand for a failed external driver call.
    pub fn driver(driver: &'static str, message: impl Into<String>) -> Self {
        Self::Driver {
            driver,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
