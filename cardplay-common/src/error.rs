//! Common error types for cardplay

use thiserror::Error;

/// Common result type for cardplay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across cardplay crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    ///
    /// Raised at load/update time only; the running scheduler never sees
    /// an invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed TOML or JSON input
    #[error("Parse error: {0}")]
    Parse(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}
