//! Error types for cardplay-engine
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for cardplay-engine
#[derive(Error, Debug)]
pub enum Error {
    /// Errors from the shared library (configuration, parsing, I/O)
    #[error(transparent)]
    Common(#[from] cardplay_common::Error),

    /// Malformed trace line in the simulator input
    #[error("Trace error at line {line}: {message}")]
    Trace { line: usize, message: String },

    /// Scheduler background task failed
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using cardplay-engine Error
pub type Result<T> = std::result::Result<T, Error>;
