//! Sink error types

use std::io;
use thiserror::Error;

/// Result type for sink operations
pub type Result<T> = std::result::Result<T, SinkError>;

/// Errors from sink operations
#[derive(Debug, Error)]
pub enum SinkError {
    /// Write failed
    #[error("write failed: {0}")]
    Io(#[from] io::Error),

    /// Operation timed out
    #[error("operation timed out")]
    Timeout,

    /// Sink can no longer accept messages
    #[error("sink closed")]
    Closed,

    /// Connection failed
    #[error("connection failed to {target}: {source}")]
    ConnectionFailed {
        /// Destination address
        target: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Sink stayed busy through every retry attempt
    #[error("sink busy after {attempts} attempts")]
    Backpressure {
        /// Attempts made before giving up
        attempts: usize,
    },
}

impl SinkError {
    /// Create a ConnectionFailed error
    pub fn connection_failed(target: impl Into<String>, source: io::Error) -> Self {
        Self::ConnectionFailed {
            target: target.into(),
            source,
        }
    }
}
