//! Pipeline error types

use std::time::Duration;

use thiserror::Error;

use crate::session::SessionHandle;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors from session and buffer operations
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A record cannot fit within the configured bound
    #[error("record of {size} bytes exceeds bound of {bound} bytes")]
    RecordTooLarge {
        /// Encoded record size
        size: usize,
        /// Configured bound
        bound: usize,
    },

    /// A session with this handle is already open
    #[error("session {0} is already open")]
    DuplicateHandle(SessionHandle),

    /// No open session with this handle
    #[error("no open session {0}")]
    UnknownHandle(SessionHandle),

    /// A closing session's worker did not finish within the ceiling
    #[error("session {handle} worker still draining after {waited:?}")]
    ShutdownTimeout {
        /// Session being closed
        handle: SessionHandle,
        /// Time waited before giving up
        waited: Duration,
    },

    /// Record stream error
    #[error(transparent)]
    Protocol(tracepipe_protocol::ProtocolError),
}

impl From<tracepipe_protocol::ProtocolError> for PipelineError {
    fn from(err: tracepipe_protocol::ProtocolError) -> Self {
        match err {
            tracepipe_protocol::ProtocolError::RecordExceedsBound { size, bound } => {
                Self::RecordTooLarge { size, bound }
            }
            other => Self::Protocol(other),
        }
    }
}
