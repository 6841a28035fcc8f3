//! Protocol error types

use thiserror::Error;

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors that can occur when encoding or scanning record streams
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The region ends in the middle of a record
    #[error("truncated record at offset {offset}: header declares {declared} bytes, {remaining} remain")]
    Truncated {
        /// Byte offset of the record header
        offset: usize,
        /// Payload length the header declares (0 if the header itself is cut)
        declared: usize,
        /// Bytes remaining in the region after the header position
        remaining: usize,
    },

    /// A record's encoded size exceeds the configured bound
    #[error("record size {size} exceeds bound {bound}")]
    RecordExceedsBound {
        /// Encoded record size (header included)
        size: usize,
        /// The configured bound
        bound: usize,
    },
}

impl ProtocolError {
    /// Create a truncated-record error
    #[inline]
    pub fn truncated(offset: usize, declared: usize, remaining: usize) -> Self {
        Self::Truncated {
            offset,
            declared,
            remaining,
        }
    }
}
