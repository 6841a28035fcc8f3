//! Tracepipe record protocol
//!
//! Defines the wire format for trace records and the framing logic that
//! slices a drained buffer into bounded messages for the distributed log.
//!
//! # Wire Format
//!
//! Each record is length-prefixed:
//!
//! ```text
//! [4 bytes: payload length (little-endian u32)][N bytes: payload]
//! ```
//!
//! Records are concatenated back to back in trace buffers. The payload
//! encoding is opaque to this crate - records only need to be
//! length-delimited so the framer can pack them into messages without
//! ever splitting one across a message boundary.

mod error;
mod frame;
mod record;

pub use error::{ProtocolError, Result};
pub use frame::{Frame, Framer};
pub use record::{
    encode_record, encoded_len, validate_record_sizes, Record, RecordIter, HEADER_LEN,
};

/// Message key under which steady-state trace data is published.
pub const TRACE_KEY: &str = "trace";

/// Message key under which one-time session metadata is published.
pub const SESSION_KEY: &str = "session";
