//! Length-prefixed record encoding and scanning
//!
//! A record is `[u32 LE payload length][payload]`. Trace buffers hold
//! records concatenated back to back; `RecordIter` walks such a region
//! and yields each record with its offset, erroring if the region ends
//! mid-record.

use bytes::{BufMut, BytesMut};

use crate::error::{ProtocolError, Result};

/// Size of the record header (little-endian u32 payload length)
pub const HEADER_LEN: usize = 4;

/// Encoded size of a record with the given payload length
#[inline]
pub const fn encoded_len(payload_len: usize) -> usize {
    HEADER_LEN + payload_len
}

/// Append one encoded record to a buffer
#[inline]
pub fn encode_record(buf: &mut BytesMut, payload: &[u8]) {
    buf.put_u32_le(payload.len() as u32);
    buf.put_slice(payload);
}

/// One record within a concatenated record region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    /// Byte offset of the record header within the region
    pub offset: usize,
    /// The record payload (header excluded)
    pub payload: &'a [u8],
}

impl Record<'_> {
    /// Encoded size of this record (header included)
    #[inline]
    pub fn encoded_len(&self) -> usize {
        encoded_len(self.payload.len())
    }
}

/// Iterator over the records of a concatenated region
///
/// Yields records in offset order. If the region ends in the middle of
/// a record the iterator yields one `Err` and then terminates - a
/// well-formed trace buffer only ever contains whole records, so a
/// truncated tail indicates writer corruption.
#[derive(Debug)]
pub struct RecordIter<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> RecordIter<'a> {
    /// Create an iterator over `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Current scan offset
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = Result<Record<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = self.data.len() - self.offset;
        if remaining == 0 {
            return None;
        }

        if remaining < HEADER_LEN {
            let offset = self.offset;
            self.offset = self.data.len();
            return Some(Err(ProtocolError::truncated(offset, 0, remaining)));
        }

        let header = &self.data[self.offset..self.offset + HEADER_LEN];
        let declared = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;

        if remaining < HEADER_LEN + declared {
            let offset = self.offset;
            self.offset = self.data.len();
            return Some(Err(ProtocolError::truncated(offset, declared, remaining)));
        }

        let start = self.offset + HEADER_LEN;
        let record = Record {
            offset: self.offset,
            payload: &self.data[start..start + declared],
        };
        self.offset = start + declared;
        Some(Ok(record))
    }
}

/// Validate the record sizes a source declares at open time
///
/// `sizes` are encoded record sizes (header included). Returns the first
/// size that exceeds `bound`, if any. A source whose records cannot all
/// fit the bound must be rejected before a session is created - the
/// framer would otherwise have to drop those records on every cycle.
pub fn validate_record_sizes(sizes: &[usize], bound: usize) -> Result<()> {
    for &size in sizes {
        if size > bound {
            return Err(ProtocolError::RecordExceedsBound { size, bound });
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "record_test.rs"]
mod record_test;
