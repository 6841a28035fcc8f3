//! Framer - slices a record region into bounded messages
//!
//! The framer scans a drained buffer's concatenated records left to
//! right and packs whole records greedily into messages whose wire size
//! never exceeds the configured bound. A record is never split across
//! two messages and records are never reordered.
//!
//! A single record whose encoded size exceeds the bound cannot be
//! framed at all: it is skipped and counted, and the scan continues
//! with the next record. Callers surface the `oversized()` count as
//! framing drops.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use tracepipe_protocol::{encode_record, Framer};
//!
//! let mut buf = BytesMut::new();
//! encode_record(&mut buf, &[0u8; 16]); // 20 encoded bytes
//! encode_record(&mut buf, &[1u8; 16]);
//! encode_record(&mut buf, &[2u8; 16]);
//!
//! let frames: Vec<_> = Framer::new(&buf, 50).collect();
//! assert_eq!(frames.len(), 2);
//! assert_eq!(frames[0].record_count(), 2); // 40 bytes
//! assert_eq!(frames[1].record_count(), 1); // 20 bytes
//! ```

use crate::record::HEADER_LEN;

/// One framed message: an ordered run of whole encoded records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    bytes: &'a [u8],
    records: usize,
}

impl<'a> Frame<'a> {
    /// The message's wire bytes (concatenated encoded records)
    #[inline]
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Wire size of the message
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if the message holds no records
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of whole records in the message
    #[inline]
    pub fn record_count(&self) -> usize {
        self.records
    }
}

/// Result of probing for a record at an offset
enum Probe {
    /// A whole record of the given encoded length starts here
    Record(usize),
    /// The region is exhausted
    Exhausted,
    /// The region ends mid-record
    Truncated,
}

/// Lazy greedy framer over a concatenated record region
///
/// Implements `Iterator`, producing one `Frame` at a time; the scan is
/// restartable in the sense that each `next()` call does a bounded
/// amount of work. Packing is deterministic: a record is appended to
/// the current message while `message_len + record_len <= bound`, and
/// the first record that would overflow closes the message and opens
/// the next one.
#[derive(Debug)]
pub struct Framer<'a> {
    data: &'a [u8],
    bound: usize,
    offset: usize,
    oversized: u64,
    truncated: bool,
}

impl<'a> Framer<'a> {
    /// Create a framer over `data` with the given message size bound
    pub fn new(data: &'a [u8], bound: usize) -> Self {
        Self {
            data,
            bound,
            offset: 0,
            oversized: 0,
            truncated: false,
        }
    }

    /// Number of records dropped because they alone exceed the bound
    #[inline]
    pub fn oversized(&self) -> u64 {
        self.oversized
    }

    /// True if the region ended in the middle of a record
    #[inline]
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    fn probe(&self, pos: usize) -> Probe {
        let remaining = self.data.len() - pos;
        if remaining == 0 {
            return Probe::Exhausted;
        }
        if remaining < HEADER_LEN {
            return Probe::Truncated;
        }
        let header = &self.data[pos..pos + HEADER_LEN];
        let declared = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        if remaining < HEADER_LEN + declared {
            return Probe::Truncated;
        }
        Probe::Record(HEADER_LEN + declared)
    }
}

impl<'a> Iterator for Framer<'a> {
    type Item = Frame<'a>;

    fn next(&mut self) -> Option<Frame<'a>> {
        let data = self.data;

        loop {
            if self.offset >= data.len() {
                return None;
            }

            let start = self.offset;
            let mut records = 0usize;
            let mut hit_truncation = false;

            loop {
                match self.probe(self.offset) {
                    Probe::Exhausted => break,
                    Probe::Truncated => {
                        hit_truncation = true;
                        break;
                    }
                    Probe::Record(len) => {
                        if len > self.bound {
                            // A lone oversized record can never be framed.
                            // Only skip it when it would start a message;
                            // otherwise close the current message first and
                            // revisit it on the next call.
                            if records == 0 {
                                self.oversized += 1;
                                self.offset += len;
                            }
                            break;
                        }
                        if self.offset - start + len > self.bound {
                            break;
                        }
                        self.offset += len;
                        records += 1;
                    }
                }
            }

            if records > 0 {
                let frame = Frame {
                    bytes: &data[start..self.offset],
                    records,
                };
                if hit_truncation {
                    self.truncated = true;
                    self.offset = data.len();
                }
                return Some(frame);
            }

            if hit_truncation {
                self.truncated = true;
                self.offset = data.len();
                return None;
            }

            // No records and no truncation: either the region is exhausted
            // at `start`, or an oversized record was skipped and the scan
            // continues from the new offset.
            if self.offset == start {
                return None;
            }
        }
    }
}

#[cfg(test)]
#[path = "frame_test.rs"]
mod frame_test;
