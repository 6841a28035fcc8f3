//! Double buffer for trace records
//!
//! A [`BufferPair`] holds an active half that producers append encoded
//! records to and a spare half waiting to take its place. The worker
//! swaps the halves, drains the now-inactive half off to the side, and
//! returns it with [`BufferPair::recycle`] once persisted. Producers
//! only ever touch the active half, so a swap is a pointer exchange
//! under the lock, never a copy.
//!
//! A write that does not fit in the active half is dropped and counted.
//! The drop and error counters cover the period since the previous
//! swap and travel with the drained half.

use std::time::SystemTime;

use bytes::BytesMut;
use parking_lot::Mutex;
use tracepipe_protocol::{encode_record, encoded_len};

/// One drained buffer half with the stats captured at the swap
#[derive(Debug)]
pub struct DrainedBuffer {
    /// Concatenated encoded records
    pub data: BytesMut,
    /// Records dropped for lack of space since the previous swap
    pub drops: u64,
    /// Errors observed since the previous swap
    pub errors: u64,
    /// When the swap happened
    pub captured_at: SystemTime,
}

impl DrainedBuffer {
    /// True if nothing was recorded since the previous swap
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.drops == 0 && self.errors == 0
    }
}

struct Inner {
    active: BytesMut,
    /// Spare half; None while the drained half is out being persisted
    spare: Option<BytesMut>,
    drops: u64,
    errors: u64,
}

/// Double buffer shared between a producer and its worker
pub struct BufferPair {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl BufferPair {
    /// Create a pair with the given per-half capacity in bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner {
                active: BytesMut::with_capacity(capacity),
                spare: Some(BytesMut::with_capacity(capacity)),
                drops: 0,
                errors: 0,
            }),
        }
    }

    /// Per-half capacity in bytes
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append one record to the active half
    ///
    /// Returns false if the encoded record does not fit in the space
    /// remaining; the record is dropped and counted.
    pub fn write(&self, payload: &[u8]) -> bool {
        let needed = encoded_len(payload.len());
        let mut inner = self.inner.lock();

        if inner.active.len() + needed > self.capacity {
            inner.drops += 1;
            return false;
        }

        encode_record(&mut inner.active, payload);
        true
    }

    /// Count an error observed by the producer
    pub fn record_error(&self) {
        self.inner.lock().errors += 1;
    }

    /// Bytes currently in the active half
    pub fn active_len(&self) -> usize {
        self.inner.lock().active.len()
    }

    /// Swap the halves and take the drained half
    ///
    /// The spare half becomes active. If the previously drained half has
    /// not been recycled yet, a fresh half is allocated; with a single
    /// worker per pair this does not happen.
    pub fn swap(&self) -> DrainedBuffer {
        let mut inner = self.inner.lock();

        let fresh = inner
            .spare
            .take()
            .unwrap_or_else(|| BytesMut::with_capacity(self.capacity));
        let data = std::mem::replace(&mut inner.active, fresh);
        let drops = std::mem::take(&mut inner.drops);
        let errors = std::mem::take(&mut inner.errors);

        DrainedBuffer {
            data,
            drops,
            errors,
            captured_at: SystemTime::now(),
        }
    }

    /// Return a drained half for reuse as the next spare
    pub fn recycle(&self, mut half: BytesMut) {
        half.clear();
        self.inner.lock().spare = Some(half);
    }
}

#[cfg(test)]
#[path = "buffer_test.rs"]
mod buffer_test;
