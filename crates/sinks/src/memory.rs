//! In-memory capturing sink
//!
//! Captures every accepted message and can be scripted to return Busy or
//! Fatal outcomes, which makes backpressure paths testable without a
//! broker. Not intended for production use.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::{SendOutcome, Sink};

/// Sink that captures messages in memory
///
/// By default every send is accepted. `script` queues outcomes that are
/// consumed one per `try_send` before acceptance resumes.
#[derive(Default)]
pub struct MemorySink {
    captured: Mutex<Vec<(String, Bytes)>>,
    script: Mutex<VecDeque<SendOutcome>>,
    polls: AtomicU64,
    poll_time: Mutex<Duration>,
}

impl MemorySink {
    /// Create an empty sink that accepts everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue outcomes returned by the next `try_send` calls
    pub fn script(&self, outcomes: impl IntoIterator<Item = SendOutcome>) {
        self.script.lock().extend(outcomes);
    }

    /// Messages accepted so far, in send order
    pub fn captured(&self) -> Vec<(String, Bytes)> {
        self.captured.lock().clone()
    }

    /// Number of accepted messages
    pub fn captured_len(&self) -> usize {
        self.captured.lock().len()
    }

    /// Payloads accepted under the given key, in send order
    pub fn payloads_for(&self, key: &str) -> Vec<Bytes> {
        self.captured
            .lock()
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, p)| p.clone())
            .collect()
    }

    /// Number of `poll` calls made against this sink
    pub fn poll_count(&self) -> u64 {
        self.polls.load(Ordering::Relaxed)
    }

    /// Total poll budget granted across all `poll` calls
    pub fn poll_time(&self) -> Duration {
        *self.poll_time.lock()
    }
}

#[async_trait]
impl Sink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn try_send(&self, key: &str, payload: Bytes) -> SendOutcome {
        if let Some(outcome) = self.script.lock().pop_front() {
            if outcome != SendOutcome::Accepted {
                return outcome;
            }
        }
        self.captured.lock().push((key.to_string(), payload));
        SendOutcome::Accepted
    }

    async fn poll(&self, budget: Duration) {
        self.polls.fetch_add(1, Ordering::Relaxed);
        *self.poll_time.lock() += budget;
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod memory_test;
