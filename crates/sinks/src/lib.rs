//! Persistence sinks for tracepipe
//!
//! A sink accepts keyed messages from the pipeline and persists them to a
//! destination. Acceptance is decoupled from delivery: `try_send` places a
//! message on the sink's internal queue without blocking, and a background
//! task drains the queue to the destination.
//!
//! # Architecture
//!
//! ```text
//! [Worker] --try_send(key, payload)--> [Sink Queue] --> [Writer Task] --> [Destination]
//! ```
//!
//! A full queue is reported as [`SendOutcome::Busy`], never silently
//! dropped. Callers are expected to run the retry loop in [`retry`],
//! which grants the sink a poll budget between attempts so the queue can
//! drain.
//!
//! # Available Sinks
//!
//! | Sink | Purpose |
//! |------|---------|
//! | `broker` | Length-prefixed TCP delivery to a message broker |
//! | `null` | Discard all data (for benchmarking) |
//! | `memory` | Capture messages in memory (for tests) |

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

/// Broker sink - length-prefixed TCP delivery
pub mod broker;

/// Null sink - discards all data (for benchmarking)
pub mod null;

/// Memory sink - captures messages for tests
pub mod memory;

/// Retry loop for Busy outcomes
pub mod retry;

mod error;

pub use broker::{broker, decode_frame_body, BrokerSink, BrokerSinkMetricsHandle, BrokerWriter};
pub use error::{Result, SinkError};
pub use memory::MemorySink;
pub use null::NullSink;
pub use retry::{send_with_retry, RetryPolicy};

/// Result of a non-blocking send attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Message accepted onto the sink's queue
    Accepted,
    /// Queue is full; the caller should poll and retry
    Busy,
    /// Sink can no longer accept messages
    Fatal,
}

/// A destination for pipeline messages
///
/// `try_send` never blocks. `poll` lets the sink make forward progress
/// for up to `budget` (e.g. wait for queue capacity) and is called by the
/// retry loop between attempts.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Sink name for logging
    fn name(&self) -> &str;

    /// Attempt to enqueue a keyed message without blocking
    fn try_send(&self, key: &str, payload: Bytes) -> SendOutcome;

    /// Give the sink time to make forward progress
    ///
    /// Returns once progress is possible or the budget is spent,
    /// whichever comes first.
    async fn poll(&self, budget: Duration);
}
