//! Metrics counter structs and provider traits
//!
//! Sessions and sinks own the counter structs and expose snapshots to the
//! reporter through the provider traits, so the reporter never needs to
//! know the concrete component types.
//!
//! # Design
//!
//! - Traits use `&self` for zero-copy metric access
//! - All providers are `Send + Sync` for thread-safe collection
//! - Counter structs use atomics internally, so no locks needed

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for one trace session
///
/// Tracks the full path of a record: written into the active buffer,
/// drained on a switch, framed into messages, handed to the sink.
/// All fields use atomics for lock-free updates.
#[derive(Debug, Default)]
pub struct SessionMetrics {
    /// Buffer switches performed
    pub switches: AtomicU64,
    /// Records accepted into the active buffer
    pub records_written: AtomicU64,
    /// Bytes accepted into the active buffer
    pub bytes_written: AtomicU64,
    /// Records dropped because the active buffer was full
    pub buffer_drops: AtomicU64,
    /// Errors observed while recording
    pub record_errors: AtomicU64,
    /// Records dropped at framing for exceeding the message bound
    pub oversized_drops: AtomicU64,
    /// Messages handed to the sink
    pub messages_sent: AtomicU64,
    /// Bytes handed to the sink
    pub bytes_sent: AtomicU64,
    /// Busy responses absorbed by the retry loop
    pub sink_retries: AtomicU64,
    /// Messages abandoned after the retry loop gave up
    pub sink_failures: AtomicU64,
}

impl SessionMetrics {
    /// Create new metrics with all counters at zero
    pub const fn new() -> Self {
        Self {
            switches: AtomicU64::new(0),
            records_written: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            buffer_drops: AtomicU64::new(0),
            record_errors: AtomicU64::new(0),
            oversized_drops: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            sink_retries: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
        }
    }

    /// Record a buffer switch
    #[inline]
    pub fn record_switch(&self) {
        self.switches.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an accepted write into the active buffer
    #[inline]
    pub fn record_write(&self, bytes: u64) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record writes rejected by a full buffer
    #[inline]
    pub fn record_buffer_drop(&self, count: u64) {
        self.buffer_drops.fetch_add(count, Ordering::Relaxed);
    }

    /// Record errors observed during tracing
    #[inline]
    pub fn record_error(&self, count: u64) {
        self.record_errors.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a record dropped at framing for exceeding the message bound
    #[inline]
    pub fn record_oversized_drop(&self, count: u64) {
        self.oversized_drops.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a message handed to the sink
    #[inline]
    pub fn record_message_sent(&self, bytes: u64) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a busy response absorbed by the retry loop
    #[inline]
    pub fn record_sink_retry(&self, attempts: u64) {
        self.sink_retries.fetch_add(attempts, Ordering::Relaxed);
    }

    /// Record a message abandoned after the retry loop gave up
    #[inline]
    pub fn record_sink_failure(&self) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a snapshot of current values
    #[inline]
    pub fn snapshot(&self) -> SessionMetricsSnapshot {
        SessionMetricsSnapshot {
            switches: self.switches.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            buffer_drops: self.buffer_drops.load(Ordering::Relaxed),
            record_errors: self.record_errors.load(Ordering::Relaxed),
            oversized_drops: self.oversized_drops.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            sink_retries: self.sink_retries.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of session metrics
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct SessionMetricsSnapshot {
    pub switches: u64,
    pub records_written: u64,
    pub bytes_written: u64,
    pub buffer_drops: u64,
    pub record_errors: u64,
    pub oversized_drops: u64,
    pub messages_sent: u64,
    pub bytes_sent: u64,
    pub sink_retries: u64,
    pub sink_failures: u64,
}

/// Metrics for a sink component
///
/// Sinks track enqueue, write, and connection statistics.
/// All fields use atomics for lock-free updates.
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Messages accepted into the send queue
    pub messages_enqueued: AtomicU64,
    /// Messages written to the backing transport
    pub messages_written: AtomicU64,
    /// Bytes written to the backing transport
    pub bytes_written: AtomicU64,
    /// Enqueue attempts rejected because the queue was full
    pub busy_rejections: AtomicU64,
    /// Write errors on the backing transport
    pub write_errors: AtomicU64,
    /// Reconnection attempts to the backing transport
    pub reconnects: AtomicU64,
}

impl SinkMetrics {
    /// Create new metrics with all counters at zero
    pub const fn new() -> Self {
        Self {
            messages_enqueued: AtomicU64::new(0),
            messages_written: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            busy_rejections: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
        }
    }

    /// Record a message accepted into the send queue
    #[inline]
    pub fn record_enqueued(&self) {
        self.messages_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a message written to the transport
    #[inline]
    pub fn record_written(&self, bytes: u64) {
        self.messages_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record an enqueue rejected by a full queue
    #[inline]
    pub fn record_busy(&self) {
        self.busy_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a write error
    #[inline]
    pub fn record_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a reconnection attempt
    #[inline]
    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a snapshot of current values
    #[inline]
    pub fn snapshot(&self) -> SinkMetricsSnapshot {
        SinkMetricsSnapshot {
            messages_enqueued: self.messages_enqueued.load(Ordering::Relaxed),
            messages_written: self.messages_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            busy_rejections: self.busy_rejections.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of sink metrics
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct SinkMetricsSnapshot {
    pub messages_enqueued: u64,
    pub messages_written: u64,
    pub bytes_written: u64,
    pub busy_rejections: u64,
    pub write_errors: u64,
    pub reconnects: u64,
}

impl SinkMetricsSnapshot {
    /// Messages accepted but not yet written
    #[inline]
    pub fn in_flight(&self) -> u64 {
        self.messages_enqueued.saturating_sub(self.messages_written)
    }
}

/// Trait for sinks to provide metrics to the reporter
///
/// Sinks can implement this directly or use an adapter.
/// The `snapshot()` method is the main requirement.
pub trait SinkMetricsProvider: Send + Sync {
    /// Unique identifier for this sink instance
    fn sink_id(&self) -> &str;

    /// Sink type (e.g., "broker", "null")
    fn sink_type(&self) -> &str;

    /// Get a snapshot of current metrics
    fn snapshot(&self) -> SinkMetricsSnapshot;
}
