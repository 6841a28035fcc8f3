//! Null Sink - discards all data
//!
//! Accepts every message and throws it away while still counting it.
//! Useful for benchmarking the pipeline without a broker and for
//! running with persistence disabled.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracepipe_metrics::{SinkMetrics, SinkMetricsProvider, SinkMetricsSnapshot};

use crate::{SendOutcome, Sink};

/// Sink that counts and discards every message
pub struct NullSink {
    name: String,
    metrics: Arc<SinkMetrics>,
}

impl NullSink {
    /// Create a new null sink
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metrics: Arc::new(SinkMetrics::new()),
        }
    }

    /// Get a metrics handle for reporting
    pub fn metrics_handle(&self) -> NullSinkMetricsHandle {
        NullSinkMetricsHandle {
            id: self.name.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl Default for NullSink {
    fn default() -> Self {
        Self::new("null")
    }
}

#[async_trait]
impl Sink for NullSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_send(&self, _key: &str, payload: Bytes) -> SendOutcome {
        self.metrics.record_enqueued();
        self.metrics.record_written(payload.len() as u64);
        SendOutcome::Accepted
    }

    async fn poll(&self, _budget: Duration) {}
}

/// Handle for accessing null sink metrics
#[derive(Clone)]
pub struct NullSinkMetricsHandle {
    id: String,
    metrics: Arc<SinkMetrics>,
}

impl SinkMetricsProvider for NullSinkMetricsHandle {
    fn sink_id(&self) -> &str {
        &self.id
    }

    fn sink_type(&self) -> &str {
        "null"
    }

    fn snapshot(&self) -> SinkMetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_and_counts() {
        let sink = NullSink::default();

        assert_eq!(
            sink.try_send("trace", Bytes::from_static(b"abcd")),
            SendOutcome::Accepted
        );
        assert_eq!(
            sink.try_send("trace", Bytes::from_static(b"ef")),
            SendOutcome::Accepted
        );

        let snapshot = sink.metrics_handle().snapshot();
        assert_eq!(snapshot.messages_written, 2);
        assert_eq!(snapshot.bytes_written, 6);
        assert_eq!(snapshot.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_poll_is_immediate() {
        let sink = NullSink::default();
        tokio::time::timeout(Duration::from_millis(50), sink.poll(Duration::from_secs(60)))
            .await
            .expect("null sink poll must not block");
    }
}
