//! Per-session persistence worker
//!
//! Each open session runs one worker task. The worker wakes on a fixed
//! period, swaps the session's buffer halves, frames the drained half
//! into bounded messages, and hands the messages to the sink under the
//! trace key. When the session's token is cancelled the worker performs
//! one final swap-and-drain so records written right up to close are
//! still persisted, then exits with a summary.
//!
//! On its first cycle the worker persists a one-time session metadata
//! message under the session key, so a consumer can associate the trace
//! stream with the session that produced it.
//!
//! # Design
//!
//! - The worker is the only task that swaps a given pair, so the
//!   drained half needs no further locking
//! - Every cycle grants the sink one zero-budget poll before the swap,
//!   backlog or not, so acknowledgement-driven sinks make progress
//! - A Busy sink is polled and retried via the shared retry loop;
//!   exhausting the retry budget counts a sink failure and moves on
//! - A record larger than the message bound can never be framed; the
//!   framer skips it and the worker counts it as an oversized drop

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracepipe_metrics::{SessionMetrics, SessionMetricsSnapshot};
use tracepipe_protocol::{Framer, SESSION_KEY, TRACE_KEY};
use tracepipe_sinks::{send_with_retry, RetryPolicy, Sink, SinkError};
use tracing::{debug, error, info, warn};

use crate::buffer::BufferPair;
use crate::session::SessionHandle;

/// Worker timing and framing parameters
#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    /// Period between buffer switches
    pub poll_period: Duration,
    /// Wire size bound for framed messages
    pub message_bound: usize,
    /// Retry policy for Busy sink responses
    pub retry: RetryPolicy,
}

/// Final account of a worker's run
#[derive(Debug, Clone, Copy)]
pub struct WorkerSummary {
    /// Session the worker served
    pub handle: SessionHandle,
    /// Metrics at exit
    pub metrics: SessionMetricsSnapshot,
    /// False if any message was abandoned or the sink closed
    pub clean: bool,
}

/// Persistence worker for one session
pub struct Worker {
    handle: SessionHandle,
    buffers: Arc<BufferPair>,
    metrics: Arc<SessionMetrics>,
    cancel: CancellationToken,
    sink: Arc<dyn Sink>,
    config: WorkerConfig,
    degraded: bool,
}

impl Worker {
    /// Create a worker over a session's buffers and metrics
    pub fn new(
        handle: SessionHandle,
        buffers: Arc<BufferPair>,
        metrics: Arc<SessionMetrics>,
        cancel: CancellationToken,
        sink: Arc<dyn Sink>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            handle,
            buffers,
            metrics,
            cancel,
            sink,
            config,
            degraded: false,
        }
    }

    /// Run until cancelled, then flush once and exit
    pub async fn run(mut self) -> WorkerSummary {
        info!(
            session = %self.handle,
            poll_period_ms = self.config.poll_period.as_millis() as u64,
            message_bound = self.config.message_bound,
            "session worker starting"
        );

        self.persist_metadata().await;

        let start = tokio::time::Instant::now() + self.config.poll_period;
        let mut ticker = tokio::time::interval_at(start, self.config.poll_period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => self.drain_cycle().await,
            }
        }

        // Final flush: records written up to the moment of cancellation
        // must still reach the sink
        self.drain_cycle().await;

        let snapshot = self.metrics.snapshot();
        info!(
            session = %self.handle,
            switches = snapshot.switches,
            messages_sent = snapshot.messages_sent,
            bytes_sent = snapshot.bytes_sent,
            buffer_drops = snapshot.buffer_drops,
            oversized_drops = snapshot.oversized_drops,
            sink_failures = snapshot.sink_failures,
            clean = !self.degraded,
            "session worker exiting"
        );

        WorkerSummary {
            handle: self.handle,
            metrics: snapshot,
            clean: !self.degraded,
        }
    }

    /// Persist the one-time session metadata message
    async fn persist_metadata(&mut self) {
        let opened_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let metadata = serde_json::json!({
            "handle": self.handle.raw(),
            "buffer_size": self.buffers.capacity(),
            "message_bound": self.config.message_bound,
            "poll_period_ms": self.config.poll_period.as_millis() as u64,
            "opened_at": opened_at,
        });
        let payload = Bytes::from(metadata.to_string());

        match send_with_retry(self.sink.as_ref(), &self.config.retry, SESSION_KEY, payload).await {
            Ok(busy) => {
                if busy > 0 {
                    self.metrics.record_sink_retry(busy as u64);
                }
                debug!(session = %self.handle, "session metadata persisted");
            }
            Err(e) => {
                self.degraded = true;
                warn!(
                    session = %self.handle,
                    error = %e,
                    "failed to persist session metadata"
                );
            }
        }
    }

    /// Swap the buffers and persist the drained half
    async fn drain_cycle(&mut self) {
        // Poll on every cycle, backlog or not, so a sink that depends on
        // caller-driven progress can drain delivery acknowledgements
        self.sink.poll(Duration::ZERO).await;

        let drained = self.buffers.swap();
        self.metrics.record_switch();

        if drained.drops > 0 {
            self.metrics.record_buffer_drop(drained.drops);
            warn!(
                session = %self.handle,
                drops = drained.drops,
                "records dropped by full buffer since last switch"
            );
        }
        if drained.errors > 0 {
            self.metrics.record_error(drained.errors);
        }

        if drained.data.is_empty() {
            self.buffers.recycle(drained.data);
            return;
        }

        let (oversized, truncated) = {
            let mut framer = Framer::new(&drained.data, self.config.message_bound);
            while let Some(frame) = framer.next() {
                self.persist_frame(frame.bytes(), frame.record_count()).await;
            }
            (framer.oversized(), framer.truncated())
        };

        if oversized > 0 {
            self.metrics.record_oversized_drop(oversized);
            warn!(
                session = %self.handle,
                dropped = oversized,
                bound = self.config.message_bound,
                "records too large for the message bound were dropped"
            );
        }
        if truncated {
            self.degraded = true;
            error!(
                session = %self.handle,
                "drained buffer ended mid-record, tail discarded"
            );
        }

        self.buffers.recycle(drained.data);
    }

    /// Persist one framed message under the trace key
    async fn persist_frame(&mut self, bytes: &[u8], records: usize) {
        let payload = Bytes::copy_from_slice(bytes);

        match send_with_retry(self.sink.as_ref(), &self.config.retry, TRACE_KEY, payload).await {
            Ok(busy) => {
                if busy > 0 {
                    self.metrics.record_sink_retry(busy as u64);
                }
                self.metrics.record_message_sent(bytes.len() as u64);
                debug!(
                    session = %self.handle,
                    records,
                    bytes = bytes.len(),
                    "message persisted"
                );
            }
            Err(SinkError::Backpressure { attempts }) => {
                self.degraded = true;
                self.metrics.record_sink_retry(attempts as u64);
                self.metrics.record_sink_failure();
                warn!(
                    session = %self.handle,
                    attempts,
                    records,
                    bytes = bytes.len(),
                    "message abandoned under sink backpressure"
                );
            }
            Err(e) => {
                self.degraded = true;
                self.metrics.record_sink_failure();
                error!(
                    session = %self.handle,
                    error = %e,
                    records,
                    "message lost, sink rejected it"
                );
            }
        }
    }
}

#[cfg(test)]
#[path = "worker_test.rs"]
mod worker_test;
