//! Periodic metrics reporter
//!
//! Collects snapshots from the session registry and registered sinks at
//! the configured interval and emits them as structured log events. Runs
//! as an async task until cancelled.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracepipe_config::MetricsConfig;
use tracing::info;

use crate::{SessionMetricsSnapshot, SinkMetricsProvider};

/// Source of per-session snapshots
///
/// Sessions open and close at runtime, so the reporter asks for the live
/// set on every tick rather than holding a provider per session. The
/// session manager implements this over its registry.
pub trait SessionMetricsSource: Send + Sync {
    /// Snapshots of all currently registered sessions, keyed by handle
    fn session_snapshots(&self) -> Vec<(u64, SessionMetricsSnapshot)>;
}

/// Builder for constructing a Reporter
#[derive(Default)]
pub struct ReporterBuilder {
    config: Option<MetricsConfig>,
    sessions: Option<Arc<dyn SessionMetricsSource>>,
    sinks: Vec<Arc<dyn SinkMetricsProvider>>,
}

impl ReporterBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the metrics configuration
    pub fn config(mut self, config: MetricsConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the session snapshot source
    pub fn sessions(mut self, source: Arc<dyn SessionMetricsSource>) -> Self {
        self.sessions = Some(source);
        self
    }

    /// Register a sink metrics provider
    pub fn sink(mut self, provider: Arc<dyn SinkMetricsProvider>) -> Self {
        self.sinks.push(provider);
        self
    }

    /// Build the Reporter
    pub fn build(self) -> Reporter {
        Reporter {
            config: self.config.unwrap_or_default(),
            sessions: self.sessions,
            sinks: self.sinks,
        }
    }
}

/// Periodic metrics reporter
///
/// Collects and reports metrics from the registry and sinks at a
/// configured interval.
pub struct Reporter {
    config: MetricsConfig,
    sessions: Option<Arc<dyn SessionMetricsSource>>,
    sinks: Vec<Arc<dyn SinkMetricsProvider>>,
}

impl Reporter {
    /// Create a new builder
    pub fn builder() -> ReporterBuilder {
        ReporterBuilder::new()
    }

    /// Run the reporter until cancellation
    ///
    /// This is the main entry point - spawn this as a tokio task.
    pub async fn run(self, cancel: CancellationToken) {
        if !self.config.enabled {
            info!("metrics reporting disabled");
            return;
        }

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(
            interval_secs = self.config.interval.as_secs(),
            "metrics reporter started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("metrics reporter shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.report();
                }
            }
        }
    }

    /// Collect and report metrics once
    fn report(&self) {
        if let Some(ref source) = self.sessions {
            for (handle, snapshot) in source.session_snapshots() {
                info!(
                    session = handle,
                    switches = snapshot.switches,
                    records_written = snapshot.records_written,
                    bytes_written = snapshot.bytes_written,
                    buffer_drops = snapshot.buffer_drops,
                    record_errors = snapshot.record_errors,
                    oversized_drops = snapshot.oversized_drops,
                    messages_sent = snapshot.messages_sent,
                    bytes_sent = snapshot.bytes_sent,
                    sink_retries = snapshot.sink_retries,
                    sink_failures = snapshot.sink_failures,
                    "session metrics"
                );
            }
        }

        for sink in &self.sinks {
            let snapshot = sink.snapshot();
            info!(
                sink = sink.sink_id(),
                kind = sink.sink_type(),
                messages_enqueued = snapshot.messages_enqueued,
                messages_written = snapshot.messages_written,
                bytes_written = snapshot.bytes_written,
                in_flight = snapshot.in_flight(),
                busy_rejections = snapshot.busy_rejections,
                write_errors = snapshot.write_errors,
                reconnects = snapshot.reconnects,
                "sink metrics"
            );
        }
    }
}
