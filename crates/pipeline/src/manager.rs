//! Session manager
//!
//! Front door of the pipeline: opens sessions, routes producer writes
//! to the right buffer pair, and closes sessions with a bounded wait
//! for their workers to finish draining.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::time::timeout;
use tracepipe_config::PipelineConfig;
use tracepipe_metrics::{SessionMetricsSnapshot, SessionMetricsSource};
use tracepipe_protocol::{encoded_len, validate_record_sizes};
use tracepipe_sinks::{RetryPolicy, Sink};
use tracing::{error, info, warn};

use crate::error::{PipelineError, Result};
use crate::registry::SessionRegistry;
use crate::session::{Session, SessionHandle};
use crate::worker::{Worker, WorkerConfig, WorkerSummary};

/// Owns the registry and spawns one worker per session
pub struct SessionManager {
    config: PipelineConfig,
    sink: Arc<dyn Sink>,
    registry: SessionRegistry,
    retry: RetryPolicy,
}

impl SessionManager {
    /// Create a manager persisting to the given sink
    pub fn new(config: PipelineConfig, sink: Arc<dyn Sink>) -> Self {
        Self {
            config,
            sink,
            registry: SessionRegistry::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// Set the retry policy workers use against a busy sink
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Number of open sessions
    pub fn open_sessions(&self) -> usize {
        self.registry.len()
    }

    /// Open a session and start its worker
    ///
    /// `record_sizes` are the encoded record sizes the source declares
    /// it may produce; a source whose records cannot all fit the record
    /// bound is rejected before any state is created.
    pub fn open(&self, handle: SessionHandle, record_sizes: &[usize]) -> Result<()> {
        validate_record_sizes(record_sizes, self.config.record_bound)?;

        let session = Arc::new(Session::new(handle, self.config.buffer_size));
        let worker = Worker::new(
            handle,
            Arc::clone(session.buffers()),
            Arc::clone(session.metrics()),
            session.cancel_token().child_token(),
            Arc::clone(&self.sink),
            WorkerConfig {
                poll_period: self.config.poll_period,
                message_bound: self.config.message_bound,
                retry: self.retry,
            },
        );

        // The worker must be joinable the moment the session is visible
        // in the registry, so it is spawned and attached first, gated on
        // a start signal that only a committed registration sends. A
        // rejected registration drops the sender and the task exits
        // without ever touching the sink.
        let (started_tx, started_rx) = oneshot::channel::<()>();
        session.attach_worker(tokio::spawn(async move {
            if started_rx.await.is_err() {
                return WorkerSummary {
                    handle,
                    metrics: SessionMetricsSnapshot::default(),
                    clean: true,
                };
            }
            worker.run().await
        }));

        self.registry.insert(Arc::clone(&session))?;
        let _ = started_tx.send(());

        info!(
            session = %handle,
            buffer_size = self.config.buffer_size,
            record_bound = self.config.record_bound,
            "session opened"
        );
        Ok(())
    }

    /// Append one record to a session's active buffer
    ///
    /// Returns false if the buffer was full and the record was dropped.
    /// A record over the bound is an error, not a drop: the source
    /// promised at open time not to produce one.
    pub fn write(&self, handle: SessionHandle, payload: &[u8]) -> Result<bool> {
        let session = self
            .registry
            .get(handle)
            .ok_or(PipelineError::UnknownHandle(handle))?;

        let size = encoded_len(payload.len());
        if size > self.config.record_bound {
            return Err(PipelineError::RecordTooLarge {
                size,
                bound: self.config.record_bound,
            });
        }

        let accepted = session.buffers().write(payload);
        if accepted {
            session.metrics().record_write(payload.len() as u64);
        }
        Ok(accepted)
    }

    /// Count an error a producer observed on a session
    pub fn record_error(&self, handle: SessionHandle) -> Result<()> {
        let session = self
            .registry
            .get(handle)
            .ok_or(PipelineError::UnknownHandle(handle))?;
        session.buffers().record_error();
        Ok(())
    }

    /// Close a session, waiting up to the ceiling for its final flush
    ///
    /// The session leaves the registry either way; a worker that blows
    /// through the ceiling keeps draining detached, but the handle is
    /// immediately reusable.
    pub async fn close(&self, handle: SessionHandle) -> Result<WorkerSummary> {
        let session = self
            .registry
            .remove(handle)
            .ok_or(PipelineError::UnknownHandle(handle))?;

        session.cancel_token().cancel();
        let task = session
            .take_worker()
            .ok_or(PipelineError::UnknownHandle(handle))?;

        let ceiling = self.config.shutdown_wait_ceiling;
        match timeout(ceiling, task).await {
            Ok(Ok(summary)) => {
                info!(session = %handle, clean = summary.clean, "session closed");
                Ok(summary)
            }
            Ok(Err(join_err)) => {
                error!(session = %handle, error = %join_err, "session worker failed");
                Ok(WorkerSummary {
                    handle,
                    metrics: session.metrics_snapshot(),
                    clean: false,
                })
            }
            Err(_) => {
                warn!(
                    session = %handle,
                    ceiling_ms = ceiling.as_millis() as u64,
                    "session worker still draining past the close ceiling"
                );
                Err(PipelineError::ShutdownTimeout {
                    handle,
                    waited: ceiling,
                })
            }
        }
    }

    /// Close every open session
    ///
    /// Timeouts are logged and skipped so one stuck worker cannot hold
    /// up daemon shutdown.
    pub async fn shutdown(&self) {
        let sessions = self.registry.drain_all();
        if sessions.is_empty() {
            return;
        }
        info!(sessions = sessions.len(), "closing all sessions");

        for session in &sessions {
            session.cancel_token().cancel();
        }

        let ceiling = self.config.shutdown_wait_ceiling;
        for session in sessions {
            let handle = session.handle();
            let Some(task) = session.take_worker() else {
                continue;
            };
            match timeout(ceiling, task).await {
                Ok(Ok(summary)) => {
                    info!(session = %handle, clean = summary.clean, "session closed");
                }
                Ok(Err(join_err)) => {
                    error!(session = %handle, error = %join_err, "session worker failed");
                }
                Err(_) => {
                    warn!(
                        session = %handle,
                        ceiling_ms = ceiling.as_millis() as u64,
                        "abandoning worker still draining at shutdown"
                    );
                }
            }
        }
    }
}

impl SessionMetricsSource for SessionManager {
    fn session_snapshots(&self) -> Vec<(u64, SessionMetricsSnapshot)> {
        let mut snapshots = Vec::with_capacity(self.registry.len());
        self.registry
            .for_each(|session| snapshots.push((session.handle().raw(), session.metrics_snapshot())));
        snapshots
    }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod manager_test;
