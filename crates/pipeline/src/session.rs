//! Trace sessions
//!
//! A session ties together the double buffer producers write into, the
//! metrics both sides update, and the cancellation token that stops the
//! session's worker. Sessions are identified by an opaque numeric
//! handle chosen by the source that opens them.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracepipe_metrics::{SessionMetrics, SessionMetricsSnapshot};

use crate::buffer::BufferPair;
use crate::worker::WorkerSummary;

/// Opaque session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionHandle(u64);

impl SessionHandle {
    /// Create a handle from its raw value
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw handle value
    #[inline]
    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One open trace session
pub struct Session {
    handle: SessionHandle,
    buffers: Arc<BufferPair>,
    metrics: Arc<SessionMetrics>,
    cancel: CancellationToken,
    opened_at: SystemTime,
    worker: Mutex<Option<JoinHandle<WorkerSummary>>>,
}

impl Session {
    /// Create a session with a buffer pair of the given per-half capacity
    pub fn new(handle: SessionHandle, buffer_size: usize) -> Self {
        Self {
            handle,
            buffers: Arc::new(BufferPair::new(buffer_size)),
            metrics: Arc::new(SessionMetrics::new()),
            cancel: CancellationToken::new(),
            opened_at: SystemTime::now(),
            worker: Mutex::new(None),
        }
    }

    /// This session's handle
    #[inline]
    pub fn handle(&self) -> SessionHandle {
        self.handle
    }

    /// The double buffer producers write into
    #[inline]
    pub fn buffers(&self) -> &Arc<BufferPair> {
        &self.buffers
    }

    /// This session's metrics
    #[inline]
    pub fn metrics(&self) -> &Arc<SessionMetrics> {
        &self.metrics
    }

    /// Snapshot of this session's metrics
    #[inline]
    pub fn metrics_snapshot(&self) -> SessionMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Token that stops this session's worker
    #[inline]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// When the session was opened
    #[inline]
    pub fn opened_at(&self) -> SystemTime {
        self.opened_at
    }

    /// Attach the spawned worker task
    pub fn attach_worker(&self, task: JoinHandle<WorkerSummary>) {
        *self.worker.lock() = Some(task);
    }

    /// Take the worker task for joining; None if already taken
    pub fn take_worker(&self) -> Option<JoinHandle<WorkerSummary>> {
        self.worker.lock().take()
    }
}
