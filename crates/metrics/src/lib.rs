//! Metrics collection and reporting for tracepipe
//!
//! Components own lock-free atomic counter structs ([`SessionMetrics`],
//! [`SinkMetrics`]) and expose point-in-time snapshots through provider
//! traits. The [`Reporter`] polls registered providers at a configured
//! interval and emits the snapshots as structured log events.
//!
//! # Design
//!
//! - Counters are `AtomicU64` with relaxed ordering; writers never block
//! - Snapshots are plain `Copy` structs, safe to hold across await points
//! - Sessions come and go at runtime, so the reporter pulls the live set
//!   from a [`SessionMetricsSource`] on every tick instead of holding
//!   per-session providers

mod reporter;
mod traits;

pub use reporter::{Reporter, ReporterBuilder, SessionMetricsSource};
pub use traits::{
    SessionMetrics, SessionMetricsSnapshot, SinkMetrics, SinkMetricsProvider,
    SinkMetricsSnapshot,
};
