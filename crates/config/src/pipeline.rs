//! Core pipeline configuration
//!
//! Settings for the session manager and its per-session workers.
//! Defaults: a one-second poll period and a 1 MiB record bound.

use serde::Deserialize;
use std::time::Duration;

/// Pipeline configuration
///
/// # Example
///
/// ```toml
/// [pipeline]
/// poll_period = "1s"
/// record_bound = 1048576
/// message_bound = 1048576
/// buffer_size = 262144
/// shutdown_wait_ceiling = "60s"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Worker cycle interval: each session's worker swaps and drains its
    /// buffer at this cadence (or earlier, when signaled to stop)
    /// Default: 1s
    #[serde(with = "humantime_serde")]
    pub poll_period: Duration,

    /// Maximum encoded size of one record; sources declaring a larger
    /// record are rejected at open
    /// Default: 1 MiB
    pub record_bound: usize,

    /// Maximum wire size of one framed message handed to the sink
    /// Default: 1 MiB
    pub message_bound: usize,

    /// Capacity of each buffer half; records that do not fit are dropped
    /// and counted
    /// Default: 256 KiB
    pub buffer_size: usize,

    /// Maximum time to wait for a worker to acknowledge exit at close;
    /// exceeding it abandons the session
    /// Default: 60s
    #[serde(with = "humantime_serde")]
    pub shutdown_wait_ceiling: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_period: Duration::from_secs(1),
            record_bound: 1024 * 1024,
            message_bound: 1024 * 1024,
            buffer_size: 256 * 1024,
            shutdown_wait_ceiling: Duration::from_secs(60),
        }
    }
}
