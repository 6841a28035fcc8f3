//! Consumer daemon configuration
//!
//! The consumer subscribes to the trace topic, decodes the record
//! stream, and re-publishes processed records on an output key.

use serde::Deserialize;
use std::time::Duration;

/// Consumer configuration
///
/// # Example
///
/// ```toml
/// [consumer]
/// source = "127.0.0.1:9092"
/// input_key = "trace"
/// output_key = "trace-processed"
/// poll_budget = "1s"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Broker address to consume from (host:port)
    pub source: String,

    /// Only messages published under this key are processed; anything
    /// else is skipped (trusting foreign buffers is unsafe)
    /// Default: "trace"
    pub input_key: String,

    /// Key under which processed records are re-published
    /// Default: "trace-processed"
    pub output_key: String,

    /// Poll budget used between publish retries under backpressure
    /// Default: 1s
    #[serde(with = "humantime_serde")]
    pub poll_budget: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            source: "127.0.0.1:9092".into(),
            input_key: "trace".into(),
            output_key: "trace-processed".into(),
            poll_budget: Duration::from_secs(1),
        }
    }
}
