//! Tracepipe Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! Minimal config should just work - only specify what you need to change.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use tracepipe_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[pipeline]\npoll_period = \"500ms\"").unwrap();
//! ```
//!
//! # Example Minimal Config
//!
//! ```toml
//! [sink]
//! type = "broker"
//! target = "127.0.0.1:9092"
//! ```
//!
//! See `configs/example.toml` for all available options.

mod consumer;
mod error;
mod logging;
mod metrics;
mod pipeline;
mod server;
mod sink;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use consumer::ConsumerConfig;
pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use metrics::MetricsConfig;
pub use pipeline::PipelineConfig;
pub use server::ServerConfig;
pub use sink::{SinkConfig, SinkKind};

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Core pipeline settings (poll period, bounds, buffer sizing)
    pub pipeline: PipelineConfig,

    /// Ingest server settings
    pub server: ServerConfig,

    /// Sink (distributed log producer) settings
    pub sink: SinkConfig,

    /// Logging configuration
    pub log: LogConfig,

    /// Metrics reporting configuration
    pub metrics: MetricsConfig,

    /// Consumer daemon configuration
    pub consumer: ConsumerConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or contains invalid TOML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    ///
    /// Prefer using the `FromStr` trait implementation.
    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// Checks for:
    /// - Non-zero bounds, periods, and buffer sizes
    /// - `record_bound <= message_bound` (an accepted record must be framable)
    /// - A broker target when the sink type is broker
    fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::time::Duration;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert!(config.pipeline.buffer_size > 0);
        assert_eq!(config.pipeline.poll_period, Duration::from_secs(1));
        assert_eq!(config.sink.kind, SinkKind::Broker);
    }

    #[test]
    fn test_minimal_config() {
        let toml = r#"
[sink]
target = "log.internal:9092"
"#;
        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.sink.target, "log.internal:9092");
    }

    #[test]
    fn test_full_config_parse() {
        let toml = r#"
[pipeline]
poll_period = "250ms"
record_bound = 65536
message_bound = 131072
buffer_size = 524288
shutdown_wait_ceiling = "30s"

[server]
listen = "0.0.0.0:8075"

[sink]
type = "broker"
target = "10.0.0.5:9092"
queue_depth = 2000
connection_timeout = "3s"
write_timeout = "2s"
reconnect_interval = "1s"

[log]
level = "debug"
format = "json"

[metrics]
enabled = true
interval = "5s"

[consumer]
source = "10.0.0.5:9092"
input_key = "trace"
output_key = "trace-out"
poll_budget = "500ms"
"#;
        let config = Config::from_str(toml).unwrap();

        assert_eq!(config.pipeline.poll_period, Duration::from_millis(250));
        assert_eq!(config.pipeline.record_bound, 65536);
        assert_eq!(config.pipeline.message_bound, 131072);
        assert_eq!(config.pipeline.buffer_size, 524288);
        assert_eq!(
            config.pipeline.shutdown_wait_ceiling,
            Duration::from_secs(30)
        );
        assert_eq!(config.server.listen, "0.0.0.0:8075");
        assert_eq!(config.sink.queue_depth, 2000);
        assert_eq!(config.log.level, LogLevel::Debug);
        assert_eq!(config.metrics.interval, Duration::from_secs(5));
        assert_eq!(config.consumer.output_key, "trace-out");
    }

    #[test]
    fn test_invalid_toml() {
        let result = Config::from_str("invalid { toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_record_bound_larger_than_message_bound_rejected() {
        let toml = r#"
[pipeline]
record_bound = 2048
message_bound = 1024
"#;
        let err = Config::from_str(toml).unwrap_err();
        assert!(err.to_string().contains("record_bound"));
    }
}
