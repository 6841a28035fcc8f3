//! Sink configuration
//!
//! Settings for the distributed log producer the pipeline hands framed
//! messages to. The broker sink maintains a single shared connection;
//! the null sink discards everything (benchmarks, development).

use serde::Deserialize;
use std::time::Duration;

/// Sink type selector
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Distributed log broker over TCP (default)
    #[default]
    Broker,
    /// Discard everything
    Null,
}

/// Sink configuration
///
/// # Example
///
/// ```toml
/// [sink]
/// type = "broker"
/// target = "127.0.0.1:9092"
/// queue_depth = 1000
/// connection_timeout = "10s"
/// write_timeout = "5s"
/// reconnect_interval = "5s"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Sink type (broker, null)
    /// Default: broker
    #[serde(rename = "type")]
    pub kind: SinkKind,

    /// Broker address (host:port); required when type is broker
    pub target: String,

    /// Depth of the producer queue; a full queue surfaces backpressure
    /// Default: 1000
    pub queue_depth: usize,

    /// Connection timeout
    /// Default: 10s
    #[serde(with = "humantime_serde")]
    pub connection_timeout: Duration,

    /// Write timeout per message
    /// Default: 5s
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,

    /// Wait before reconnecting after a connection failure
    /// Default: 5s
    #[serde(with = "humantime_serde")]
    pub reconnect_interval: Duration,

    /// TCP keep-alive enabled
    /// Default: true
    pub tcp_keepalive: bool,

    /// TCP keep-alive interval
    /// Default: 30s
    #[serde(with = "humantime_serde")]
    pub tcp_keepalive_interval: Duration,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::Broker,
            target: "127.0.0.1:9092".into(),
            queue_depth: 1000,
            connection_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(5),
            reconnect_interval: Duration::from_secs(5),
            tcp_keepalive: true,
            tcp_keepalive_interval: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SinkConfig::default();
        assert_eq!(config.kind, SinkKind::Broker);
        assert_eq!(config.queue_depth, 1000);
        assert!(config.tcp_keepalive);
    }

    #[test]
    fn test_deserialize_null_sink() {
        let config: SinkConfig = toml::from_str("type = \"null\"").unwrap();
        assert_eq!(config.kind, SinkKind::Null);
    }

    #[test]
    fn test_deserialize_broker() {
        let toml = r#"
type = "broker"
target = "log.internal:9092"
queue_depth = 50
write_timeout = "1s"
"#;
        let config: SinkConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.target, "log.internal:9092");
        assert_eq!(config.queue_depth, 50);
        assert_eq!(config.write_timeout, Duration::from_secs(1));
        // Defaults still apply
        assert_eq!(config.reconnect_interval, Duration::from_secs(5));
    }
}
