//! Configuration validation
//!
//! Cross-field checks that serde defaults cannot express.

use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::sink::SinkKind;
use crate::Config;

/// Validate a parsed configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_pipeline(config)?;
    validate_sink(config)?;

    if config.server.listen.is_empty() {
        return Err(ConfigError::missing_field("server", "listen"));
    }
    Ok(())
}

fn validate_pipeline(config: &Config) -> Result<()> {
    let p = &config.pipeline;

    if p.poll_period == Duration::ZERO {
        return Err(ConfigError::invalid_value(
            "pipeline",
            "poll_period",
            "must be non-zero",
        ));
    }

    if p.record_bound == 0 {
        return Err(ConfigError::invalid_value(
            "pipeline",
            "record_bound",
            "must be non-zero",
        ));
    }

    if p.message_bound == 0 {
        return Err(ConfigError::invalid_value(
            "pipeline",
            "message_bound",
            "must be non-zero",
        ));
    }

    // A record accepted at open must be framable into a message;
    // otherwise every validated session still drops on every cycle.
    if p.record_bound > p.message_bound {
        return Err(ConfigError::invalid_value(
            "pipeline",
            "record_bound",
            format!(
                "must not exceed message_bound ({} > {})",
                p.record_bound, p.message_bound
            ),
        ));
    }

    if p.buffer_size == 0 {
        return Err(ConfigError::invalid_value(
            "pipeline",
            "buffer_size",
            "must be non-zero",
        ));
    }

    if p.shutdown_wait_ceiling == Duration::ZERO {
        return Err(ConfigError::invalid_value(
            "pipeline",
            "shutdown_wait_ceiling",
            "must be non-zero",
        ));
    }

    Ok(())
}

fn validate_sink(config: &Config) -> Result<()> {
    let s = &config.sink;

    if s.kind == SinkKind::Broker && s.target.is_empty() {
        return Err(ConfigError::missing_field("sink", "target"));
    }

    if s.queue_depth == 0 {
        return Err(ConfigError::invalid_value(
            "sink",
            "queue_depth",
            "must be non-zero",
        ));
    }

    Ok(())
}
