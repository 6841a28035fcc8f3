//! Ingest server configuration

use serde::Deserialize;

/// Server configuration
///
/// # Example
///
/// ```toml
/// [server]
/// listen = "127.0.0.1:8075"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the ingest listener binds to (host:port)
    /// Default: 127.0.0.1:8075
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8075".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.listen, "127.0.0.1:8075");
    }

    #[test]
    fn test_deserialize() {
        let config: ServerConfig = toml::from_str("listen = \"0.0.0.0:9000\"").unwrap();
        assert_eq!(config.listen, "0.0.0.0:9000");
    }
}
