//! Engine configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vdiag_link::LinkConfig;
use vdiag_proto::SessionConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse failed: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Top-level engine configuration, one file per vehicle setup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Adapter link settings
    #[serde(default)]
    pub link: LinkConfig,
    /// Session settings (timeouts, pending retries, keep-alive)
    #[serde(default)]
    pub session: SessionConfig,
    /// Path of the vehicle's knowledge base file
    pub knowledge_path: PathBuf,
    /// Path of the durable execution log; in-memory ledger when absent
    #[serde(default)]
    pub ledger_path: Option<PathBuf>,
}

impl EngineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let text = r#"
knowledge_path = "vehicles/corolla_2015.kb"
ledger_path = "state/executions.jsonl"

[link]
type = "serial"
port = "/dev/ttyUSB0"
baud_rate = 38400

[session]
request_timeout_ms = 3000
response_pending_rereads = 2

[session.keepalive]
enabled = true
interval_ms = 1500
"#;
        let config: EngineConfig = toml::from_str(text).unwrap();
        assert_eq!(config.knowledge_path, PathBuf::from("vehicles/corolla_2015.kb"));
        assert!(config.ledger_path.is_some());
        assert_eq!(config.session.request_timeout_ms, 3000);
        assert_eq!(config.session.keepalive.interval_ms, 1500);
        match config.link {
            LinkConfig::Serial(serial) => {
                assert_eq!(serial.port, "/dev/ttyUSB0");
                assert_eq!(serial.baud_rate, 38400);
                assert_eq!(serial.timeout_ms, 5000);
            }
            other => panic!("unexpected link config: {other:?}"),
        }
    }

    #[test]
    fn test_defaults() {
        let config: EngineConfig = toml::from_str("knowledge_path = \"v.kb\"").unwrap();
        assert!(matches!(config.link, LinkConfig::Mock(_)));
        assert!(config.ledger_path.is_none());
        assert_eq!(config.session.response_pending_rereads, 3);
    }
}
