//! Link configuration

use serde::{Deserialize, Serialize};

/// Link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LinkConfig {
    /// Serial AT-command adapter (ELM327-class)
    Serial(SerialConfig),
    /// Mock link for testing
    Mock(MockConfig),
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::Mock(MockConfig::default())
    }
}

/// Serial adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Port path (e.g. "/dev/ttyUSB0" or "COM3")
    pub port: String,
    /// Baud rate of the adapter channel
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Per-transaction deadline in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Hard cap on bytes read in one transaction (stuck-adapter guard)
    #[serde(default = "default_byte_ceiling")]
    pub byte_ceiling: usize,
}

fn default_baud_rate() -> u32 {
    38400
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_byte_ceiling() -> usize {
    4096
}

/// Mock link configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockConfig {
    /// Simulated latency in milliseconds
    #[serde(default)]
    pub latency_ms: u64,
}
