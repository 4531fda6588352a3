//! Diagnostic session state machine and keep-alive
//!
//! A session owns the request/response loop over one adapter link. Extended
//! diagnostics require a periodic TesterPresent or the ECU silently reverts
//! to its default session; the keep-alive task here runs for the session's
//! lifetime and is cancelled on close.

mod manager;

pub use manager::{DiagnosticSession, SessionError};

use serde::{Deserialize, Serialize};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Default session; OBD and default-session UDS services only
    #[default]
    Default,
    /// DiagnosticSessionControl(extended) sent, echo not yet seen
    ExtendedRequested,
    /// Extended session active, keep-alive running
    Extended,
    /// Session closed; no further invocations
    Closed,
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Per-invocation deadline in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// How many times a response-pending NRC is re-read before it
    /// surfaces as retryable
    #[serde(default = "default_pending_rereads")]
    pub response_pending_rereads: u32,
    /// Delay between response-pending re-reads, in milliseconds
    #[serde(default = "default_pending_delay_ms")]
    pub response_pending_delay_ms: u64,
    /// DiagnosticSessionControl sub-function for the extended session
    #[serde(default = "default_extended_session")]
    pub extended_session: u8,
    /// Keep-alive configuration
    #[serde(default)]
    pub keepalive: KeepaliveConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            response_pending_rereads: default_pending_rereads(),
            response_pending_delay_ms: default_pending_delay_ms(),
            extended_session: default_extended_session(),
            keepalive: KeepaliveConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.request_timeout_ms)
    }

    pub(crate) fn pending_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.response_pending_delay_ms)
    }
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_pending_rereads() -> u32 {
    3
}

fn default_pending_delay_ms() -> u64 {
    200
}

fn default_extended_session() -> u8 {
    0x03
}

/// Keep-alive configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeepaliveConfig {
    #[serde(default = "default_keepalive_enabled")]
    pub enabled: bool,
    /// Must stay inside the ECU's session timeout
    #[serde(default = "default_keepalive_interval")]
    pub interval_ms: u64,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            enabled: default_keepalive_enabled(),
            interval_ms: default_keepalive_interval(),
        }
    }
}

fn default_keepalive_enabled() -> bool {
    true
}

fn default_keepalive_interval() -> u64 {
    2000
}
