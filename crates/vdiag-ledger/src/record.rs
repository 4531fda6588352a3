//! Execution records

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vdiag_core::Protocol;

/// One diagnostic attempt, created once and never mutated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// When the attempt finished
    pub timestamp: DateTime<Utc>,
    /// Module name (upper-cased)
    pub module: String,
    /// Action keyword (upper-cased)
    pub action: String,
    /// Protocol variant the attempt ran under
    pub protocol: Protocol,
    /// Whether the attempt produced a positive result
    pub success: bool,
    /// Wall-clock duration of the attempt
    pub duration_ms: u64,
    /// Error class and detail for failed attempts
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl ExecutionRecord {
    pub fn new(
        module: &str,
        action: &str,
        protocol: Protocol,
        success: bool,
        duration: Duration,
        error: Option<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            module: module.to_ascii_uppercase(),
            action: action.to_ascii_uppercase(),
            protocol,
            success,
            duration_ms: duration.as_millis() as u64,
            error,
        }
    }
}
