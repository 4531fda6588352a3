//! Workflow results

use serde::Serialize;
use vdiag_core::Protocol;
use vdiag_proto::DiagnosticTroubleCode;

/// A decoded trouble code with its knowledge base annotation
#[derive(Debug, Clone, Serialize)]
pub struct FaultEntry {
    /// Display code, e.g. "P0102"
    pub code: String,
    /// Decoded value (prefix, digits, raw bytes, status)
    pub dtc: DiagnosticTroubleCode,
    /// Subsystem from the first matching DTC rule
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// What a successful execution produced
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticOutcome {
    /// Fault codes, possibly empty when the module holds none
    TroubleCodes { faults: Vec<FaultEntry> },
    /// A physical value computed by a response rule
    Value {
        name: String,
        value: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
    },
    /// A clear operation acknowledged
    Cleared,
    /// Positive payload with no matching response rule
    Raw { payload: Vec<u8> },
}

/// Result of one resolved-and-executed diagnostic action
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub module: String,
    pub action: String,
    /// Protocol variant that finally succeeded
    pub protocol: Protocol,
    /// Command id of the winning template
    pub command_id: String,
    pub duration_ms: u64,
    pub outcome: DiagnosticOutcome,
}
