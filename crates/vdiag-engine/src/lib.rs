//! vdiag-engine - the diagnostic workflow orchestrator
//!
//! Composes the knowledge base, feedback ledger, bus configurator and
//! diagnostic session into one call surface:
//!
//! ```text
//! resolve module → resolve procedure → attempt preferred/standard
//!     → fall back → record outcome
//! ```
//!
//! Every attempt, success or failure, lands in the feedback ledger before
//! the result surfaces, which is what makes `recommend_protocol`
//! meaningful: once history exists, the protocol it favors is attempted
//! first.
//!
//! # Example
//!
//! ```ignore
//! use vdiag_engine::{EngineConfig, EngineContext, DiagnosticWorkflow};
//!
//! let config = EngineConfig::from_file("engine.toml")?;
//! let ctx = EngineContext::from_config(&config).await?;
//! let workflow = DiagnosticWorkflow::new(ctx);
//! let report = workflow.resolve_and_execute("ENGINE", "READ_DTC").await?;
//! ```

mod config;
mod context;
mod report;
mod workflow;

pub use config::{ConfigError, EngineConfig};
pub use context::EngineContext;
pub use report::{DiagnosticOutcome, DiagnosticReport, FaultEntry};
pub use workflow::DiagnosticWorkflow;

// Re-export the types collaborators handle
pub use vdiag_core::{Bus, DiagError, DiagResult, ModuleDescriptor, Protocol};
pub use vdiag_kb::KnowledgeBase;
pub use vdiag_ledger::{ExecutionRecord, FeedbackLedger, ProtocolStats};
pub use vdiag_proto::{DiagnosticTroubleCode, DtcEncoding};

/// Decode raw fault-payload bytes into trouble codes
///
/// Collaborator-facing wrapper over the codec's pure decoder.
pub fn get_trouble_codes(
    raw: &[u8],
    encoding: DtcEncoding,
) -> DiagResult<Vec<DiagnosticTroubleCode>> {
    vdiag_proto::decode_dtcs(raw, encoding).map_err(|e| DiagError::Decode(e.to_string()))
}
