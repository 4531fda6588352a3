//! Engine-level error taxonomy
//!
//! Lower layers carry their own error enums; the orchestrator maps them
//! into this taxonomy before recording outcomes, so every failure an
//! execution record describes falls into exactly one of these classes.

use thiserror::Error;

/// Result type for engine-facing operations
pub type DiagResult<T> = Result<T, DiagError>;

/// Errors surfaced by the diagnostic engine
#[derive(Debug, Error, Clone)]
pub enum DiagError {
    /// Transport unreachable or init handshake failed. Fatal for the
    /// session; never auto-retried.
    #[error("connection error: {0}")]
    Connection(String),

    /// A single invocation exceeded its deadline. Recorded like any other
    /// failure; retried only within the caller's budget.
    #[error("invocation timed out")]
    Timeout,

    /// The ECU rejected the request with an NRC.
    #[error("negative response: NRC 0x{nrc:02X} for service 0x{service_id:02X}")]
    NegativeResponse {
        /// Service ID that was rejected
        service_id: u8,
        /// Raw negative response code
        nrc: u8,
        /// Whether the condition is transient (response-pending class)
        retryable: bool,
    },

    /// The module answered nothing within the adapter's wait window.
    /// A failed attempt, eligible for protocol fallback.
    #[error("no data from module")]
    NoData,

    /// Malformed or truncated payload. Never silently coerced.
    #[error("decode error: {0}")]
    Decode(String),

    /// Malformed knowledge-base record. Fails that vehicle's entire load;
    /// partial knowledge is worse than none.
    #[error("knowledge parse error: {0}")]
    KnowledgeParse(String),

    /// Module or procedure absent from the knowledge base. Terminal for
    /// the step, but the attempt is still ledger-recorded.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invariant violation inside the engine itself
    #[error("internal error: {0}")]
    Internal(String),
}

impl DiagError {
    /// True when a repeat attempt with the same protocol could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DiagError::Timeout | DiagError::NegativeResponse { retryable: true, .. }
        )
    }

    /// Short class label used in execution records
    pub fn class(&self) -> &'static str {
        match self {
            DiagError::Connection(_) => "connection",
            DiagError::Timeout => "timeout",
            DiagError::NegativeResponse { retryable: true, .. } => "negative_retryable",
            DiagError::NegativeResponse { retryable: false, .. } => "negative_terminal",
            DiagError::NoData => "no_data",
            DiagError::Decode(_) => "decode",
            DiagError::KnowledgeParse(_) => "parse",
            DiagError::NotFound(_) => "not_found",
            DiagError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(DiagError::Timeout.is_retryable());
        assert!(DiagError::NegativeResponse {
            service_id: 0x19,
            nrc: 0x78,
            retryable: true
        }
        .is_retryable());
        assert!(!DiagError::NegativeResponse {
            service_id: 0x19,
            nrc: 0x31,
            retryable: false
        }
        .is_retryable());
        assert!(!DiagError::Connection("port gone".into()).is_retryable());
    }
}
