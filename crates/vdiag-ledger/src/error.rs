//! Ledger errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The log itself is the source of truth; a line that does not replay
    /// fails the whole open.
    #[error("corrupt ledger line {line}: {reason}")]
    Corrupt { line: usize, reason: String },
}
