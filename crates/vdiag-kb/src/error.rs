//! Knowledge base errors
//!
//! A malformed record fails the whole load: partial knowledge about a
//! vehicle is worse than none.

use thiserror::Error;

/// Errors raised while parsing or updating a knowledge base
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: token {token:?} is not KEY:value")]
    BadToken { line: usize, token: String },

    #[error("line {line}: {record} record is missing required field {field}")]
    MissingField {
        line: usize,
        record: &'static str,
        field: &'static str,
    },

    #[error("line {line}: invalid {field} value {value:?}")]
    BadValue {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("line {line}: invalid calculation: {reason}")]
    BadExpression { line: usize, reason: String },

    #[error("knowledge file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
