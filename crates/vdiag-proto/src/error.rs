//! Codec errors

use thiserror::Error;

/// Errors raised while decoding a raw adapter response
///
/// Malformed or truncated input is always an error here; the codec never
/// guesses a value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty response")]
    Empty,

    #[error("response is not hex: {0}")]
    NotHex(String),

    /// The adapter reported a channel-level fault in place of a frame
    #[error("adapter fault: {0}")]
    AdapterFault(String),

    #[error("truncated frame: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("unexpected service marker 0x{marker:02X} (expected 0x{expected:02X})")]
    UnexpectedMarker { marker: u8, expected: u8 },

    #[error("negative response frame shorter than 3 bytes")]
    ShortNegative,

    #[error("truncated DTC record: {0} trailing bytes")]
    TruncatedDtc(usize),

    #[error("DTC digits must be {expected} hex characters, got {actual:?}")]
    BadDtcDigits { expected: usize, actual: String },
}
