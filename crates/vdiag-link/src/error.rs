//! Transport layer errors

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum LinkError {
    /// Channel would not open or the reset/init handshake did not complete.
    /// Fatal for the session; retry policy lives above this layer.
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("link is closed")]
    Closed,

    #[error("I/O failed: {0}")]
    Io(String),

    /// No terminating prompt arrived within the transaction deadline
    #[error("transaction timed out")]
    Timeout,

    /// The adapter kept streaming bytes without ever sending the prompt
    #[error("response exceeded {limit} bytes without a prompt")]
    Overflow { limit: usize },

    /// A configuration command got an empty payload back
    #[error("no response to {0}")]
    NoResponse(String),
}
