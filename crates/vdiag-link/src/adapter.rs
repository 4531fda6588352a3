//! Adapter link trait and types

use std::time::Duration;

use async_trait::async_trait;

use super::LinkError;

/// Identification of an open link, for logging and execution records
#[derive(Debug, Clone, Default)]
pub struct LinkDescription {
    /// Channel name (port path for serial links, "mock" for tests)
    pub channel: String,
    /// Configured baud rate, if the channel has one
    pub baud_rate: Option<u32>,
}

/// Channel-agnostic interface to the AT-command adapter
///
/// The transport is half-duplex: implementations serialize transactions
/// internally so the session keep-alive and the main request path never
/// interleave writes.
#[async_trait]
pub trait AdapterLink: Send + Sync {
    /// Send one command and collect the response up to the prompt marker.
    ///
    /// The command is written with the adapter's terminator appended. Bytes
    /// are read until the terminating prompt appears or a hard byte ceiling
    /// is hit. The terminator and prompt are stripped; `None` means the
    /// adapter answered with an empty payload.
    ///
    /// No retries happen at this layer.
    async fn send_raw(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<Option<String>, LinkError>;

    /// Whether the link is currently open
    fn is_connected(&self) -> bool;

    /// Close the link. Idempotent.
    async fn disconnect(&self) -> Result<(), LinkError>;

    /// Describe the underlying channel
    fn describe(&self) -> LinkDescription;
}
