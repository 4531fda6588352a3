//! Mock adapter link for testing

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::adapter::{AdapterLink, LinkDescription};
use crate::config::MockConfig;
use crate::error::LinkError;

/// Mock adapter link with scripted request/response pairs
///
/// Lookup is exact-match first, then prefix-match. Configuration commands
/// (`AT …`) without a scripted entry answer `OK`, matching how real
/// adapters acknowledge configuration; anything else unscripted yields an
/// empty payload.
pub struct MockLink {
    config: MockConfig,
    connected: AtomicBool,
    responses: RwLock<Vec<(String, String)>>,
    transcript: RwLock<Vec<String>>,
    failure: RwLock<Option<LinkError>>,
}

impl MockLink {
    pub fn new(config: &MockConfig) -> Self {
        Self {
            config: config.clone(),
            connected: AtomicBool::new(true),
            responses: RwLock::new(Vec::new()),
            transcript: RwLock::new(Vec::new()),
            failure: RwLock::new(None),
        }
    }

    /// Script a response for a command (builder form)
    pub fn with_response(self, command: &str, response: &str) -> Self {
        self.add_response(command, response);
        self
    }

    /// Script a response for a command
    pub fn add_response(&self, command: &str, response: &str) {
        self.responses
            .write()
            .push((command.to_string(), response.to_string()));
    }

    /// Replace the scripted response for a command, if present
    pub fn replace_response(&self, command: &str, response: &str) {
        let mut responses = self.responses.write();
        if let Some(entry) = responses.iter_mut().find(|(cmd, _)| cmd == command) {
            entry.1 = response.to_string();
        } else {
            responses.push((command.to_string(), response.to_string()));
        }
    }

    /// Every command sent over this link, in order
    pub fn transcript(&self) -> Vec<String> {
        self.transcript.read().clone()
    }

    /// Simulate the adapter going away (or coming back)
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Make every transaction fail with the given error until cleared
    pub fn set_failure(&self, failure: Option<LinkError>) {
        *self.failure.write() = failure;
    }

    fn find_response(&self, command: &str) -> Option<String> {
        let responses = self.responses.read();

        for (cmd, resp) in responses.iter() {
            if cmd == command {
                return Some(resp.clone());
            }
        }

        for (cmd, resp) in responses.iter() {
            if command.starts_with(cmd.as_str()) {
                return Some(resp.clone());
            }
        }

        if command.starts_with("AT") {
            return Some("OK".to_string());
        }

        None
    }
}

#[async_trait]
impl AdapterLink for MockLink {
    async fn send_raw(
        &self,
        command: &str,
        _timeout: Duration,
    ) -> Result<Option<String>, LinkError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(LinkError::Closed);
        }
        if let Some(failure) = self.failure.read().clone() {
            return Err(failure);
        }

        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }

        self.transcript.write().push(command.to_string());
        Ok(self.find_response(command))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) -> Result<(), LinkError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> LinkDescription {
        LinkDescription {
            channel: "mock".to_string(),
            baud_rate: None,
        }
    }
}
