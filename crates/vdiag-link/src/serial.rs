//! Serial link for ELM327-class AT-command adapters
//!
//! The adapter speaks ASCII: commands terminated by a carriage return,
//! responses terminated by a `>` prompt. This is the engine's only blocking
//! boundary; reads run on the blocking pool and every transaction is
//! serialized through one async mutex because the channel is half-duplex.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::adapter::{AdapterLink, LinkDescription};
use crate::config::SerialConfig;
use crate::error::LinkError;

const PROMPT: u8 = b'>';
const READ_POLL: Duration = Duration::from_millis(50);

/// Reset and init handshake, issued in order on connect
const INIT_SEQUENCE: &[&str] = &["AT Z", "AT E0", "AT L0"];

type SharedPort = Arc<Mutex<Option<Box<dyn serialport::SerialPort>>>>;

/// Serial AT-command adapter link
pub struct SerialAtLink {
    config: SerialConfig,
    port: SharedPort,
    /// Half-duplex guard: keep-alive and main path transactions never overlap
    txn: tokio::sync::Mutex<()>,
    connected: AtomicBool,
}

impl SerialAtLink {
    /// Open the channel and run the reset/init handshake (reset, echo off,
    /// linefeeds off). Fails with [`LinkError::Connection`] if the port
    /// won't open or any init command goes unanswered.
    pub async fn connect(config: &SerialConfig) -> Result<Self, LinkError> {
        let cfg = config.clone();
        let port = tokio::task::spawn_blocking(move || open_and_init(&cfg))
            .await
            .map_err(|e| LinkError::Connection(format!("connect worker failed: {e}")))??;

        debug!(port = %config.port, baud = config.baud_rate, "adapter link open");
        Ok(Self {
            config: config.clone(),
            port: Arc::new(Mutex::new(Some(port))),
            txn: tokio::sync::Mutex::new(()),
            connected: AtomicBool::new(true),
        })
    }

    fn drop_channel(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.port.lock().take();
    }
}

#[async_trait]
impl AdapterLink for SerialAtLink {
    async fn send_raw(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<Option<String>, LinkError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(LinkError::Closed);
        }

        let _txn = self.txn.lock().await;

        let port = Arc::clone(&self.port);
        let cmd = command.to_string();
        let ceiling = self.config.byte_ceiling;
        let result = tokio::task::spawn_blocking(move || {
            let mut guard = port.lock();
            let port = guard.as_mut().ok_or(LinkError::Closed)?;
            transact(port.as_mut(), &cmd, timeout, ceiling)
        })
        .await
        .map_err(|e| LinkError::Io(format!("transaction worker failed: {e}")))?;

        match &result {
            Err(LinkError::Io(reason)) => {
                // The channel is in an unknown state after a raw I/O fault;
                // the connection does not survive it.
                warn!(command = %command, %reason, "dropping adapter channel after I/O fault");
                self.drop_channel();
            }
            Err(e) => debug!(command = %command, error = %e, "transaction failed"),
            Ok(reply) => debug!(command = %command, reply = ?reply, "transaction complete"),
        }
        result
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) -> Result<(), LinkError> {
        // Wait out any in-flight transaction, then release the channel.
        let _txn = self.txn.lock().await;
        self.drop_channel();
        Ok(())
    }

    fn describe(&self) -> LinkDescription {
        LinkDescription {
            channel: self.config.port.clone(),
            baud_rate: Some(self.config.baud_rate),
        }
    }
}

fn open_and_init(cfg: &SerialConfig) -> Result<Box<dyn serialport::SerialPort>, LinkError> {
    let mut port = serialport::new(&cfg.port, cfg.baud_rate)
        .timeout(READ_POLL)
        .open()
        .map_err(|e| LinkError::Connection(format!("{}: {e}", cfg.port)))?;

    let timeout = Duration::from_millis(cfg.timeout_ms);
    for init in INIT_SEQUENCE {
        let reply = transact(port.as_mut(), init, timeout, cfg.byte_ceiling)
            .map_err(|e| LinkError::Connection(format!("handshake {init}: {e}")))?;
        if reply.is_none() {
            return Err(LinkError::Connection(format!(
                "handshake {init}: adapter gave no payload"
            )));
        }
        debug!(command = init, "handshake step ok");
    }

    Ok(port)
}

/// One blocking request/response exchange: write command + terminator, read
/// byte-by-byte until the prompt or the byte ceiling.
fn transact(
    port: &mut dyn serialport::SerialPort,
    command: &str,
    timeout: Duration,
    ceiling: usize,
) -> Result<Option<String>, LinkError> {
    port.clear(serialport::ClearBuffer::Input)
        .map_err(|e| LinkError::Io(e.to_string()))?;
    write_frame(port, command).map_err(|e| LinkError::Io(e.to_string()))?;

    let deadline = Instant::now() + timeout;
    let mut raw: Vec<u8> = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        match port.read(&mut byte) {
            Ok(1) => {
                if byte[0] == PROMPT {
                    break;
                }
                raw.push(byte[0]);
                if raw.len() >= ceiling {
                    return Err(LinkError::Overflow { limit: ceiling });
                }
            }
            Ok(_) => return Err(LinkError::Io("channel closed mid-read".to_string())),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                if Instant::now() >= deadline {
                    return Err(LinkError::Timeout);
                }
            }
            Err(e) => return Err(LinkError::Io(e.to_string())),
        }
    }

    Ok(clean_payload(&raw, command))
}

fn write_frame(port: &mut dyn serialport::SerialPort, command: &str) -> io::Result<()> {
    port.write_all(command.as_bytes())?;
    port.write_all(b"\r")?;
    port.flush()
}

/// Strip terminators, NULs, blank lines, and the echoed command; `None`
/// when nothing meaningful remains.
pub(crate) fn clean_payload(raw: &[u8], command: &str) -> Option<String> {
    let text = String::from_utf8_lossy(raw).replace('\0', "");
    let lines: Vec<&str> = text
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.eq_ignore_ascii_case(command))
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_payload_strips_echo_and_terminators() {
        let raw = b"0105\r41 05 5A\r\r";
        assert_eq!(clean_payload(raw, "0105"), Some("41 05 5A".to_string()));
    }

    #[test]
    fn test_clean_payload_keeps_multiline() {
        let raw = b"SEARCHING...\r41 00 BE 1F B8 10\r";
        assert_eq!(
            clean_payload(raw, "0100"),
            Some("SEARCHING...\n41 00 BE 1F B8 10".to_string())
        );
    }

    #[test]
    fn test_clean_payload_empty_is_none() {
        assert_eq!(clean_payload(b"\r\r", "0105"), None);
        assert_eq!(clean_payload(b"0105\r", "0105"), None);
    }
}
