//! Session manager: one invoke path, bounded pending retries, keep-alive

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use vdiag_link::{AdapterLink, LinkError};

use super::{SessionConfig, SessionState};
use crate::codec::{decode_response, encode_request, ServiceResult};
use crate::error::DecodeError;
use crate::nrc::NegativeResponseCode;
use crate::request::ServiceRequest;

/// Session-layer errors
///
/// `Timeout`, `NoData` and negative responses are results, not errors; see
/// [`ServiceResult`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session is closed")]
    Closed,

    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("link failed: {0}")]
    Link(#[from] LinkError),
}

/// Issues diagnostic services over one adapter link
///
/// Exactly one session owns a link at a time. Reading codes, clearing
/// codes, reading a DID and querying a routine all go through [`invoke`],
/// differing only in the [`ServiceRequest`] variant.
///
/// [`invoke`]: DiagnosticSession::invoke
pub struct DiagnosticSession {
    link: Arc<dyn AdapterLink>,
    config: SessionConfig,
    state: RwLock<SessionState>,
    keepalive_handle: Mutex<Option<JoinHandle<()>>>,
}

impl DiagnosticSession {
    pub fn new(link: Arc<dyn AdapterLink>, config: SessionConfig) -> Self {
        Self {
            link,
            config,
            state: RwLock::new(SessionState::Default),
            keepalive_handle: Mutex::new(None),
        }
    }

    /// The link this session drives
    pub fn link(&self) -> &Arc<dyn AdapterLink> {
        &self.link
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Invoke a service with the configured deadline
    pub async fn invoke(&self, request: &ServiceRequest) -> Result<ServiceResult, SessionError> {
        self.invoke_with_timeout(request, self.config.request_timeout())
            .await
    }

    /// Invoke a service with a caller-supplied deadline
    ///
    /// Deadline expiry resolves to `Ok(ServiceResult::Timeout)`; a
    /// response-pending NRC is re-read a bounded number of times before it
    /// surfaces.
    pub async fn invoke_with_timeout(
        &self,
        request: &ServiceRequest,
        timeout: Duration,
    ) -> Result<ServiceResult, SessionError> {
        if self.state() == SessionState::Closed {
            return Err(SessionError::Closed);
        }

        let frame = encode_request(request);
        let mut rereads = self.config.response_pending_rereads;

        loop {
            let raw = match self.link.send_raw(&frame, timeout).await {
                Ok(raw) => raw,
                Err(LinkError::Timeout) => {
                    debug!(frame = %frame, "invocation deadline expired");
                    return Ok(ServiceResult::Timeout);
                }
                Err(e) => return Err(SessionError::Link(e)),
            };

            let Some(raw) = raw else {
                return Ok(ServiceResult::NoData);
            };

            let result = decode_response(&raw, request)?;

            if let ServiceResult::Negative(neg) = &result {
                if neg.nrc == NegativeResponseCode::ResponsePending && rereads > 0 {
                    rereads -= 1;
                    debug!(frame = %frame, rereads_left = rereads, "response pending, re-reading");
                    tokio::time::sleep(self.config.pending_delay()).await;
                    continue;
                }
            }

            return Ok(result);
        }
    }

    /// Request the extended diagnostic session. Single attempt: a negative
    /// or timed-out echo leaves the session in `Default` and reports
    /// extended features unavailable.
    pub async fn enter_extended(&self) -> Result<bool, SessionError> {
        {
            let mut state = self.state.write();
            match *state {
                SessionState::Closed => return Err(SessionError::Closed),
                SessionState::Extended => return Ok(true),
                _ => *state = SessionState::ExtendedRequested,
            }
        }

        let request = ServiceRequest::SessionControl {
            session: self.config.extended_session,
        };
        let result = self.invoke(&request).await?;

        match result {
            ServiceResult::Positive(_) => {
                *self.state.write() = SessionState::Extended;
                self.start_keepalive();
                info!(
                    session = format!("0x{:02X}", self.config.extended_session),
                    "extended diagnostic session active"
                );
                Ok(true)
            }
            other => {
                *self.state.write() = SessionState::Default;
                debug!(?other, "extended session unavailable");
                Ok(false)
            }
        }
    }

    /// Close the session: cancel and join the keep-alive, refuse further
    /// invocations. Idempotent.
    pub async fn close(&self) {
        let handle = self.keepalive_handle.lock().take();
        if let Some(handle) = handle {
            handle.abort();
            // The abort lands between transactions; the link mutex keeps a
            // final in-flight TesterPresent intact.
            let _ = handle.await;
            debug!("keep-alive stopped");
        }
        *self.state.write() = SessionState::Closed;
        info!("diagnostic session closed");
    }

    fn start_keepalive(&self) {
        if !self.config.keepalive.enabled {
            return;
        }

        let link = Arc::clone(&self.link);
        let interval = Duration::from_millis(self.config.keepalive.interval_ms);
        let timeout = self.config.request_timeout();

        let handle = tokio::spawn(async move {
            let frame = encode_request(&ServiceRequest::TesterPresent);
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The interval's first tick fires immediately; the session
            // control exchange just proved the ECU awake.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match link.send_raw(&frame, timeout).await {
                    Ok(_) => debug!("tester present ok"),
                    // Keep-alive failures never escalate into the main path
                    Err(e) => warn!(error = %e, "tester present failed"),
                }
            }
        });

        let mut slot = self.keepalive_handle.lock();
        if let Some(old) = slot.take() {
            old.abort();
        }
        *slot = Some(handle);
        debug!(
            interval_ms = self.config.keepalive.interval_ms,
            "keep-alive started"
        );
    }
}

impl Drop for DiagnosticSession {
    fn drop(&mut self) {
        if let Some(handle) = self.keepalive_handle.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vdiag_link::{MockConfig, MockLink};

    fn session_with(link: Arc<MockLink>, config: SessionConfig) -> DiagnosticSession {
        DiagnosticSession::new(link, config)
    }

    fn quiet_config() -> SessionConfig {
        SessionConfig {
            response_pending_delay_ms: 1,
            keepalive: super::super::KeepaliveConfig {
                enabled: false,
                interval_ms: 1000,
            },
            ..SessionConfig::default()
        }
    }

    #[tokio::test]
    async fn test_invoke_positive() {
        let link = Arc::new(MockLink::new(&MockConfig::default()).with_response("0105", "41 05 5A"));
        let session = session_with(link, quiet_config());

        let result = session
            .invoke(&ServiceRequest::CurrentData { pid: 0x05 })
            .await
            .unwrap();
        assert_eq!(result, ServiceResult::Positive(vec![0x05, 0x5A]));
    }

    #[tokio::test]
    async fn test_empty_payload_is_no_data() {
        let link = Arc::new(MockLink::new(&MockConfig::default()));
        let session = session_with(link, quiet_config());

        let result = session.invoke(&ServiceRequest::StoredDtcs).await.unwrap();
        assert_eq!(result, ServiceResult::NoData);
    }

    #[tokio::test]
    async fn test_link_timeout_resolves_to_timeout_result() {
        let link = Arc::new(MockLink::new(&MockConfig::default()));
        link.set_failure(Some(LinkError::Timeout));
        let session = session_with(link, quiet_config());

        let result = session.invoke(&ServiceRequest::StoredDtcs).await.unwrap();
        assert_eq!(result, ServiceResult::Timeout);
    }

    #[tokio::test]
    async fn test_response_pending_rereads_are_bounded() {
        let link =
            Arc::new(MockLink::new(&MockConfig::default()).with_response("1902FF", "7F 19 78"));
        let config = SessionConfig {
            response_pending_rereads: 2,
            ..quiet_config()
        };
        let session = session_with(link.clone(), config);

        let result = session
            .invoke(&ServiceRequest::ReadDtcInfo {
                sub_function: 0x02,
                status_mask: 0xFF,
            })
            .await
            .unwrap();

        // Surfaces as a retryable negative once the re-read budget is spent
        let ServiceResult::Negative(neg) = result else {
            panic!("expected negative result");
        };
        assert!(neg.is_retryable());
        assert_eq!(link.transcript().len(), 3); // initial + 2 re-reads
    }

    #[tokio::test]
    async fn test_enter_extended_positive_echo() {
        let link = Arc::new(
            MockLink::new(&MockConfig::default()).with_response("1003", "50 03 00 19 01 F4"),
        );
        let session = session_with(link, quiet_config());

        assert!(session.enter_extended().await.unwrap());
        assert_eq!(session.state(), SessionState::Extended);
    }

    #[tokio::test]
    async fn test_enter_extended_negative_stays_default() {
        let link =
            Arc::new(MockLink::new(&MockConfig::default()).with_response("1003", "7F 10 11"));
        let session = session_with(link.clone(), quiet_config());

        assert!(!session.enter_extended().await.unwrap());
        assert_eq!(session.state(), SessionState::Default);
        // Single attempt, no retry storm
        assert_eq!(link.transcript().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_fires_and_cancels_on_close() {
        let link = Arc::new(
            MockLink::new(&MockConfig::default())
                .with_response("1003", "50 03")
                .with_response("3E00", "7E 00"),
        );
        let config = SessionConfig {
            keepalive: super::super::KeepaliveConfig {
                enabled: true,
                interval_ms: 1000,
            },
            ..SessionConfig::default()
        };
        let session = session_with(link.clone(), config);

        assert!(session.enter_extended().await.unwrap());
        tokio::time::sleep(Duration::from_millis(3500)).await;

        let pings = |t: &[String]| t.iter().filter(|c| c.as_str() == "3E00").count();
        let fired = pings(&link.transcript());
        assert!(fired >= 3, "expected >= 3 keep-alives, saw {fired}");

        session.close().await;
        assert_eq!(session.state(), SessionState::Closed);
        let after_close = pings(&link.transcript());

        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(pings(&link.transcript()), after_close);

        // Closed sessions refuse invocations
        let err = session.invoke(&ServiceRequest::StoredDtcs).await.unwrap_err();
        assert!(matches!(err, SessionError::Closed));
    }
}
