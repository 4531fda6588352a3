//! vdiag-proto - diagnostic service codec and session
//!
//! This crate is the protocol layer between the raw AT-command link and the
//! workflow orchestrator:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 DiagnosticSession                     │
//! │  state machine + keep-alive + bounded pending retry   │
//! │                                                       │
//! │          ┌─────────────┐   ┌──────────────┐           │
//! │          │    codec    │   │     nrc      │           │
//! │          │ (pure enc/  │   │ (negative    │           │
//! │          │  decode)    │   │  disposition)│           │
//! │          └──────┬──────┘   └──────────────┘           │
//! │                 │                                     │
//! │          ┌──────┴──────┐                              │
//! │          │ AdapterLink │                              │
//! │          └─────────────┘                              │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Reading codes, clearing codes, reading a data identifier and querying a
//! routine are all the same `invoke()` call with a different
//! [`ServiceRequest`] variant.

pub mod codec;
pub mod dtc;
mod error;
mod nrc;
pub mod request;
pub mod session;
pub mod units;

pub use codec::{decode_response, encode_request, ServiceResult};
pub use dtc::{decode_dtcs, DiagnosticTroubleCode, DtcEncoding, DtcPrefix, DtcStatus};
pub use error::DecodeError;
pub use nrc::{NegativeResponse, NegativeResponseCode, NrcDisposition};
pub use request::ServiceRequest;
pub use session::{DiagnosticSession, KeepaliveConfig, SessionConfig, SessionError, SessionState};
