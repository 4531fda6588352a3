//! Service request/response codec
//!
//! Pure encode/decode, no I/O. Requests become the uppercase hex frames the
//! AT adapter forwards to the bus; raw adapter text becomes a typed
//! [`ServiceResult`]. Decoding the same raw response twice always yields the
//! same result.

use crate::error::DecodeError;
use crate::nrc::NegativeResponse;
use crate::request::{dtc_sub_function, ServiceRequest};

const NEGATIVE_MARKER: u8 = 0x7F;

/// Adapter chatter that carries no frame data
const NOISE_LINES: &[&str] = &["SEARCHING...", "OK", "STOPPED"];

/// Adapter reports that mean the channel failed mid-request
const FAULT_LINES: &[&str] = &[
    "UNABLETOCONNECT",
    "CANERROR",
    "BUSERROR",
    "BUFFERFULL",
    "DATAERROR",
    "FBERROR",
    "?",
];

/// Outcome of one service invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceResult {
    /// Positive response; payload bytes after the service marker
    Positive(Vec<u8>),
    /// ECU rejected the request
    Negative(NegativeResponse),
    /// No terminating prompt within the invocation deadline
    Timeout,
    /// The adapter's no-data sentinel: the module answered nothing
    NoData,
}

impl ServiceResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ServiceResult::Positive(_))
    }
}

/// Encode a service request as the hex frame sent to the adapter
pub fn encode_request(request: &ServiceRequest) -> String {
    match request {
        ServiceRequest::CurrentData { pid } => format!("01{pid:02X}"),
        ServiceRequest::StoredDtcs => "03".to_string(),
        ServiceRequest::ClearStoredDtcs => "04".to_string(),
        ServiceRequest::PendingDtcs => "07".to_string(),
        ServiceRequest::VehicleInfo { pid } => format!("09{pid:02X}"),
        ServiceRequest::SessionControl { session } => format!("10{session:02X}"),
        ServiceRequest::ClearDiagnosticInfo { group } => format!("14{:06X}", group & 0x00FF_FFFF),
        ServiceRequest::ReadDtcInfo {
            sub_function,
            status_mask,
        } => {
            if *sub_function == dtc_sub_function::REPORT_SUPPORTED {
                format!("19{sub_function:02X}")
            } else {
                format!("19{sub_function:02X}{status_mask:02X}")
            }
        }
        ServiceRequest::ReadDataById { did } => format!("22{did:04X}"),
        ServiceRequest::SecurityAccessSeed { level } => {
            // Seed request sub-functions are odd: level 1 -> 0x01, 2 -> 0x03
            let sub = level.saturating_mul(2).saturating_sub(1).max(1);
            format!("27{sub:02X}")
        }
        ServiceRequest::IoControlProbe { ioid } => format!("2F{ioid:04X}00"),
        ServiceRequest::RoutineResults { routine_id } => format!("3103{routine_id:04X}"),
        ServiceRequest::TesterPresent => "3E00".to_string(),
    }
}

/// Decode a raw adapter response for the request that produced it
pub fn decode_response(
    raw: &str,
    request: &ServiceRequest,
) -> Result<ServiceResult, DecodeError> {
    let bytes = match frame_bytes(raw)? {
        Some(bytes) => bytes,
        None => return Ok(ServiceResult::NoData),
    };

    let first = bytes[0];
    if first == NEGATIVE_MARKER {
        if bytes.len() < 3 {
            return Err(DecodeError::ShortNegative);
        }
        return Ok(ServiceResult::Negative(NegativeResponse {
            service_id: bytes[1],
            nrc: bytes[2].into(),
        }));
    }

    let expected = request.positive_marker();
    if first != expected {
        return Err(DecodeError::UnexpectedMarker {
            marker: first,
            expected,
        });
    }
    if bytes.len() < request.min_positive_len() {
        return Err(DecodeError::Truncated {
            expected: request.min_positive_len(),
            actual: bytes.len(),
        });
    }

    Ok(ServiceResult::Positive(bytes[1..].to_vec()))
}

/// Normalize adapter text into frame bytes; `None` is the no-data sentinel
fn frame_bytes(raw: &str) -> Result<Option<Vec<u8>>, DecodeError> {
    if raw.trim().is_empty() {
        return Err(DecodeError::Empty);
    }

    let mut lines: Vec<String> = Vec::new();
    for line in raw.to_ascii_uppercase().split(['\r', '\n']) {
        let squeezed: String = line.chars().filter(|c| !c.is_whitespace()).collect();
        if squeezed.is_empty() || NOISE_LINES.contains(&squeezed.as_str()) {
            continue;
        }
        if squeezed == "NODATA" {
            return Ok(None);
        }
        if FAULT_LINES.contains(&squeezed.as_str()) {
            return Err(DecodeError::AdapterFault(line.trim().to_string()));
        }
        lines.push(squeezed);
    }

    // ISO-TP multi-frame responses arrive as a 3-digit length line followed
    // by "N:"-prefixed segments; keep only the segment data.
    let multi_frame = lines.iter().any(|l| l.contains(':'));
    let mut hex = String::new();
    for line in &lines {
        if let Some((_, segment)) = line.split_once(':') {
            hex.push_str(segment);
        } else if multi_frame && line.len() == 3 && is_hex(line) {
            continue;
        } else {
            hex.push_str(line);
        }
    }

    if hex.is_empty() {
        return Err(DecodeError::Empty);
    }
    if hex.len() % 2 != 0 || !is_hex(&hex) {
        return Err(DecodeError::NotHex(hex));
    }

    let bytes = hex::decode(&hex).map_err(|_| DecodeError::NotHex(hex))?;
    Ok(Some(bytes))
}

fn is_hex(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_hexdigit())
}
