//! Service request variants

use crate::dtc::DtcEncoding;

/// ReadDTCInformation (0x19) sub-functions the engine issues
pub mod dtc_sub_function {
    /// Report number of DTCs matching a status mask
    pub const REPORT_COUNT_BY_STATUS_MASK: u8 = 0x01;
    /// Report DTCs matching a status mask
    pub const REPORT_BY_STATUS_MASK: u8 = 0x02;
    /// Report all supported DTCs
    pub const REPORT_SUPPORTED: u8 = 0x0A;
}

/// A diagnostic service invocation
///
/// One tagged variant per service the engine consumes; every variant goes
/// through the same encode → send → decode path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceRequest {
    /// OBD-II mode 01: current data for a PID
    CurrentData { pid: u8 },
    /// OBD-II mode 03: stored trouble codes
    StoredDtcs,
    /// OBD-II mode 04: clear trouble codes and freeze frames
    ClearStoredDtcs,
    /// OBD-II mode 07: pending trouble codes
    PendingDtcs,
    /// OBD-II mode 09: vehicle information (PID 02 carries the VIN)
    VehicleInfo { pid: u8 },
    /// UDS 0x10: DiagnosticSessionControl
    SessionControl { session: u8 },
    /// UDS 0x14: ClearDiagnosticInformation for a 3-byte group
    ClearDiagnosticInfo { group: u32 },
    /// UDS 0x19: ReadDTCInformation
    ReadDtcInfo { sub_function: u8, status_mask: u8 },
    /// UDS 0x22: ReadDataByIdentifier
    ReadDataById { did: u16 },
    /// UDS 0x27: SecurityAccess seed request (detection probe only)
    SecurityAccessSeed { level: u8 },
    /// UDS 0x2F: InputOutputControl, returnControlToECU — the only
    /// read-safe sub-function
    IoControlProbe { ioid: u16 },
    /// UDS 0x31: RoutineControl, requestRoutineResults only
    RoutineResults { routine_id: u16 },
    /// UDS 0x3E: TesterPresent
    TesterPresent,
}

impl ServiceRequest {
    /// Raw service/mode byte on the wire
    pub fn service_id(&self) -> u8 {
        match self {
            ServiceRequest::CurrentData { .. } => 0x01,
            ServiceRequest::StoredDtcs => 0x03,
            ServiceRequest::ClearStoredDtcs => 0x04,
            ServiceRequest::PendingDtcs => 0x07,
            ServiceRequest::VehicleInfo { .. } => 0x09,
            ServiceRequest::SessionControl { .. } => 0x10,
            ServiceRequest::ClearDiagnosticInfo { .. } => 0x14,
            ServiceRequest::ReadDtcInfo { .. } => 0x19,
            ServiceRequest::ReadDataById { .. } => 0x22,
            ServiceRequest::SecurityAccessSeed { .. } => 0x27,
            ServiceRequest::IoControlProbe { .. } => 0x2F,
            ServiceRequest::RoutineResults { .. } => 0x31,
            ServiceRequest::TesterPresent => 0x3E,
        }
    }

    /// Marker byte a positive response must lead with
    pub fn positive_marker(&self) -> u8 {
        self.service_id() + 0x40
    }

    /// Minimum length of a positive frame, marker byte included
    pub fn min_positive_len(&self) -> usize {
        match self {
            ServiceRequest::CurrentData { .. } | ServiceRequest::VehicleInfo { .. } => 3,
            ServiceRequest::StoredDtcs
            | ServiceRequest::ClearStoredDtcs
            | ServiceRequest::PendingDtcs => 1,
            ServiceRequest::SessionControl { .. }
            | ServiceRequest::SecurityAccessSeed { .. }
            | ServiceRequest::TesterPresent => 2,
            ServiceRequest::ClearDiagnosticInfo { .. } => 1,
            ServiceRequest::ReadDtcInfo { .. } | ServiceRequest::ReadDataById { .. } => 3,
            ServiceRequest::IoControlProbe { .. } | ServiceRequest::RoutineResults { .. } => 4,
        }
    }

    /// DTC encoding carried by a positive response, for variants whose
    /// payload is fault records (the count sub-function carries none)
    pub fn dtc_encoding(&self) -> Option<DtcEncoding> {
        match self {
            ServiceRequest::StoredDtcs | ServiceRequest::PendingDtcs => Some(DtcEncoding::Obd2),
            ServiceRequest::ReadDtcInfo { sub_function, .. }
                if *sub_function != dtc_sub_function::REPORT_COUNT_BY_STATUS_MASK =>
            {
                Some(DtcEncoding::Uds)
            }
            _ => None,
        }
    }
}
