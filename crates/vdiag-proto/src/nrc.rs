//! UDS Negative Response Codes and their disposition

use std::fmt;

/// How a negative response should be treated by retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NrcDisposition {
    /// The ECU is still working or busy; a bounded re-read may succeed
    Retryable,
    /// Security, range or support problem; this protocol variant is
    /// unusable for the request
    Terminal,
}

/// Negative Response Codes consumed by the engine (ISO 14229-1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegativeResponseCode {
    GeneralReject,
    ServiceNotSupported,
    SubFunctionNotSupported,
    IncorrectMessageLengthOrFormat,
    BusyRepeatRequest,
    ConditionsNotCorrect,
    RequestSequenceError,
    RequestOutOfRange,
    SecurityAccessDenied,
    InvalidKey,
    ExceededNumberOfAttempts,
    RequiredTimeDelayNotExpired,
    ResponsePending,
    SubFunctionNotSupportedInActiveSession,
    ServiceNotSupportedInActiveSession,
    /// Any code the engine has no dedicated handling for
    Unknown(u8),
}

impl NegativeResponseCode {
    /// Retry disposition for this code
    pub fn disposition(&self) -> NrcDisposition {
        match self {
            NegativeResponseCode::ResponsePending | NegativeResponseCode::BusyRepeatRequest => {
                NrcDisposition::Retryable
            }
            _ => NrcDisposition::Terminal,
        }
    }
}

impl From<u8> for NegativeResponseCode {
    fn from(value: u8) -> Self {
        match value {
            0x10 => Self::GeneralReject,
            0x11 => Self::ServiceNotSupported,
            0x12 => Self::SubFunctionNotSupported,
            0x13 => Self::IncorrectMessageLengthOrFormat,
            0x21 => Self::BusyRepeatRequest,
            0x22 => Self::ConditionsNotCorrect,
            0x24 => Self::RequestSequenceError,
            0x31 => Self::RequestOutOfRange,
            0x33 => Self::SecurityAccessDenied,
            0x35 => Self::InvalidKey,
            0x36 => Self::ExceededNumberOfAttempts,
            0x37 => Self::RequiredTimeDelayNotExpired,
            0x78 => Self::ResponsePending,
            0x7E => Self::SubFunctionNotSupportedInActiveSession,
            0x7F => Self::ServiceNotSupportedInActiveSession,
            other => Self::Unknown(other),
        }
    }
}

impl From<NegativeResponseCode> for u8 {
    fn from(nrc: NegativeResponseCode) -> Self {
        match nrc {
            NegativeResponseCode::GeneralReject => 0x10,
            NegativeResponseCode::ServiceNotSupported => 0x11,
            NegativeResponseCode::SubFunctionNotSupported => 0x12,
            NegativeResponseCode::IncorrectMessageLengthOrFormat => 0x13,
            NegativeResponseCode::BusyRepeatRequest => 0x21,
            NegativeResponseCode::ConditionsNotCorrect => 0x22,
            NegativeResponseCode::RequestSequenceError => 0x24,
            NegativeResponseCode::RequestOutOfRange => 0x31,
            NegativeResponseCode::SecurityAccessDenied => 0x33,
            NegativeResponseCode::InvalidKey => 0x35,
            NegativeResponseCode::ExceededNumberOfAttempts => 0x36,
            NegativeResponseCode::RequiredTimeDelayNotExpired => 0x37,
            NegativeResponseCode::ResponsePending => 0x78,
            NegativeResponseCode::SubFunctionNotSupportedInActiveSession => 0x7E,
            NegativeResponseCode::ServiceNotSupportedInActiveSession => 0x7F,
            NegativeResponseCode::Unknown(v) => v,
        }
    }
}

impl fmt::Display for NegativeResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(v) => write!(f, "unknown NRC 0x{v:02X}"),
            other => write!(f, "{other:?}"),
        }
    }
}

impl fmt::UpperHex for NegativeResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value: u8 = (*self).into();
        fmt::UpperHex::fmt(&value, f)
    }
}

/// A decoded `7F <service> <NRC>` frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegativeResponse {
    /// Service ID the ECU rejected
    pub service_id: u8,
    /// Why it rejected it
    pub nrc: NegativeResponseCode,
}

impl NegativeResponse {
    pub fn disposition(&self) -> NrcDisposition {
        self.nrc.disposition()
    }

    pub fn is_retryable(&self) -> bool {
        self.disposition() == NrcDisposition::Retryable
    }
}

impl fmt::Display for NegativeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (0x{:02X}) for service 0x{:02X}",
            self.nrc, self.nrc, self.service_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_out_of_range_is_terminal() {
        let neg = NegativeResponse {
            service_id: 0x19,
            nrc: NegativeResponseCode::from(0x31),
        };
        assert_eq!(neg.nrc, NegativeResponseCode::RequestOutOfRange);
        assert_eq!(neg.disposition(), NrcDisposition::Terminal);
    }

    #[test]
    fn test_response_pending_is_retryable() {
        assert_eq!(
            NegativeResponseCode::from(0x78).disposition(),
            NrcDisposition::Retryable
        );
        assert_eq!(
            NegativeResponseCode::from(0x21).disposition(),
            NrcDisposition::Retryable
        );
    }

    #[test]
    fn test_security_and_unknown_are_terminal() {
        for raw in [0x33u8, 0x35, 0x36, 0x37, 0x11, 0x7F, 0xA5] {
            assert_eq!(
                NegativeResponseCode::from(raw).disposition(),
                NrcDisposition::Terminal,
                "NRC 0x{raw:02X}"
            );
        }
    }

    #[test]
    fn test_round_trip_raw_value() {
        for raw in 0x00u8..=0xFF {
            let nrc = NegativeResponseCode::from(raw);
            assert_eq!(u8::from(nrc), raw);
        }
    }
}
