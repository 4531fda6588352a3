//! Diagnostic trouble code decoding
//!
//! Two wire forms exist for the same value type: OBD-II packs a code into
//! 2 bytes (SAE J2012), UDS into 3 bytes plus a status byte (ISO 14229-1).
//! Both decoders are pure functions; truncated or malformed input is an
//! error, never a guessed code.

use serde::Serialize;

use crate::error::DecodeError;

/// System prefix selected by the top two bits of the first DTC byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DtcPrefix {
    /// Powertrain
    P,
    /// Chassis
    C,
    /// Body
    B,
    /// Network
    U,
}

impl DtcPrefix {
    /// Prefix from the top two bits of the leading byte
    pub fn from_high_bits(byte: u8) -> Self {
        match (byte >> 6) & 0x03 {
            0 => DtcPrefix::P,
            1 => DtcPrefix::C,
            2 => DtcPrefix::B,
            _ => DtcPrefix::U,
        }
    }

    /// The two bits this prefix contributes to the leading byte
    pub fn high_bits(&self) -> u8 {
        match self {
            DtcPrefix::P => 0,
            DtcPrefix::C => 1,
            DtcPrefix::B => 2,
            DtcPrefix::U => 3,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            DtcPrefix::P => 'P',
            DtcPrefix::C => 'C',
            DtcPrefix::B => 'B',
            DtcPrefix::U => 'U',
        }
    }
}

impl std::fmt::Display for DtcPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// DTC status bitmask per ISO 14229-1 (UDS form only; OBD-II carries none)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DtcStatus {
    /// Raw status byte as received
    pub raw: u8,
}

impl DtcStatus {
    pub const TEST_FAILED: u8 = 0x01;
    pub const PENDING: u8 = 0x04;
    pub const CONFIRMED: u8 = 0x08;
    pub const TEST_FAILED_SINCE_CLEAR: u8 = 0x20;
    pub const WARNING_INDICATOR: u8 = 0x80;

    pub fn from_byte(raw: u8) -> Self {
        Self { raw }
    }

    pub fn test_failed(&self) -> bool {
        self.raw & Self::TEST_FAILED != 0
    }

    pub fn pending(&self) -> bool {
        self.raw & Self::PENDING != 0
    }

    pub fn confirmed(&self) -> bool {
        self.raw & Self::CONFIRMED != 0
    }

    pub fn warning_indicator(&self) -> bool {
        self.raw & Self::WARNING_INDICATOR != 0
    }

    /// Failed now and confirmed stored
    pub fn is_active(&self) -> bool {
        self.test_failed() && self.confirmed()
    }

    pub fn matches_mask(&self, mask: u8) -> bool {
        self.raw & mask != 0
    }
}

/// Which wire form a DTC payload uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtcEncoding {
    /// 2 bytes per code (OBD-II modes 03/07)
    Obd2,
    /// 3 bytes per code plus a status byte (UDS 0x19)
    Uds,
}

/// A decoded diagnostic trouble code
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticTroubleCode {
    /// System prefix
    pub prefix: DtcPrefix,
    /// Hex digits after the prefix: four for OBD-II, six for UDS (the
    /// trailing pair is the failure-type byte)
    pub digits: String,
    /// Source bytes exactly as received
    pub raw: Vec<u8>,
    /// Status mask, present on the UDS form only
    pub status: Option<DtcStatus>,
}

impl DiagnosticTroubleCode {
    /// Display form, e.g. "P0102" or "U012345"
    pub fn code(&self) -> String {
        format!("{}{}", self.prefix.as_char(), self.digits)
    }

    /// Re-encode into the 2-byte OBD-II form
    pub fn to_obd2_bytes(&self) -> Result<[u8; 2], DecodeError> {
        let nibbles = digit_nibbles(&self.digits, 4)?;
        Ok([
            (self.prefix.high_bits() << 6) | (nibbles[0] << 4) | nibbles[1],
            (nibbles[2] << 4) | nibbles[3],
        ])
    }

    /// Re-encode into the 3-byte + status UDS form
    pub fn to_uds_bytes(&self) -> Result<[u8; 4], DecodeError> {
        let nibbles = digit_nibbles(&self.digits, 6)?;
        Ok([
            (self.prefix.high_bits() << 6) | (nibbles[0] << 4) | nibbles[1],
            (nibbles[2] << 4) | nibbles[3],
            (nibbles[4] << 4) | nibbles[5],
            self.status.map(|s| s.raw).unwrap_or(0),
        ])
    }
}

impl std::fmt::Display for DiagnosticTroubleCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.code())
    }
}

/// Decode a fault payload into trouble codes
///
/// `bytes` is the payload after the positive-response header: plain code
/// records for OBD-II, `[sub-function] [availability mask] records…` having
/// already been stripped by the caller for UDS. A record that does not
/// divide evenly is a [`DecodeError::TruncatedDtc`].
pub fn decode_dtcs(
    bytes: &[u8],
    encoding: DtcEncoding,
) -> Result<Vec<DiagnosticTroubleCode>, DecodeError> {
    match encoding {
        DtcEncoding::Obd2 => {
            if bytes.len() % 2 != 0 {
                return Err(DecodeError::TruncatedDtc(bytes.len() % 2));
            }
            Ok(bytes
                .chunks_exact(2)
                .filter(|pair| pair[0] != 0x00 || pair[1] != 0x00) // padding in fixed frames
                .map(|pair| decode_obd2_pair(pair[0], pair[1]))
                .collect())
        }
        DtcEncoding::Uds => {
            if bytes.len() % 4 != 0 {
                return Err(DecodeError::TruncatedDtc(bytes.len() % 4));
            }
            Ok(bytes
                .chunks_exact(4)
                .map(|rec| decode_uds_record(rec[0], rec[1], rec[2], rec[3]))
                .collect())
        }
    }
}

/// 2-byte OBD-II form: top 2 bits select the prefix, the remaining 14 bits
/// form four digits.
pub fn decode_obd2_pair(b0: u8, b1: u8) -> DiagnosticTroubleCode {
    DiagnosticTroubleCode {
        prefix: DtcPrefix::from_high_bits(b0),
        digits: format!("{:01X}{:01X}{:02X}", (b0 >> 4) & 0x03, b0 & 0x0F, b1),
        raw: vec![b0, b1],
        status: None,
    }
}

/// 3-byte + status UDS form: top 2 bits of byte 0 select the prefix, the
/// remaining bits plus bytes 1-2 form the digits, byte 3 is the status mask.
pub fn decode_uds_record(b0: u8, b1: u8, b2: u8, status: u8) -> DiagnosticTroubleCode {
    DiagnosticTroubleCode {
        prefix: DtcPrefix::from_high_bits(b0),
        digits: format!(
            "{:01X}{:01X}{:02X}{:02X}",
            (b0 >> 4) & 0x03,
            b0 & 0x0F,
            b1,
            b2
        ),
        raw: vec![b0, b1, b2, status],
        status: Some(DtcStatus::from_byte(status)),
    }
}

fn digit_nibbles(digits: &str, expected: usize) -> Result<Vec<u8>, DecodeError> {
    let bad = || DecodeError::BadDtcDigits {
        expected,
        actual: digits.to_string(),
    };

    if digits.len() != expected {
        return Err(bad());
    }
    let nibbles: Vec<u8> = digits
        .chars()
        .map(|c| c.to_digit(16).map(|d| d as u8))
        .collect::<Option<_>>()
        .ok_or_else(bad)?;
    // The digit after the prefix only has two bits on the wire
    if nibbles[0] > 3 {
        return Err(bad());
    }
    Ok(nibbles)
}
