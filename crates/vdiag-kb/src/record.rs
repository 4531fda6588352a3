//! Knowledge base record types
//!
//! All records are read-only after load. Module descriptors live in
//! `vdiag-core`; the remaining record types are defined here.

use vdiag_core::Protocol;

use crate::expr::{CalcExpr, EvalError};

/// A command template: how to ask one module for one thing
///
/// The id is `"<MODULE>.<NAME>"`; `action` is the keyword the template
/// answers to (defaults to the name part of the id).
#[derive(Debug, Clone, PartialEq)]
pub struct CommandTemplate {
    /// Command id, e.g. "ENGINE.READ_DTC"
    pub id: String,
    /// Owning module name (upper-cased)
    pub module: String,
    /// Action keyword this template serves
    pub action: String,
    /// Protocol variant the template runs under
    pub protocol: Protocol,
    /// Service/mode byte
    pub service: u8,
    /// OBD parameter id (modes 01/09)
    pub pid: Option<u8>,
    /// UDS data identifier (0x22)
    pub did: Option<u16>,
    /// UDS sub-function (0x19)
    pub sub_function: Option<u8>,
    /// DTC status mask (0x19)
    pub status_mask: Option<u8>,
    /// DTC group (0x14)
    pub group: Option<u32>,
    /// Routine id (0x31)
    pub routine: Option<u16>,
    /// I/O control id (0x2F)
    pub ioid: Option<u16>,
    /// Security level (0x27)
    pub level: Option<u8>,
}

/// Annotates decoded trouble codes by code prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DtcRule {
    /// Code prefix, e.g. "P01"
    pub prefix: String,
    /// Subsystem the prefix belongs to, e.g. "fuel_air_metering"
    pub system: String,
    /// Free-form description (underscores for spaces)
    pub description: Option<String>,
}

impl DtcRule {
    /// Whether a decoded code falls under this rule
    pub fn covers(&self, code: &str) -> bool {
        code.to_ascii_uppercase().starts_with(&self.prefix)
    }
}

/// Declarative extraction of a physical value from a positive response
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseRule {
    /// Command id the rule applies to
    pub command_id: String,
    /// Uppercase hex prefix the full frame must start with, e.g. "4105"
    pub match_pattern: String,
    /// How many payload bytes after the pattern get bound to `A`, `B`, …
    pub extract_count: usize,
    /// Calculation over the extracted bytes; identity of `A` when absent
    pub calc: Option<CalcExpr>,
    /// Unit label for the computed value
    pub unit: Option<String>,
    /// Signal name, defaults to the name part of the command id
    pub name: String,
}

impl ResponseRule {
    /// Whether this rule matches a full response frame (marker included)
    pub fn matches(&self, frame: &[u8]) -> bool {
        let hex: String = frame.iter().map(|b| format!("{b:02X}")).collect();
        hex.starts_with(&self.match_pattern)
    }

    /// Extract and compute the physical value from a matching frame
    pub fn evaluate(&self, frame: &[u8]) -> Result<f64, EvalError> {
        let skip = self.match_pattern.len() / 2;
        let payload = &frame[skip.min(frame.len())..];

        if payload.len() < self.extract_count {
            // Name the first byte the extraction ran out at
            let missing = (b'A' + payload.len() as u8) as char;
            return Err(EvalError::MissingByte(missing));
        }
        let bound = &payload[..self.extract_count];

        match &self.calc {
            Some(expr) => expr.eval(bound),
            None => bound
                .first()
                .map(|b| *b as f64)
                .ok_or(EvalError::MissingByte('A')),
        }
    }
}

/// Names one bit of a status byte
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitMapping {
    /// Signal or command id the mapping belongs to
    pub id: String,
    /// Bit position, 0 = least significant
    pub bit: u8,
    /// Name of the flag, e.g. "mil_on"
    pub name: String,
}

impl BitMapping {
    /// Whether this flag is set in a status byte
    pub fn is_set(&self, status: u8) -> bool {
        status & (1 << self.bit) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_rule_match_and_eval() {
        let rule = ResponseRule {
            command_id: "ENGINE.COOLANT_TEMP".into(),
            match_pattern: "4105".into(),
            extract_count: 1,
            calc: Some(CalcExpr::parse("A-40").unwrap()),
            unit: Some("C".into()),
            name: "COOLANT_TEMP".into(),
        };

        let frame = [0x41, 0x05, 0x5A];
        assert!(rule.matches(&frame));
        assert_eq!(rule.evaluate(&frame).unwrap(), 50.0);

        assert!(!rule.matches(&[0x41, 0x0C, 0x1A]));
    }

    #[test]
    fn test_response_rule_short_payload() {
        let rule = ResponseRule {
            command_id: "ENGINE.RPM".into(),
            match_pattern: "410C".into(),
            extract_count: 2,
            calc: Some(CalcExpr::parse("(A*256+B)/4").unwrap()),
            unit: Some("rpm".into()),
            name: "RPM".into(),
        };

        assert_eq!(
            rule.evaluate(&[0x41, 0x0C, 0x1A]),
            Err(EvalError::MissingByte('B'))
        );
    }

    #[test]
    fn test_dtc_rule_prefix_cover() {
        let rule = DtcRule {
            prefix: "P01".into(),
            system: "fuel_air_metering".into(),
            description: None,
        };
        assert!(rule.covers("P0102"));
        assert!(!rule.covers("P0304"));
    }

    #[test]
    fn test_bit_mapping() {
        let mapping = BitMapping {
            id: "ENGINE.STATUS".into(),
            bit: 7,
            name: "mil_on".into(),
        };
        assert!(mapping.is_set(0x80));
        assert!(!mapping.is_set(0x7F));
    }
}
