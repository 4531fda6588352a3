//! Shared diagnostic models

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Protocol variant a command runs under
///
/// Execution records and the feedback ledger key on this, so the engine can
/// learn which variant a given module/action pair actually answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// SAE J1979 OBD-II services (modes 01/03/04/07/09)
    StandardObd,
    /// ISO 14229 UDS services
    Uds,
    /// Manufacturer-specific variant layered on UDS service IDs
    Manufacturer,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::StandardObd => "standard_obd",
            Protocol::Uds => "uds",
            Protocol::Manufacturer => "manufacturer",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard_obd" | "obd" | "obd2" => Ok(Protocol::StandardObd),
            "uds" => Ok(Protocol::Uds),
            "manufacturer" | "oem" => Ok(Protocol::Manufacturer),
            other => Err(format!("unknown protocol: {other}")),
        }
    }
}

/// Physical bus a module answers on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bus {
    /// CAN at 11-bit addressing (adapter protocol 6)
    Can,
    /// CAN at 29-bit addressing (adapter protocol 7)
    CanExtended,
    /// ISO 9141-2 / KWP K-line
    KLine,
}

impl Bus {
    /// Adapter protocol number for the `AT SP` configuration command
    pub fn adapter_protocol(&self) -> u8 {
        match self {
            Bus::Can => 6,
            Bus::CanExtended => 7,
            Bus::KLine => 3,
        }
    }
}

impl fmt::Display for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Bus::Can => "can",
            Bus::CanExtended => "can_extended",
            Bus::KLine => "kline",
        };
        f.write_str(s)
    }
}

impl FromStr for Bus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "can" => Ok(Bus::Can),
            "can_extended" | "can29" => Ok(Bus::CanExtended),
            "kline" | "k-line" | "iso9141" => Ok(Bus::KLine),
            other => Err(format!("unknown bus: {other}")),
        }
    }
}

/// Identity of an ECU as the knowledge base describes it
///
/// Loaded once per vehicle and immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// Module name, upper-cased at load (e.g. "ENGINE", "HVAC")
    pub name: String,
    /// Request header / arbitration ID (e.g. 0x7E0)
    pub address: u16,
    /// Protocol variant the module natively speaks
    pub protocol: Protocol,
    /// Bus the module answers on
    pub bus: Bus,
}

impl ModuleDescriptor {
    /// Header formatted for the adapter's set-header command
    pub fn header_string(&self) -> String {
        format!("{:03X}", self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_round_trip() {
        for p in [Protocol::StandardObd, Protocol::Uds, Protocol::Manufacturer] {
            assert_eq!(p.as_str().parse::<Protocol>().unwrap(), p);
        }
        assert!("isotp".parse::<Protocol>().is_err());
    }

    #[test]
    fn test_header_string() {
        let module = ModuleDescriptor {
            name: "ENGINE".into(),
            address: 0x7E0,
            protocol: Protocol::StandardObd,
            bus: Bus::Can,
        };
        assert_eq!(module.header_string(), "7E0");
    }
}
