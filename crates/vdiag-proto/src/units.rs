//! Numeric conventions for raw payload fields
//!
//! Temperature bytes carry a +40 offset; multi-byte speed/RPM fields are
//! big-endian.

/// Temperature byte to degrees Celsius
pub fn temperature_celsius(byte: u8) -> i32 {
    byte as i32 - 40
}

/// Big-endian 16-bit field
pub fn be_u16(hi: u8, lo: u8) -> u16 {
    u16::from_be_bytes([hi, lo])
}

/// Engine RPM from its two payload bytes (quarter-RPM resolution)
pub fn engine_rpm(hi: u8, lo: u8) -> f64 {
    be_u16(hi, lo) as f64 / 4.0
}
