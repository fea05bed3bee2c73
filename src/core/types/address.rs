//! Console address constants and hex text conversion at the boundary

use super::error::{MemoryError, MemoryResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A virtual address as seen by the guest CPU
pub type ConsoleAddress = u32;

/// First address of MEM1
pub const MEM1_START: ConsoleAddress = 0x8000_0000;
/// First address of MEM2 (Wii only)
pub const MEM2_START: ConsoleAddress = 0x9000_0000;
/// First address of the ARAM alias (GameCube only)
pub const ARAM_START: ConsoleAddress = 0x7E00_0000;
/// Real size of ARAM
pub const ARAM_SIZE: u32 = 0x0100_0000;
/// Size the emulator reserves for ARAM in its host mapping
pub const ARAM_FAKESIZE: u32 = 0x0200_0000;
/// One past the last ARAM address
pub const ARAM_END: ConsoleAddress = ARAM_START + ARAM_SIZE;

/// Stock MEM1 size (24 MiB)
pub const DEFAULT_MEM1_SIZE: u32 = 0x0180_0000;
/// Stock MEM2 size (64 MiB)
pub const DEFAULT_MEM2_SIZE: u32 = 0x0400_0000;

/// One of the emulated RAM regions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryRegion {
    /// GameCube auxiliary RAM
    Aram,
    /// Main RAM, always present
    Mem1,
    /// Wii extra RAM
    Mem2,
}

impl MemoryRegion {
    /// First console address of the region
    pub const fn start(&self) -> ConsoleAddress {
        match self {
            MemoryRegion::Aram => ARAM_START,
            MemoryRegion::Mem1 => MEM1_START,
            MemoryRegion::Mem2 => MEM2_START,
        }
    }
}

impl fmt::Display for MemoryRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryRegion::Aram => write!(f, "ARAM"),
            MemoryRegion::Mem1 => write!(f, "MEM1"),
            MemoryRegion::Mem2 => write!(f, "MEM2"),
        }
    }
}

/// Parses a console address written in hexadecimal.
///
/// Accepts an optional `0x`/`0X`/`$` prefix. Bare text is always hexadecimal.
pub fn parse_console_address(s: &str) -> MemoryResult<ConsoleAddress> {
    let s = s.trim();
    let digits = strip_hex_prefix(s);

    if digits.is_empty() {
        return Err(MemoryError::invalid_input(format!("empty address: {:?}", s)));
    }

    u32::from_str_radix(digits, 16)
        .map_err(|_| MemoryError::invalid_input(format!("invalid address: {}", s)))
}

/// Formats a console address as eight uppercase hex digits
pub fn format_console_address(address: ConsoleAddress) -> String {
    format!("{:08X}", address)
}

/// Parses a signed pointer offset written in hexadecimal (`-10`, `0x1C`)
pub fn parse_pointer_offset(s: &str) -> MemoryResult<i32> {
    let s = s.trim();
    let (negative, rest) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let digits = strip_hex_prefix(rest);

    let magnitude = i64::from_str_radix(digits, 16)
        .map_err(|_| MemoryError::invalid_input(format!("invalid pointer offset: {}", s)))?;
    let value = if negative { -magnitude } else { magnitude };

    i32::try_from(value)
        .map_err(|_| MemoryError::invalid_input(format!("pointer offset out of range: {}", s)))
}

/// Formats a signed pointer offset as uppercase hex with a leading `-` when negative
pub fn format_pointer_offset(offset: i32) -> String {
    if offset < 0 {
        format!("-{:X}", (offset as i64).unsigned_abs())
    } else {
        format!("{:X}", offset)
    }
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .or_else(|| s.strip_prefix('$'))
        .unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parsing() {
        assert_eq!(parse_console_address("0x80001000").unwrap(), 0x8000_1000);
        assert_eq!(parse_console_address("0X80001000").unwrap(), 0x8000_1000);
        assert_eq!(parse_console_address("$80001000").unwrap(), 0x8000_1000);
        assert_eq!(parse_console_address("80001000").unwrap(), 0x8000_1000);
        assert_eq!(parse_console_address(" 1000 ").unwrap(), 0x1000);

        assert!(parse_console_address("").is_err());
        assert!(parse_console_address("0x").is_err());
        assert!(parse_console_address("XYZ").is_err());
        assert!(parse_console_address("100000000").is_err());
    }

    #[test]
    fn test_address_display() {
        assert_eq!(format_console_address(0x8000_ABCD), "8000ABCD");
        assert_eq!(format_console_address(0x10), "00000010");
    }

    #[test]
    fn test_pointer_offsets() {
        assert_eq!(parse_pointer_offset("10").unwrap(), 0x10);
        assert_eq!(parse_pointer_offset("-0x10").unwrap(), -0x10);
        assert_eq!(parse_pointer_offset("+4").unwrap(), 4);
        assert!(parse_pointer_offset("FFFFFFFFF").is_err());

        assert_eq!(format_pointer_offset(0x1C), "1C");
        assert_eq!(format_pointer_offset(-0x10), "-10");
        assert_eq!(format_pointer_offset(i32::MIN), "-80000000");
        assert_eq!(parse_pointer_offset(&format_pointer_offset(i32::MIN)).unwrap(), i32::MIN);
    }

    #[test]
    fn test_region_start() {
        assert_eq!(MemoryRegion::Mem1.start(), MEM1_START);
        assert_eq!(MemoryRegion::Mem2.start(), MEM2_START);
        assert_eq!(MemoryRegion::Aram.start(), ARAM_START);
        assert_eq!(MemoryRegion::Aram.to_string(), "ARAM");
    }
}
