//! Element types, numeric bases and the text <-> raw bytes codec
//!
//! Raw bytes are always kept in guest order (big-endian). Formatting turns a
//! slice of guest bytes into display text, parsing turns user text into guest
//! bytes of the configured type.

use super::error::{MemoryError, MemoryResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Text shown for a value that cannot be read or resolved
pub const UNKNOWN_VALUE: &str = "???";

/// Character encoding of a fixed-width string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringEncoding {
    #[default]
    Utf8,
    Utf16,
    Utf32,
}

impl StringEncoding {
    /// Size of one code unit in bytes
    pub const fn unit_size(&self) -> usize {
        match self {
            StringEncoding::Utf8 => 1,
            StringEncoding::Utf16 => 2,
            StringEncoding::Utf32 => 4,
        }
    }
}

/// Element type of a watched or scanned value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemType {
    Byte,
    Halfword,
    #[default]
    Word,
    Float,
    Double,
    Doubleword,
    String(StringEncoding),
    ByteArray,
}

impl MemType {
    /// Size in bytes of fixed-width types
    pub const fn fixed_size(&self) -> Option<usize> {
        match self {
            MemType::Byte => Some(1),
            MemType::Halfword => Some(2),
            MemType::Word | MemType::Float => Some(4),
            MemType::Double | MemType::Doubleword => Some(8),
            MemType::String(_) | MemType::ByteArray => None,
        }
    }

    /// Size in bytes of a value of this type; `length` counts code units for
    /// strings and bytes for byte arrays and is ignored otherwise
    pub const fn size(&self, length: usize) -> usize {
        match self {
            MemType::String(encoding) => length * encoding.unit_size(),
            MemType::ByteArray => length,
            _ => match self.fixed_size() {
                Some(size) => size,
                None => 0,
            },
        }
    }

    /// Natural alignment of the type on the guest
    pub const fn alignment(&self) -> usize {
        match self {
            MemType::Byte | MemType::ByteArray => 1,
            MemType::Halfword => 2,
            MemType::Word | MemType::Float | MemType::Double | MemType::Doubleword => 4,
            MemType::String(encoding) => encoding.unit_size(),
        }
    }

    /// Whether the type is a fixed-width integer
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            MemType::Byte | MemType::Halfword | MemType::Word | MemType::Doubleword
        )
    }

    /// Whether values of the type are ordered numbers
    pub const fn is_numeric(&self) -> bool {
        !matches!(self, MemType::String(_) | MemType::ByteArray)
    }

    /// Whether the type has a configurable length
    pub const fn has_length(&self) -> bool {
        matches!(self, MemType::String(_) | MemType::ByteArray)
    }
}

impl fmt::Display for MemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemType::Byte => write!(f, "byte"),
            MemType::Halfword => write!(f, "halfword"),
            MemType::Word => write!(f, "word"),
            MemType::Float => write!(f, "float"),
            MemType::Double => write!(f, "double"),
            MemType::Doubleword => write!(f, "doubleword"),
            MemType::String(StringEncoding::Utf8) => write!(f, "string"),
            MemType::String(StringEncoding::Utf16) => write!(f, "utf16 string"),
            MemType::String(StringEncoding::Utf32) => write!(f, "utf32 string"),
            MemType::ByteArray => write!(f, "byte array"),
        }
    }
}

/// Numeric base used to display and parse values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemBase {
    #[default]
    Decimal,
    Hexadecimal,
    Octal,
    Binary,
}

impl MemBase {
    /// Radix of the base
    pub const fn radix(&self) -> u32 {
        match self {
            MemBase::Decimal => 10,
            MemBase::Hexadecimal => 16,
            MemBase::Octal => 8,
            MemBase::Binary => 2,
        }
    }
}

/// Signedness of integer interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signedness {
    #[default]
    Signed,
    Unsigned,
}

/// A numeric interpretation of raw guest bytes used for scan comparisons
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i128),
    F32(f32),
    F64(f64),
}

impl Number {
    /// Decodes guest bytes of a numeric type
    pub fn decode(bytes: &[u8], ty: MemType, signedness: Signedness) -> Option<Number> {
        let size = ty.fixed_size()?;
        let bytes = bytes.get(..size)?;
        let signed = signedness == Signedness::Signed;

        let number = match ty {
            MemType::Float => Number::F32(f32::from_be_bytes(bytes.try_into().ok()?)),
            MemType::Double => Number::F64(f64::from_be_bytes(bytes.try_into().ok()?)),
            _ => {
                let raw = be_bits(bytes);
                let value = if signed {
                    sign_extend(raw, size) as i128
                } else {
                    raw as i128
                };
                Number::Int(value)
            }
        };

        Some(number)
    }

    /// True for floating point NaN
    pub fn is_nan(&self) -> bool {
        match self {
            Number::Int(_) => false,
            Number::F32(v) => v.is_nan(),
            Number::F64(v) => v.is_nan(),
        }
    }

    /// Compares two numbers of the same kind; `None` when either is NaN
    pub fn compare(&self, other: &Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(b)),
            (Number::F32(a), Number::F32(b)) => a.partial_cmp(b),
            (Number::F64(a), Number::F64(b)) => a.partial_cmp(b),
            _ => None,
        }
    }

    /// Checks `self == base + delta` in the arithmetic of the value's type
    pub fn equals_offset(&self, base: &Number, delta: &Number) -> bool {
        match (self, base, delta) {
            (Number::Int(v), Number::Int(b), Number::Int(d)) => *v == b + d,
            (Number::F32(v), Number::F32(b), Number::F32(d)) => *v == b + d,
            (Number::F64(v), Number::F64(b), Number::F64(d)) => *v == b + d,
            _ => false,
        }
    }
}

/// Formats guest bytes as display text for the given type and base
pub fn format_memory(bytes: &[u8], ty: MemType, base: MemBase, signedness: Signedness) -> String {
    match ty {
        MemType::String(encoding) => decode_string(bytes, encoding),
        MemType::ByteArray => bytes
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" "),
        MemType::Float | MemType::Double => format_float(bytes, ty, base),
        _ => format_integer(bytes, ty, base, signedness),
    }
}

/// Parses user text into guest bytes of the given type.
///
/// `max_length` bounds strings (in code units) and byte arrays (in bytes).
pub fn parse_memory(
    text: &str,
    ty: MemType,
    base: MemBase,
    signedness: Signedness,
    max_length: usize,
) -> MemoryResult<Vec<u8>> {
    match ty {
        MemType::String(encoding) => parse_string(text, encoding, max_length),
        MemType::ByteArray => parse_byte_array(text, max_length),
        MemType::Float => parse_float32(text.trim(), base),
        MemType::Double => parse_float64(text.trim(), base),
        _ => parse_integer(text.trim(), ty, base, signedness),
    }
}

fn be_bits(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

fn sign_extend(raw: u64, size: usize) -> i64 {
    let shift = 64 - size * 8;
    ((raw << shift) as i64) >> shift
}

fn format_integer(bytes: &[u8], ty: MemType, base: MemBase, signedness: Signedness) -> String {
    let size = match ty.fixed_size() {
        Some(size) if bytes.len() >= size => size,
        _ => return UNKNOWN_VALUE.to_string(),
    };
    let raw = be_bits(&bytes[..size]);

    match base {
        MemBase::Decimal => match signedness {
            Signedness::Signed => sign_extend(raw, size).to_string(),
            Signedness::Unsigned => raw.to_string(),
        },
        MemBase::Hexadecimal => format!("{:X}", raw),
        MemBase::Octal => format!("{:o}", raw),
        MemBase::Binary => format!("{:0width$b}", raw, width = size * 8),
    }
}

fn format_float(bytes: &[u8], ty: MemType, base: MemBase) -> String {
    let size = match ty.fixed_size() {
        Some(size) if bytes.len() >= size => size,
        _ => return UNKNOWN_VALUE.to_string(),
    };
    let raw = be_bits(&bytes[..size]);

    if base == MemBase::Hexadecimal {
        return format!("{:0width$X}", raw, width = size * 2);
    }

    // Shortest text that parses back to the same bits.
    match ty {
        MemType::Float => format!("{}", f32::from_bits(raw as u32)),
        _ => format!("{}", f64::from_bits(raw)),
    }
}

fn decode_string(bytes: &[u8], encoding: StringEncoding) -> String {
    match encoding {
        StringEncoding::Utf8 => {
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            String::from_utf8_lossy(&bytes[..end]).into_owned()
        }
        StringEncoding::Utf16 => {
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .take_while(|&u| u != 0)
                .collect();
            String::from_utf16_lossy(&units)
        }
        StringEncoding::Utf32 => bytes
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .take_while(|&u| u != 0)
            .map(|u| char::from_u32(u).unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect(),
    }
}

fn parse_integer(
    text: &str,
    ty: MemType,
    base: MemBase,
    signedness: Signedness,
) -> MemoryResult<Vec<u8>> {
    let size = ty
        .fixed_size()
        .ok_or_else(|| MemoryError::invalid_input(format!("{} is not an integer type", ty)))?;
    let bits = (size * 8) as u32;
    let invalid = || MemoryError::invalid_input(format!("{:?} is not a valid {} value", text, ty));

    if text.is_empty() {
        return Err(invalid());
    }

    let raw: u64 = match base {
        MemBase::Decimal => {
            let value: i128 = text.parse().map_err(|_| invalid())?;
            let (min, max) = match signedness {
                Signedness::Signed => (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1),
                Signedness::Unsigned => (0, (1i128 << bits) - 1),
            };
            if value < min || value > max {
                return Err(invalid());
            }
            value as u64
        }
        _ => {
            let digits = strip_radix_prefix(text, base);
            if digits.is_empty() || digits.starts_with('+') {
                return Err(invalid());
            }
            let value = u128::from_str_radix(digits, base.radix()).map_err(|_| invalid())?;
            if value >> bits != 0 {
                return Err(invalid());
            }
            value as u64
        }
    };

    Ok(raw.to_be_bytes()[8 - size..].to_vec())
}

fn strip_radix_prefix(text: &str, base: MemBase) -> &str {
    let prefixes: &[&str] = match base {
        MemBase::Hexadecimal => &["0x", "0X"],
        MemBase::Octal => &["0o", "0O"],
        MemBase::Binary => &["0b", "0B"],
        MemBase::Decimal => &[],
    };
    prefixes
        .iter()
        .find_map(|p| text.strip_prefix(p))
        .unwrap_or(text)
}

fn parse_float32(text: &str, base: MemBase) -> MemoryResult<Vec<u8>> {
    let invalid = || MemoryError::invalid_input(format!("{:?} is not a valid float", text));
    match base {
        MemBase::Decimal => {
            let value: f32 = text.parse().map_err(|_| invalid())?;
            Ok(value.to_be_bytes().to_vec())
        }
        MemBase::Hexadecimal => {
            let digits = strip_radix_prefix(text, base);
            let bits = u32::from_str_radix(digits, 16).map_err(|_| invalid())?;
            Ok(bits.to_be_bytes().to_vec())
        }
        _ => Err(MemoryError::invalid_input(format!(
            "base {:?} does not apply to floating point values",
            base
        ))),
    }
}

fn parse_float64(text: &str, base: MemBase) -> MemoryResult<Vec<u8>> {
    let invalid = || MemoryError::invalid_input(format!("{:?} is not a valid double", text));
    match base {
        MemBase::Decimal => {
            let value: f64 = text.parse().map_err(|_| invalid())?;
            Ok(value.to_be_bytes().to_vec())
        }
        MemBase::Hexadecimal => {
            let digits = strip_radix_prefix(text, base);
            let bits = u64::from_str_radix(digits, 16).map_err(|_| invalid())?;
            Ok(bits.to_be_bytes().to_vec())
        }
        _ => Err(MemoryError::invalid_input(format!(
            "base {:?} does not apply to floating point values",
            base
        ))),
    }
}

fn parse_string(text: &str, encoding: StringEncoding, max_length: usize) -> MemoryResult<Vec<u8>> {
    if text.is_empty() {
        return Err(MemoryError::invalid_input("empty string"));
    }

    let (bytes, units) = match encoding {
        StringEncoding::Utf8 => (text.as_bytes().to_vec(), text.len()),
        StringEncoding::Utf16 => {
            let units: Vec<u16> = text.encode_utf16().collect();
            let bytes = units.iter().flat_map(|u| u.to_be_bytes()).collect();
            (bytes, units.len())
        }
        StringEncoding::Utf32 => {
            let bytes: Vec<u8> = text.chars().flat_map(|c| (c as u32).to_be_bytes()).collect();
            (bytes, text.chars().count())
        }
    };

    if units > max_length {
        return Err(MemoryError::input_too_long(max_length, units));
    }
    Ok(bytes)
}

fn parse_byte_array(text: &str, max_length: usize) -> MemoryResult<Vec<u8>> {
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.is_empty() {
        return Err(MemoryError::invalid_input("empty byte array"));
    }

    let bytes = hex::decode(&digits)
        .map_err(|e| MemoryError::invalid_input(format!("invalid byte array {:?}: {}", text, e)))?;

    if bytes.len() > max_length {
        return Err(MemoryError::input_too_long(max_length, bytes.len()));
    }
    Ok(bytes)
}
