//! Scan filter and scan settings types

use super::address::{format_console_address, parse_console_address, ConsoleAddress};
use super::error::MemoryError;
use super::value::{MemBase, MemType, Signedness};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Predicate used to keep or discard candidate addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanFilter {
    Exact,
    UnknownInitial,
    Increased,
    IncreasedBy,
    Decreased,
    DecreasedBy,
    Changed,
    Unchanged,
    Between,
    BiggerThan,
    SmallerThan,
}

impl ScanFilter {
    /// Checks if this filter compares against the previous snapshot
    pub fn requires_previous(&self) -> bool {
        matches!(
            self,
            ScanFilter::Increased
                | ScanFilter::IncreasedBy
                | ScanFilter::Decreased
                | ScanFilter::DecreasedBy
                | ScanFilter::Changed
                | ScanFilter::Unchanged
        )
    }

    /// Checks if this filter takes a first term
    pub fn requires_value(&self) -> bool {
        matches!(
            self,
            ScanFilter::Exact
                | ScanFilter::IncreasedBy
                | ScanFilter::DecreasedBy
                | ScanFilter::Between
                | ScanFilter::BiggerThan
                | ScanFilter::SmallerThan
        )
    }

    /// Checks if this filter takes a second term
    pub fn requires_second_value(&self) -> bool {
        *self == ScanFilter::Between
    }

    /// Checks if this filter may start a scan
    pub fn allowed_on_first_scan(&self) -> bool {
        matches!(
            self,
            ScanFilter::Exact
                | ScanFilter::UnknownInitial
                | ScanFilter::Between
                | ScanFilter::BiggerThan
                | ScanFilter::SmallerThan
        )
    }

    /// Checks if this filter may narrow an active scan
    pub fn allowed_on_next_scan(&self) -> bool {
        *self != ScanFilter::UnknownInitial
    }
}

impl FromStr for ScanFilter {
    type Err = MemoryError;

    /// Accepts snake or kebab case names (`increased_by`, `increased-by`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let filter = match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "exact" => ScanFilter::Exact,
            "unknown" | "unknown_initial" => ScanFilter::UnknownInitial,
            "increased" => ScanFilter::Increased,
            "increased_by" => ScanFilter::IncreasedBy,
            "decreased" => ScanFilter::Decreased,
            "decreased_by" => ScanFilter::DecreasedBy,
            "changed" => ScanFilter::Changed,
            "unchanged" => ScanFilter::Unchanged,
            "between" => ScanFilter::Between,
            "bigger" | "bigger_than" => ScanFilter::BiggerThan,
            "smaller" | "smaller_than" => ScanFilter::SmallerThan,
            _ => return Err(MemoryError::invalid_input(format!("unknown scan filter: {}", s))),
        };
        Ok(filter)
    }
}

/// Settings a scan session runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSettings {
    pub mem_type: MemType,
    /// Code units for strings, bytes for byte arrays
    pub length: usize,
    pub base: MemBase,
    pub signedness: Signedness,
    pub enforce_alignment: bool,
    /// Optional `[begin, end)` console address range, stored as hex text
    #[serde(default, with = "hex_range")]
    pub range: Option<(ConsoleAddress, ConsoleAddress)>,
}

mod hex_range {
    use super::*;
    use serde::{de, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        range: &Option<(ConsoleAddress, ConsoleAddress)>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        range
            .map(|(begin, end)| (format_console_address(begin), format_console_address(end)))
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<(ConsoleAddress, ConsoleAddress)>, D::Error> {
        match Option::<(String, String)>::deserialize(deserializer)? {
            Some((begin, end)) => {
                let begin = parse_console_address(&begin).map_err(de::Error::custom)?;
                let end = parse_console_address(&end).map_err(de::Error::custom)?;
                Ok(Some((begin, end)))
            }
            None => Ok(None),
        }
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        ScanSettings {
            mem_type: MemType::Word,
            length: 1,
            base: MemBase::Decimal,
            signedness: Signedness::Signed,
            enforce_alignment: true,
            range: None,
        }
    }
}

impl ScanSettings {
    /// Byte stride between candidate addresses
    pub fn stride(&self) -> usize {
        if self.enforce_alignment {
            self.mem_type.alignment()
        } else {
            1
        }
    }

    /// Size in bytes of one scanned element
    pub fn element_size(&self) -> usize {
        self.mem_type.size(self.length)
    }
}

/// Lifecycle state of a scan session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    Unstarted,
    Active,
}

/// One undo step: the result set and unknown-initial flag before a next scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoEntry {
    pub results: Vec<ConsoleAddress>,
    pub was_unknown_initial: bool,
}
