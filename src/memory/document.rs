//! Watch list persistence
//!
//! Watch lists are stored as JSON. Addresses and pointer offsets are written as
//! hexadecimal text so a saved list stays readable and editable by hand.

use crate::core::types::{
    format_console_address, format_pointer_offset, parse_console_address, parse_pointer_offset,
    MemBase, MemType, MemoryError, MemoryResult, Signedness,
};
use crate::memory::watch::MemWatchEntry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Current document format version
pub const WATCH_LIST_VERSION: u32 = 1;

/// Serialized form of a [`MemWatchEntry`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEntryRecord {
    pub label: String,
    pub address: String,
    #[serde(rename = "type")]
    pub mem_type: MemType,
    #[serde(default = "default_length")]
    pub length: usize,
    #[serde(default)]
    pub base: MemBase,
    #[serde(default)]
    pub unsigned: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pointer_offsets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

fn default_length() -> usize {
    1
}

impl WatchEntryRecord {
    pub fn from_entry(entry: &MemWatchEntry) -> Self {
        WatchEntryRecord {
            label: entry.label().to_string(),
            address: format_console_address(entry.console_address()),
            mem_type: entry.mem_type(),
            length: entry.length(),
            base: entry.base(),
            unsigned: entry.is_unsigned(),
            pointer_offsets: entry
                .pointer_offsets()
                .iter()
                .map(|&o| format_pointer_offset(o))
                .collect(),
            group: entry.group().map(str::to_string),
        }
    }

    /// Rebuilds the entry, rejecting malformed addresses and offsets
    pub fn to_entry(&self) -> MemoryResult<MemWatchEntry> {
        let address = parse_console_address(&self.address)?;
        let offsets = self
            .pointer_offsets
            .iter()
            .map(|o| parse_pointer_offset(o))
            .collect::<MemoryResult<Vec<_>>>()?;
        let signedness = if self.unsigned {
            Signedness::Unsigned
        } else {
            Signedness::Signed
        };

        let mut entry = MemWatchEntry::new(
            self.label.clone(),
            address,
            self.mem_type,
            self.length,
            self.base,
            signedness,
        )
        .with_pointer_offsets(offsets);
        entry.set_group(self.group.clone());
        Ok(entry)
    }
}

/// A saved watch list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchListDocument {
    pub version: u32,
    #[serde(default)]
    pub entries: Vec<WatchEntryRecord>,
}

impl Default for WatchListDocument {
    fn default() -> Self {
        WatchListDocument {
            version: WATCH_LIST_VERSION,
            entries: Vec::new(),
        }
    }
}

impl WatchListDocument {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a MemWatchEntry>) -> Self {
        WatchListDocument {
            version: WATCH_LIST_VERSION,
            entries: entries.into_iter().map(WatchEntryRecord::from_entry).collect(),
        }
    }

    /// Rebuilds every entry of the document
    pub fn to_entries(&self) -> MemoryResult<Vec<MemWatchEntry>> {
        self.entries.iter().map(WatchEntryRecord::to_entry).collect()
    }

    pub fn from_json_str(text: &str) -> MemoryResult<Self> {
        let document: WatchListDocument = serde_json::from_str(text)?;
        if document.version > WATCH_LIST_VERSION {
            return Err(MemoryError::invalid_input(format!(
                "unsupported watch list version {}",
                document.version
            )));
        }
        Ok(document)
    }

    pub fn to_json_string(&self) -> MemoryResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> MemoryResult<Self> {
        let text = fs::read_to_string(path)?;
        let document = Self::from_json_str(&text)?;
        info!(
            "Loaded {} watch entries from {}",
            document.entries.len(),
            path.display()
        );
        Ok(document)
    }

    pub fn save(&self, path: &Path) -> MemoryResult<()> {
        fs::write(path, self.to_json_string()?)?;
        info!("Saved {} watch entries to {}", self.entries.len(), path.display());
        Ok(())
    }
}
