//! Watched memory locations
//!
//! A [`MemWatchEntry`] names a typed value at a console address, optionally
//! reached through a chain of pointers. Resolving the chain reads each pointer
//! as a big-endian word, checks it lands in an enabled region and adds the next
//! offset.

use crate::core::types::{
    format_memory, parse_memory, ConsoleAddress, MemBase, MemType, MemoryError, MemoryResult,
    Signedness, UNKNOWN_VALUE,
};
use crate::memory::cache::RamSnapshot;
use crate::process::DolphinAccessor;
use tracing::trace;

/// A labelled, typed location in console RAM
#[derive(Debug, Clone, PartialEq)]
pub struct MemWatchEntry {
    label: String,
    group: Option<String>,
    console_address: ConsoleAddress,
    mem_type: MemType,
    length: usize,
    base: MemBase,
    signedness: Signedness,
    pointer_offsets: Vec<i32>,
    is_valid_pointer: bool,
    memory: Vec<u8>,
    locked: bool,
    freeze_memory: Vec<u8>,
}

impl Default for MemWatchEntry {
    fn default() -> Self {
        MemWatchEntry::new(
            "",
            0,
            MemType::Word,
            1,
            MemBase::Decimal,
            Signedness::Signed,
        )
    }
}

impl MemWatchEntry {
    pub fn new(
        label: impl Into<String>,
        console_address: ConsoleAddress,
        mem_type: MemType,
        length: usize,
        base: MemBase,
        signedness: Signedness,
    ) -> Self {
        let length = length.max(1);
        MemWatchEntry {
            label: label.into(),
            group: None,
            console_address,
            mem_type,
            length,
            base,
            signedness,
            pointer_offsets: Vec::new(),
            is_valid_pointer: true,
            memory: vec![0; mem_type.size(length)],
            locked: false,
            freeze_memory: Vec::new(),
        }
    }

    /// Same entry reached through `offsets`
    pub fn with_pointer_offsets(mut self, offsets: Vec<i32>) -> Self {
        self.pointer_offsets = offsets;
        self
    }

    /// Same entry filed under `group`
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn set_group(&mut self, group: Option<String>) {
        self.group = group;
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn console_address(&self) -> ConsoleAddress {
        self.console_address
    }

    pub fn set_console_address(&mut self, address: ConsoleAddress) {
        self.console_address = address;
    }

    pub fn mem_type(&self) -> MemType {
        self.mem_type
    }

    /// Changes the type and reallocates the value buffers
    pub fn set_type(&mut self, mem_type: MemType) {
        self.mem_type = mem_type;
        self.resize_buffers();
    }

    /// Length in code units for strings, bytes for byte arrays
    pub fn length(&self) -> usize {
        self.length
    }

    /// Changes the length and reallocates the value buffers
    pub fn set_length(&mut self, length: usize) {
        self.length = length.max(1);
        self.resize_buffers();
    }

    pub fn base(&self) -> MemBase {
        self.base
    }

    pub fn set_base(&mut self, base: MemBase) {
        self.base = base;
    }

    pub fn signedness(&self) -> Signedness {
        self.signedness
    }

    pub fn is_unsigned(&self) -> bool {
        self.signedness == Signedness::Unsigned
    }

    pub fn set_signedness(&mut self, signedness: Signedness) {
        self.signedness = signedness;
    }

    /// Size in bytes of the value
    pub fn size(&self) -> usize {
        self.mem_type.size(self.length)
    }

    pub fn pointer_offsets(&self) -> &[i32] {
        &self.pointer_offsets
    }

    pub fn set_pointer_offsets(&mut self, offsets: Vec<i32>) {
        self.pointer_offsets = offsets;
    }

    pub fn add_offset(&mut self, offset: i32) {
        self.pointer_offsets.push(offset);
    }

    /// Removes the last offset of the chain
    pub fn remove_offset(&mut self) -> Option<i32> {
        self.pointer_offsets.pop()
    }

    pub fn set_offset(&mut self, level: usize, offset: i32) -> bool {
        match self.pointer_offsets.get_mut(level) {
            Some(slot) => {
                *slot = offset;
                true
            }
            None => false,
        }
    }

    pub fn pointer_level(&self) -> usize {
        self.pointer_offsets.len()
    }

    pub fn is_bound_to_pointer(&self) -> bool {
        !self.pointer_offsets.is_empty()
    }

    /// Whether the last read resolved the chain
    pub fn is_valid_pointer(&self) -> bool {
        self.is_valid_pointer
    }

    /// Raw value in guest byte order
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Value re-applied while locked
    pub fn freeze_memory(&self) -> &[u8] {
        &self.freeze_memory
    }

    /// Locks or unlocks the entry. Locking captures the current value.
    pub fn set_lock(&mut self, locked: bool) {
        self.locked = locked;
        if locked {
            self.freeze_memory = self.memory.clone();
        } else {
            self.freeze_memory.clear();
        }
    }

    /// Resolves the entry to a concrete console address.
    ///
    /// Pointers are read through the backend. An address outside every
    /// enabled region yields `InvalidPointer`; a failed read is an operation
    /// failure.
    pub fn resolve(&self, accessor: &DolphinAccessor) -> MemoryResult<ConsoleAddress> {
        self.walk_chain(
            self.pointer_offsets.len(),
            self.size(),
            |address, len| accessor.is_valid_range(address, len),
            |address| accessor.read_u32(address),
        )
    }

    /// Resolves the entry using pointers read from `snapshot`
    pub fn resolve_in(&self, snapshot: &RamSnapshot) -> MemoryResult<ConsoleAddress> {
        self.walk_chain(
            self.pointer_offsets.len(),
            self.size(),
            |address, len| snapshot.segment_for(address, len).is_some(),
            |address| read_snapshot_u32(snapshot, address),
        )
    }

    /// Address reached after applying the first `level` offsets
    pub fn address_for_pointer_level(
        &self,
        accessor: &DolphinAccessor,
        level: usize,
    ) -> MemoryResult<ConsoleAddress> {
        if level > self.pointer_offsets.len() {
            return Err(MemoryError::invalid_input(format!(
                "pointer level {} exceeds the chain length {}",
                level,
                self.pointer_offsets.len()
            )));
        }
        self.walk_chain(
            level,
            1,
            |address, len| accessor.is_valid_range(address, len),
            |address| accessor.read_u32(address),
        )
    }

    /// Resolves the entry and reads its value through the backend
    pub fn read_memory_from_ram(&mut self, accessor: &DolphinAccessor) -> MemoryResult<()> {
        let address = self.track_validity(self.resolve(accessor))?;
        let bytes = accessor.read_console(address, self.size(), false)?;
        self.memory = bytes;
        Ok(())
    }

    /// Resolves the entry and reads its value from a snapshot
    pub fn read_memory_from_cache(&mut self, snapshot: &RamSnapshot) -> MemoryResult<()> {
        let address = self.track_validity(self.resolve_in(snapshot))?;
        let size = self.size();
        if !snapshot.copy_raw(address, size, &mut self.memory) {
            return Err(MemoryError::read_failed(
                format!("0x{:08X}", address),
                "not cached",
            ));
        }
        Ok(())
    }

    /// Parses `text` under the entry's type and writes it to the resolved address.
    ///
    /// While locked the written value also replaces the frozen value.
    pub fn write_memory_from_string(
        &mut self,
        accessor: &mut DolphinAccessor,
        text: &str,
    ) -> MemoryResult<()> {
        let bytes = parse_memory(text, self.mem_type, self.base, self.signedness, self.length)?;
        let address = self.track_validity(self.resolve(accessor))?;
        accessor.write_console(address, &bytes, false)?;

        let written = bytes.len().min(self.memory.len());
        self.memory[..written].copy_from_slice(&bytes[..written]);
        if self.locked {
            self.freeze_memory = self.memory.clone();
        }
        Ok(())
    }

    /// Writes the frozen value back. Does nothing unless locked.
    pub fn freeze(&mut self, accessor: &mut DolphinAccessor) -> MemoryResult<()> {
        if !self.locked || self.freeze_memory.is_empty() {
            return Ok(());
        }
        let address = self.track_validity(self.resolve(accessor))?;
        trace!("Re-applying {} at 0x{:08X}", self.label, address);
        accessor.write_console(address, &self.freeze_memory, false)
    }

    /// Value formatted for display, `???` when the chain does not resolve
    pub fn string_from_memory(&self) -> String {
        if !self.is_valid_pointer {
            return UNKNOWN_VALUE.to_string();
        }
        format_memory(&self.memory, self.mem_type, self.base, self.signedness)
    }

    fn track_validity(
        &mut self,
        resolved: MemoryResult<ConsoleAddress>,
    ) -> MemoryResult<ConsoleAddress> {
        match resolved {
            Ok(address) => {
                self.is_valid_pointer = true;
                Ok(address)
            }
            Err(e @ MemoryError::InvalidPointer { .. }) => {
                self.is_valid_pointer = false;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    fn resize_buffers(&mut self) {
        let size = self.size();
        self.memory.resize(size, 0);
        if self.locked {
            self.freeze_memory.resize(size, 0);
        }
    }

    fn walk_chain(
        &self,
        levels: usize,
        final_len: usize,
        is_valid: impl Fn(ConsoleAddress, usize) -> bool,
        mut read_pointer: impl FnMut(ConsoleAddress) -> MemoryResult<u32>,
    ) -> MemoryResult<ConsoleAddress> {
        let mut address = self.console_address;

        for (level, &offset) in self.pointer_offsets.iter().take(levels).enumerate() {
            if !is_valid(address, 4) {
                return Err(MemoryError::invalid_pointer(level, address));
            }
            let pointer = read_pointer(address)?;
            if !is_valid(pointer, 1) {
                return Err(MemoryError::invalid_pointer(level + 1, pointer));
            }
            address = pointer.wrapping_add_signed(offset);
        }

        if !is_valid(address, final_len) {
            return Err(MemoryError::invalid_pointer(levels, address));
        }
        Ok(address)
    }
}

fn read_snapshot_u32(snapshot: &RamSnapshot, address: ConsoleAddress) -> MemoryResult<u32> {
    snapshot
        .bytes_at(address, 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| MemoryError::read_failed(format!("0x{:08X}", address), "not cached"))
}
