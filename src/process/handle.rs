//! Process handle wrapper with RAII semantics

use crate::core::types::MemoryResult;
use crate::windows::bindings::{kernel32, psapi};
use crate::windows::types::Handle;
use std::fmt;
use winapi::um::winnt::MEMORY_BASIC_INFORMATION;

/// Access rights for process handles
#[derive(Debug, Clone, Copy)]
pub struct ProcessAccess {
    value: u32,
}

impl ProcessAccess {
    /// Query information access
    pub const QUERY_INFORMATION: Self = Self { value: 0x0400 };
    /// Read memory access
    pub const VM_READ: Self = Self { value: 0x0010 };
    /// Write memory access
    pub const VM_WRITE: Self = Self { value: 0x0020 };
    /// Memory operation access, required by WriteProcessMemory
    pub const VM_OPERATION: Self = Self { value: 0x0008 };

    /// Combine access rights
    pub fn combine(rights: &[Self]) -> Self {
        Self {
            value: rights.iter().fold(0, |acc, right| acc | right.value),
        }
    }

    pub fn value(&self) -> u32 {
        self.value
    }
}

/// Open handle to the emulator process
pub struct ProcessHandle {
    handle: Handle,
    pid: u32,
}

impl ProcessHandle {
    /// Opens a process for querying, reading and writing its memory
    pub fn open_for_read_write(pid: u32) -> MemoryResult<Self> {
        let access = ProcessAccess::combine(&[
            ProcessAccess::QUERY_INFORMATION,
            ProcessAccess::VM_READ,
            ProcessAccess::VM_WRITE,
            ProcessAccess::VM_OPERATION,
        ]);
        let raw = kernel32::open_process(pid, access.value())?;
        Ok(ProcessHandle {
            handle: Handle::new(raw),
            pid,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn read_memory(&self, address: u64, buffer: &mut [u8]) -> MemoryResult<()> {
        unsafe { kernel32::read_process_memory(self.handle.raw(), address, buffer) }
    }

    pub fn write_memory(&self, address: u64, data: &[u8]) -> MemoryResult<()> {
        unsafe { kernel32::write_process_memory(self.handle.raw(), address, data) }
    }

    /// Describes the region containing `address`
    pub fn query(&self, address: u64) -> Option<MEMORY_BASIC_INFORMATION> {
        unsafe { kernel32::virtual_query_ex(self.handle.raw(), address) }
    }

    /// Whether the page at `address` is backed by physical memory
    pub fn is_resident(&self, address: u64) -> bool {
        unsafe { psapi::is_page_resident(self.handle.raw(), address) }
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .field("valid", &self.handle.is_valid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_access_combine() {
        let combined = ProcessAccess::combine(&[
            ProcessAccess::QUERY_INFORMATION,
            ProcessAccess::VM_READ,
            ProcessAccess::VM_WRITE,
            ProcessAccess::VM_OPERATION,
        ]);
        assert_eq!(combined.value(), 0x0438);
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_open_invalid_process() {
        assert!(ProcessHandle::open_for_read_write(0).is_err());
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_open_current_process() {
        let pid = std::process::id();
        if let Ok(handle) = ProcessHandle::open_for_read_write(pid) {
            assert_eq!(handle.pid(), pid);
            assert!(handle.query(0).is_some());
        }
    }
}
