//! Process lookup using the Windows ToolHelp32 API

use crate::core::types::{MemoryError, MemoryResult};
use crate::windows::types::Handle;
use std::mem;
use winapi::shared::minwindef::FALSE;
use winapi::um::tlhelp32::{
    CreateToolhelp32Snapshot, Process32First, Process32Next, PROCESSENTRY32, TH32CS_SNAPPROCESS,
};

/// A running process as reported by ToolHelp32
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
}

/// Iterator over a ToolHelp32 process snapshot
pub struct ProcessEnumerator {
    snapshot: Handle,
    first_called: bool,
}

impl ProcessEnumerator {
    /// Takes a snapshot of the running processes
    pub fn new() -> MemoryResult<Self> {
        let snapshot = Handle::new(unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) });
        if !snapshot.is_valid() {
            return Err(MemoryError::WindowsApi(
                "Failed to create process snapshot".to_string(),
            ));
        }
        Ok(ProcessEnumerator {
            snapshot,
            first_called: false,
        })
    }
}

impl Iterator for ProcessEnumerator {
    type Item = ProcessEntry;

    fn next(&mut self) -> Option<Self::Item> {
        unsafe {
            let mut entry: PROCESSENTRY32 = mem::zeroed();
            entry.dwSize = mem::size_of::<PROCESSENTRY32>() as u32;

            let success = if !self.first_called {
                self.first_called = true;
                Process32First(self.snapshot.raw(), &mut entry)
            } else {
                Process32Next(self.snapshot.raw(), &mut entry)
            };

            if success == FALSE {
                return None;
            }

            let name_bytes = &entry.szExeFile;
            let end = name_bytes
                .iter()
                .position(|&c| c == 0)
                .unwrap_or(name_bytes.len());
            let name: Vec<u8> = name_bytes[..end].iter().map(|&c| c as u8).collect();

            Some(ProcessEntry {
                pid: entry.th32ProcessID,
                name: String::from_utf8_lossy(&name).into_owned(),
            })
        }
    }
}

/// First process whose executable name matches one of `names` (case-insensitive)
pub fn find_process_by_names(names: &[String]) -> MemoryResult<Option<ProcessEntry>> {
    Ok(ProcessEnumerator::new()?.find(|process| {
        names
            .iter()
            .any(|name| process.name.eq_ignore_ascii_case(name))
    }))
}
