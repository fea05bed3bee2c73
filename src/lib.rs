//! Dolphin-Memory library for inspecting a running GameCube/Wii emulator
//!
//! The engine hooks the emulator process, translates console addresses into
//! host reads, keeps a double-buffered snapshot of the emulated RAM, runs
//! progressive value scans and resolves watched pointer chains.

pub mod config;
pub mod core;
pub mod memory;
pub mod process;
#[cfg(windows)]
pub mod windows;

// Re-export main types from core module
pub use core::types::{
    ConsoleAddress, ErrorKind, MemBase, MemType, MemoryError, MemoryRegion, MemoryResult,
    ScanFilter, ScanSettings, Signedness, StringEncoding,
};

pub use memory::{MemScanner, MemWatchEntry, RamLayout, RamSnapshot, WatchListDocument};
pub use process::{platform_process, DolphinAccessor, DolphinProcess, DolphinStatus, SnapshotProcess};

// Re-export core directly for full access
pub use core::{AUTHORS, VERSION};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_constants() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
        assert_eq!(AUTHORS, env!("CARGO_PKG_AUTHORS"));
    }

    #[test]
    fn test_engine_reexports() {
        let process = SnapshotProcess::new(RamLayout::new(0x1000, 0x1000));
        let mut accessor = DolphinAccessor::new(Box::new(process));
        assert_eq!(accessor.hook(), DolphinStatus::Hooked);

        let mut scanner = MemScanner::new(4);
        let count = scanner
            .first_scan(&mut accessor, ScanFilter::Exact, Some("0"), None)
            .unwrap();
        assert_eq!(count, 0x1000 / 4);
    }

    #[test]
    fn test_memory_error_reexport() {
        let error = MemoryError::ProcessNotFound("dolphin-emu".to_string());
        assert!(error.to_string().contains("Process not found"));
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }
}
