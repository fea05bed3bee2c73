//! Core type definitions for Dolphin-Memory
//!
//! This module contains the fundamental types used throughout the crate:
//! console addresses and region constants, element types and the value codec,
//! scan filters and settings, and the error taxonomy.

mod address;
mod error;
mod scan_result;
mod value;

// Re-export all public types
pub use address::{
    format_console_address, format_pointer_offset, parse_console_address, parse_pointer_offset,
    ConsoleAddress, MemoryRegion, ARAM_END, ARAM_FAKESIZE, ARAM_SIZE, ARAM_START,
    DEFAULT_MEM1_SIZE, DEFAULT_MEM2_SIZE, MEM1_START, MEM2_START,
};
pub use error::{ErrorKind, MemoryError, MemoryResult};
pub use scan_result::{ScanFilter, ScanSettings, ScanState, UndoEntry};
pub use value::{
    format_memory, parse_memory, MemBase, MemType, Number, Signedness, StringEncoding,
    UNKNOWN_VALUE,
};
