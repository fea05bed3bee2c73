//! Core module containing fundamental types for Dolphin-Memory
//!
//! This module provides the foundational building blocks used throughout
//! the crate, including console address handling, the typed value codec,
//! scan settings, and error types.

pub mod types;

// Re-export commonly used types for convenience
pub use types::{
    ConsoleAddress, ErrorKind, MemBase, MemType, MemoryError, MemoryResult, ScanFilter,
    Signedness,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

