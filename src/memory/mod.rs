//! Console memory access on top of a hooked emulator
//!
//! This module provides:
//! - Address translation between console addresses, backend offsets and cache indices
//! - A double-buffered snapshot of the emulated RAM
//! - A multi-pass value scanner with undo
//! - Watch entries with pointer chains and their persisted form

pub mod cache;
pub mod document;
pub mod scanner;
pub mod translate;
pub mod watch;

pub use cache::{RamCache, RamSnapshot};
pub use document::{WatchEntryRecord, WatchListDocument, WATCH_LIST_VERSION};
pub use scanner::{candidate_runs, CandidateRun, MemScanner};
pub use translate::{RamLayout, Segment};
pub use watch::MemWatchEntry;
