//! Windows API layer used by the Windows emulator backend
//!
//! All unsafe FFI calls are contained within this module.

pub mod bindings;
pub mod types;

pub use bindings::{kernel32, psapi};
pub use types::Handle;
