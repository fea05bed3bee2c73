//! Windows API bindings
//!
//! Low-level FFI bindings to Windows system libraries.

pub mod kernel32;
pub mod psapi;

pub use kernel32::*;
pub use psapi::*;
