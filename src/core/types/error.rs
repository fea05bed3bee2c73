//! Error types for Dolphin-Memory
//!
//! Every fallible operation returns a [`MemoryResult`]. Callers that only care
//! about the outcome class (show "unknown", unhook, report bad input) match on
//! [`MemoryError::kind`].

use std::fmt;
use thiserror::Error;

/// Main error type for memory operations
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Input too long: at most {max} units allowed, got {actual}")]
    InputTooLong { max: usize, actual: usize },

    #[error("Invalid pointer at level {level}: 0x{address:08X} is outside every enabled region")]
    InvalidPointer { level: usize, address: u32 },

    #[error("Failed to read memory at {address}: {reason}")]
    ReadFailed { address: String, reason: String },

    #[error("Failed to write memory at {address}: {reason}")]
    WriteFailed { address: String, reason: String },

    #[error("Not hooked to the emulator")]
    NotHooked,

    #[error("No scan in progress")]
    ScanNotStarted,

    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Emulator is running but no emulation is active")]
    NoEmulation,

    #[cfg(target_os = "linux")]
    #[error("System call failed: {0}")]
    Nix(#[from] nix::Error),

    #[cfg(windows)]
    #[error("Windows API error: {0}")]
    WindowsApiError(#[from] windows::core::Error),

    #[cfg(windows)]
    #[error("Windows API: {0}")]
    WindowsApi(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for memory operations
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Closed set of outcome classes a caller reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A user supplied term or value does not parse for the configured type/base
    InvalidInput,
    /// A string or byte array term exceeds the configured length
    InputTooLong,
    /// A pointer chain dereference left every enabled region
    InvalidPointer,
    /// The backend read or write failed; the snapshot can no longer be trusted
    OperationFailed,
    /// The emulator process is not running
    NotFound,
    /// The emulator is running but not emulating
    NoEmulation,
}

impl MemoryError {
    /// Projects the error onto its outcome class
    pub fn kind(&self) -> ErrorKind {
        match self {
            MemoryError::InvalidInput(_) | MemoryError::ScanNotStarted => ErrorKind::InvalidInput,
            MemoryError::InputTooLong { .. } => ErrorKind::InputTooLong,
            MemoryError::InvalidPointer { .. } => ErrorKind::InvalidPointer,
            MemoryError::ProcessNotFound(_) => ErrorKind::NotFound,
            MemoryError::NoEmulation => ErrorKind::NoEmulation,
            MemoryError::JsonError(_) => ErrorKind::InvalidInput,
            _ => ErrorKind::OperationFailed,
        }
    }

    /// True when the caller should unhook because the target can no longer be trusted
    pub fn is_operation_failed(&self) -> bool {
        self.kind() == ErrorKind::OperationFailed
    }

    /// Creates an invalid input error
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        MemoryError::InvalidInput(reason.into())
    }

    /// Creates a read failed error
    pub fn read_failed(address: impl fmt::Display, reason: impl Into<String>) -> Self {
        MemoryError::ReadFailed {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a write failed error
    pub fn write_failed(address: impl fmt::Display, reason: impl Into<String>) -> Self {
        MemoryError::WriteFailed {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid pointer error
    pub fn invalid_pointer(level: usize, address: u32) -> Self {
        MemoryError::InvalidPointer { level, address }
    }

    /// Creates an input too long error
    pub fn input_too_long(max: usize, actual: usize) -> Self {
        MemoryError::InputTooLong { max, actual }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MemoryError::InvalidInput("abc".to_string());
        assert_eq!(err.to_string(), "Invalid input: abc");

        let err = MemoryError::invalid_pointer(1, 0x1234);
        assert_eq!(
            err.to_string(),
            "Invalid pointer at level 1: 0x00001234 is outside every enabled region"
        );
    }

    #[test]
    fn test_all_error_kinds() {
        let errors: Vec<(MemoryError, ErrorKind)> = vec![
            (MemoryError::invalid_input("x"), ErrorKind::InvalidInput),
            (MemoryError::ScanNotStarted, ErrorKind::InvalidInput),
            (MemoryError::input_too_long(4, 5), ErrorKind::InputTooLong),
            (MemoryError::invalid_pointer(0, 0), ErrorKind::InvalidPointer),
            (
                MemoryError::read_failed("0x80000000", "gone"),
                ErrorKind::OperationFailed,
            ),
            (
                MemoryError::write_failed("0x80000000", "gone"),
                ErrorKind::OperationFailed,
            ),
            (MemoryError::NotHooked, ErrorKind::OperationFailed),
            (
                MemoryError::ProcessNotFound("dolphin-emu".to_string()),
                ErrorKind::NotFound,
            ),
            (MemoryError::NoEmulation, ErrorKind::NoEmulation),
        ];

        for (error, kind) in errors {
            assert_eq!(error.kind(), kind, "{}", error);
        }
    }

    #[test]
    fn test_helper_methods() {
        let err = MemoryError::read_failed("0xABCD", "short read");
        match err {
            MemoryError::ReadFailed { address, reason } => {
                assert_eq!(address, "0xABCD");
                assert_eq!(reason, "short read");
            }
            _ => panic!("Wrong error type"),
        }

        let err = MemoryError::input_too_long(8, 12);
        match err {
            MemoryError::InputTooLong { max, actual } => {
                assert_eq!(max, 8);
                assert_eq!(actual, 12);
            }
            _ => panic!("Wrong error type"),
        }
    }

    #[test]
    fn test_from_implementations() {
        use std::io;

        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "test");
        let mem_err: MemoryError = io_err.into();
        assert!(matches!(mem_err, MemoryError::IoError(_)));
        assert!(mem_err.is_operation_failed());

        let json_err = serde_json::from_str::<String>("invalid json").unwrap_err();
        let mem_err: MemoryError = json_err.into();
        assert!(matches!(mem_err, MemoryError::JsonError(_)));
        assert_eq!(mem_err.kind(), ErrorKind::InvalidInput);
    }
}
