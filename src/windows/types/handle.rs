//! Owned HANDLE with automatic cleanup

use crate::windows::bindings::kernel32;
use winapi::um::handleapi::INVALID_HANDLE_VALUE;
use winapi::um::winnt::HANDLE;

/// Owned Windows HANDLE, closed on drop
pub struct Handle {
    handle: HANDLE,
}

impl Handle {
    /// Takes ownership of a raw handle
    pub fn new(handle: HANDLE) -> Self {
        Handle { handle }
    }

    /// Handles from OpenProcess are null on failure, Toolhelp snapshots are
    /// `INVALID_HANDLE_VALUE`; both count as invalid
    pub fn is_valid(&self) -> bool {
        !self.handle.is_null() && self.handle != INVALID_HANDLE_VALUE
    }

    pub fn raw(&self) -> HANDLE {
        self.handle
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if self.is_valid() {
            unsafe {
                let _ = kernel32::close_handle(self.handle);
            }
        }
    }
}

// HANDLEs are process-local kernel object references
unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    #[test]
    fn test_invalid_handles() {
        assert!(!Handle::new(ptr::null_mut()).is_valid());
        assert!(!Handle::new(INVALID_HANDLE_VALUE).is_valid());
    }
}
