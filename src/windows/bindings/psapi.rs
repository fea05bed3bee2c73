//! PSAPI.dll bindings for working set queries

use std::mem;
use winapi::shared::minwindef::FALSE;
use winapi::um::psapi::{QueryWorkingSetEx, PSAPI_WORKING_SET_EX_INFORMATION};
use winapi::um::winnt::HANDLE;

/// Whether the page at `address` is currently backed by physical memory.
///
/// Only the views the emulator actually uses for guest RAM are resident, which
/// tells them apart from unrelated mappings of the same size.
///
/// # Safety
/// The handle must be a valid process handle with query access
pub unsafe fn is_page_resident(handle: HANDLE, address: u64) -> bool {
    let mut info: PSAPI_WORKING_SET_EX_INFORMATION = mem::zeroed();
    info.VirtualAddress = address as _;

    let result = QueryWorkingSetEx(
        handle,
        &mut info as *mut _ as *mut _,
        mem::size_of::<PSAPI_WORKING_SET_EX_INFORMATION>() as u32,
    );

    // Bit 0 of the attribute block is the `Valid` flag
    result != FALSE && (*info.VirtualAttributes.Flags() & 1) == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_null_handle_is_not_resident() {
        unsafe {
            assert!(!is_page_resident(std::ptr::null_mut(), 0x1000));
        }
    }
}
