//! Kernel32.dll bindings for process and memory operations

use crate::core::types::{MemoryError, MemoryResult};
use std::mem;
use winapi::shared::minwindef::{FALSE, LPCVOID, LPVOID};
use winapi::um::handleapi::CloseHandle;
use winapi::um::memoryapi::{ReadProcessMemory, VirtualQueryEx, WriteProcessMemory};
use winapi::um::processthreadsapi::OpenProcess;
use winapi::um::winnt::{HANDLE, MEMORY_BASIC_INFORMATION};

/// Safe wrapper for OpenProcess
pub fn open_process(pid: u32, desired_access: u32) -> MemoryResult<HANDLE> {
    unsafe {
        let handle = OpenProcess(desired_access, FALSE, pid);
        if handle.is_null() {
            Err(MemoryError::ProcessNotFound(format!("PID: {}", pid)))
        } else {
            Ok(handle)
        }
    }
}

/// Safe wrapper for CloseHandle
///
/// # Safety
/// The handle must be a valid Windows handle
pub unsafe fn close_handle(handle: HANDLE) -> MemoryResult<()> {
    if handle.is_null() {
        return Ok(());
    }

    if CloseHandle(handle) == FALSE {
        Err(MemoryError::WindowsApi(
            "Failed to close handle".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Safe wrapper for ReadProcessMemory; fails unless every byte was read
///
/// # Safety
/// The handle must be a valid process handle with appropriate access rights
pub unsafe fn read_process_memory(
    handle: HANDLE,
    address: u64,
    buffer: &mut [u8],
) -> MemoryResult<()> {
    let mut bytes_read = 0;

    let result = ReadProcessMemory(
        handle,
        address as LPCVOID,
        buffer.as_mut_ptr() as LPVOID,
        buffer.len(),
        &mut bytes_read,
    );

    if result == FALSE || bytes_read != buffer.len() {
        Err(MemoryError::read_failed(
            format!("0x{:X}", address),
            format!("ReadProcessMemory copied {} of {} bytes", bytes_read, buffer.len()),
        ))
    } else {
        Ok(())
    }
}

/// Safe wrapper for WriteProcessMemory; fails unless every byte was written
///
/// # Safety
/// The handle must be a valid process handle with appropriate access rights
pub unsafe fn write_process_memory(handle: HANDLE, address: u64, data: &[u8]) -> MemoryResult<()> {
    let mut bytes_written = 0;

    let result = WriteProcessMemory(
        handle,
        address as LPVOID,
        data.as_ptr() as LPCVOID,
        data.len(),
        &mut bytes_written,
    );

    if result == FALSE || bytes_written != data.len() {
        Err(MemoryError::write_failed(
            format!("0x{:X}", address),
            format!("WriteProcessMemory copied {} of {} bytes", bytes_written, data.len()),
        ))
    } else {
        Ok(())
    }
}

/// Safe wrapper for VirtualQueryEx. `None` past the end of the address space.
///
/// # Safety
/// The handle must be a valid process handle with appropriate access rights
pub unsafe fn virtual_query_ex(handle: HANDLE, address: u64) -> Option<MEMORY_BASIC_INFORMATION> {
    let mut mbi: MEMORY_BASIC_INFORMATION = mem::zeroed();

    let result = VirtualQueryEx(
        handle,
        address as LPCVOID,
        &mut mbi,
        mem::size_of::<MEMORY_BASIC_INFORMATION>(),
    );

    if result != mem::size_of::<MEMORY_BASIC_INFORMATION>() {
        None
    } else {
        Some(mbi)
    }
}
