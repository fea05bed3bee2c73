//! Emulator process access
//!
//! A [`DolphinProcess`] finds the emulator, locates the host mappings that back
//! the console RAM regions and moves raw bytes in and out of them. Everything
//! above this layer speaks in offsets (see [`crate::memory::translate`]); the
//! trait's provided methods turn those into host addresses through
//! [`EmuRamInfo`].

pub mod accessor;
pub mod snapshot;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(windows)]
pub mod enumerator;
#[cfg(windows)]
pub mod handle;
#[cfg(windows)]
pub mod windows;

pub use accessor::{Console, DolphinAccessor, DolphinStatus};
pub use snapshot::SnapshotProcess;

#[cfg(target_os = "linux")]
pub use linux::LinuxDolphinProcess;
#[cfg(windows)]
pub use windows::WindowsDolphinProcess;

use crate::core::types::{ConsoleAddress, MemoryError, MemoryResult, MemoryRegion};
use crate::memory::translate::{RamLayout, Segment};

/// Host start addresses of the console RAM mappings found in the emulator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveredRegions {
    pub mem1: u64,
    pub mem2: Option<u64>,
    pub aram: Option<u64>,
}

/// Where the console RAM lives on the host and which regions are enabled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmuRamInfo {
    layout: RamLayout,
    regions: Option<DiscoveredRegions>,
    mem2_enabled: bool,
    aram_accessible: bool,
}

impl EmuRamInfo {
    /// Creates an empty description for the given region sizes
    pub fn new(layout: RamLayout) -> Self {
        EmuRamInfo {
            layout,
            regions: None,
            mem2_enabled: false,
            aram_accessible: false,
        }
    }

    /// Records the result of region discovery.
    ///
    /// MEM2 wins over ARAM: when both are reported only MEM2 is enabled.
    pub fn apply_discovery(&mut self, regions: DiscoveredRegions) {
        self.mem2_enabled = regions.mem2.is_some();
        self.aram_accessible = regions.mem2.is_none() && regions.aram.is_some();
        self.regions = Some(regions);
    }

    /// Forgets every mapping
    pub fn clear(&mut self) {
        self.regions = None;
        self.mem2_enabled = false;
        self.aram_accessible = false;
    }

    pub fn layout(&self) -> RamLayout {
        self.layout
    }

    pub fn set_layout(&mut self, layout: RamLayout) {
        self.layout = layout;
    }

    pub fn regions(&self) -> Option<DiscoveredRegions> {
        self.regions
    }

    /// True once MEM1 has been located
    pub fn is_mapped(&self) -> bool {
        self.regions.is_some()
    }

    pub fn is_mem2_enabled(&self) -> bool {
        self.mem2_enabled
    }

    pub fn is_aram_accessible(&self) -> bool {
        self.aram_accessible
    }

    /// Enables or disables MEM2. Enabling turns ARAM off.
    ///
    /// Returns the resulting flag, which stays false when MEM2 is not mapped.
    pub fn set_mem2_enabled(&mut self, enabled: bool) -> bool {
        if enabled {
            self.aram_accessible = false;
        }
        self.mem2_enabled = enabled && self.regions.map_or(false, |r| r.mem2.is_some());
        self.mem2_enabled
    }

    /// Enables or disables ARAM access. Enabling turns MEM2 off.
    ///
    /// Returns the resulting flag, which stays false when ARAM is not mapped.
    pub fn set_aram_accessible(&mut self, accessible: bool) -> bool {
        if accessible {
            self.mem2_enabled = false;
        }
        self.aram_accessible = accessible && self.regions.map_or(false, |r| r.aram.is_some());
        self.aram_accessible
    }

    /// Enabled regions in offset order
    pub fn segments(&self) -> Vec<Segment> {
        self.layout
            .segments(self.aram_accessible, self.mem2_enabled)
    }

    /// Snapshot buffer size for the enabled regions
    pub fn cache_size(&self) -> usize {
        self.layout
            .cache_size(self.aram_accessible, self.mem2_enabled)
    }

    pub fn is_valid_address(&self, address: ConsoleAddress) -> bool {
        self.layout
            .is_valid_address(address, self.aram_accessible, self.mem2_enabled)
    }

    pub fn is_valid_range(&self, address: ConsoleAddress, len: usize) -> bool {
        self.layout
            .is_valid_range(address, len, self.aram_accessible, self.mem2_enabled)
    }

    pub fn addr_to_offset(&self, address: ConsoleAddress) -> u32 {
        self.layout.addr_to_offset(address, self.aram_accessible)
    }

    pub fn offset_to_addr(&self, offset: u32) -> ConsoleAddress {
        self.layout.offset_to_addr(offset, self.aram_accessible)
    }

    /// Host address backing `[offset, offset + len)`, if the whole range
    /// lies in one enabled and mapped region
    pub fn host_address(&self, offset: u32, len: usize) -> Option<u64> {
        let regions = self.regions?;
        let address = self.offset_to_addr(offset);
        let segment = self
            .segments()
            .into_iter()
            .find(|s| s.contains(address, len.max(1)))?;
        let base = match segment.region {
            MemoryRegion::Mem1 => regions.mem1,
            MemoryRegion::Mem2 => regions.mem2?,
            MemoryRegion::Aram => regions.aram?,
        };
        Some(base + (address - segment.console_start) as u64)
    }
}

/// Reverses a 2, 4 or 8 byte value in place; other lengths are left alone
pub fn swap_bytes(buffer: &mut [u8]) {
    if matches!(buffer.len(), 2 | 4 | 8) {
        buffer.reverse();
    }
}

/// Platform access to a running emulator
pub trait DolphinProcess: Send {
    /// Looks for the emulator process. Returns false when it is not running.
    fn find_process(&mut self) -> bool;

    /// Locates the console RAM mappings. Returns false when the emulator is
    /// running but not emulating.
    fn discover_regions(&mut self) -> bool;

    /// Process id of the emulator once found
    fn pid(&self) -> Option<u32>;

    fn ram_info(&self) -> &EmuRamInfo;

    fn ram_info_mut(&mut self) -> &mut EmuRamInfo;

    /// Reads exactly `buffer.len()` bytes of host memory
    fn read_host(&self, host_address: u64, buffer: &mut [u8]) -> MemoryResult<()>;

    /// Writes all of `data` to host memory
    fn write_host(&mut self, host_address: u64, data: &[u8]) -> MemoryResult<()>;

    /// Reads RAM at `offset` into `buffer`, swapping 2/4/8 byte values when asked
    fn read_into(&self, offset: u32, buffer: &mut [u8], byteswap: bool) -> MemoryResult<()> {
        let host = self
            .ram_info()
            .host_address(offset, buffer.len())
            .ok_or_else(|| {
                MemoryError::read_failed(
                    format!("offset 0x{:X}", offset),
                    "range is not inside an enabled region",
                )
            })?;
        self.read_host(host, buffer)?;
        if byteswap {
            swap_bytes(buffer);
        }
        Ok(())
    }

    /// Reads `len` bytes of RAM at `offset`
    fn read(&self, offset: u32, len: usize, byteswap: bool) -> MemoryResult<Vec<u8>> {
        let mut buffer = vec![0u8; len];
        self.read_into(offset, &mut buffer, byteswap)?;
        Ok(buffer)
    }

    /// Writes `data` to RAM at `offset`, swapping 2/4/8 byte values when asked
    fn write(&mut self, offset: u32, data: &[u8], byteswap: bool) -> MemoryResult<()> {
        let host = self
            .ram_info()
            .host_address(offset, data.len())
            .ok_or_else(|| {
                MemoryError::write_failed(
                    format!("offset 0x{:X}", offset),
                    "range is not inside an enabled region",
                )
            })?;
        if byteswap && matches!(data.len(), 2 | 4 | 8) {
            let mut swapped = data.to_vec();
            swap_bytes(&mut swapped);
            self.write_host(host, &swapped)
        } else {
            self.write_host(host, data)
        }
    }
}

/// Creates the backend for the platform this crate was built for
#[cfg(target_os = "linux")]
pub fn platform_process(names: Vec<String>, layout: RamLayout) -> Box<dyn DolphinProcess> {
    Box::new(LinuxDolphinProcess::new(names, layout))
}

/// Creates the backend for the platform this crate was built for
#[cfg(windows)]
pub fn platform_process(names: Vec<String>, layout: RamLayout) -> Box<dyn DolphinProcess> {
    Box::new(WindowsDolphinProcess::new(names, layout))
}

/// Creates the backend for the platform this crate was built for
#[cfg(not(any(target_os = "linux", windows)))]
pub fn platform_process(_names: Vec<String>, layout: RamLayout) -> Box<dyn DolphinProcess> {
    Box::new(SnapshotProcess::detached(layout))
}
