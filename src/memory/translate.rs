//! Translation between console addresses, RAM offsets and cache indices
//!
//! Offsets index the concatenation of the enabled regions in the order ARAM,
//! MEM1, MEM2. ARAM occupies its full mapped size in offset space but only its
//! real size in the cache, so cache indices skip a fixed hole after ARAM.
//! None of these functions fail: inputs outside every region come back
//! unchanged.

use crate::core::types::{
    ConsoleAddress, MemoryRegion, ARAM_END, ARAM_FAKESIZE, ARAM_SIZE, ARAM_START,
    DEFAULT_MEM1_SIZE, DEFAULT_MEM2_SIZE, MEM1_START, MEM2_START,
};
use serde::{Deserialize, Serialize};

/// Real sizes of the emulated RAM regions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RamLayout {
    pub mem1_size: u32,
    pub mem2_size: u32,
}

impl Default for RamLayout {
    fn default() -> Self {
        RamLayout {
            mem1_size: DEFAULT_MEM1_SIZE,
            mem2_size: DEFAULT_MEM2_SIZE,
        }
    }
}

/// A contiguous run of one region in console, offset and cache space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub region: MemoryRegion,
    pub console_start: ConsoleAddress,
    pub len: u32,
    pub offset: u32,
    pub cache_index: u32,
}

impl Segment {
    /// One past the last console address, widened so MEM2's end cannot wrap
    pub fn console_end(&self) -> u64 {
        self.console_start as u64 + self.len as u64
    }

    /// Whether `[address, address + len)` lies entirely in this segment
    pub fn contains(&self, address: ConsoleAddress, len: usize) -> bool {
        let start = address as u64;
        start >= self.console_start as u64 && start + len as u64 <= self.console_end()
    }

    /// Cache index of a console address inside this segment
    pub fn cache_index_of(&self, address: ConsoleAddress) -> usize {
        (self.cache_index + (address - self.console_start)) as usize
    }
}

impl RamLayout {
    /// Creates a layout from real region sizes
    pub const fn new(mem1_size: u32, mem2_size: u32) -> Self {
        RamLayout {
            mem1_size,
            mem2_size,
        }
    }

    /// Size the emulator maps for MEM1 on the host
    pub fn mem1_mapped_size(&self) -> u64 {
        (self.mem1_size as u64).next_power_of_two()
    }

    /// Size the emulator maps for MEM2 on the host
    pub fn mem2_mapped_size(&self) -> u64 {
        (self.mem2_size as u64).next_power_of_two()
    }

    /// Region containing `address`, if it is enabled
    pub fn region_of(
        &self,
        address: ConsoleAddress,
        aram_accessible: bool,
        mem2_enabled: bool,
    ) -> Option<MemoryRegion> {
        self.segments(aram_accessible, mem2_enabled)
            .into_iter()
            .find(|s| s.contains(address, 1))
            .map(|s| s.region)
    }

    /// Whether `address` lies in an enabled region
    pub fn is_valid_address(
        &self,
        address: ConsoleAddress,
        aram_accessible: bool,
        mem2_enabled: bool,
    ) -> bool {
        self.region_of(address, aram_accessible, mem2_enabled)
            .is_some()
    }

    /// Whether every byte of `[address, address + len)` lies in one enabled region
    pub fn is_valid_range(
        &self,
        address: ConsoleAddress,
        len: usize,
        aram_accessible: bool,
        mem2_enabled: bool,
    ) -> bool {
        self.segments(aram_accessible, mem2_enabled)
            .iter()
            .any(|s| s.contains(address, len.max(1)))
    }

    /// Converts a console address to a backend offset
    pub fn addr_to_offset(&self, address: ConsoleAddress, aram_accessible: bool) -> u32 {
        if (ARAM_START..ARAM_END).contains(&address) {
            if aram_accessible {
                return address - ARAM_START;
            }
        } else if address >= MEM1_START && (address as u64) < self.mem1_end() {
            let offset = address - MEM1_START;
            return if aram_accessible {
                offset + ARAM_FAKESIZE
            } else {
                offset
            };
        } else if address >= MEM2_START && (address as u64) < self.mem2_end() && !aram_accessible
        {
            return self.mem1_size + (address - MEM2_START);
        }
        address
    }

    /// Converts a backend offset to a console address
    pub fn offset_to_addr(&self, offset: u32, aram_accessible: bool) -> ConsoleAddress {
        if aram_accessible {
            if offset < ARAM_SIZE {
                return ARAM_START + offset;
            }
            if offset >= ARAM_FAKESIZE && offset - ARAM_FAKESIZE < self.mem1_size {
                return MEM1_START + (offset - ARAM_FAKESIZE);
            }
        } else {
            if offset < self.mem1_size {
                return MEM1_START + offset;
            }
            if offset - self.mem1_size < self.mem2_size {
                return MEM2_START + (offset - self.mem1_size);
            }
        }
        offset
    }

    /// Converts a backend offset to a snapshot cache index
    pub fn offset_to_cache_index(&self, offset: u32, aram_accessible: bool) -> u32 {
        if aram_accessible {
            if offset < ARAM_SIZE {
                return offset;
            }
            if offset >= ARAM_FAKESIZE && offset - ARAM_FAKESIZE < self.mem1_size {
                return offset - ARAM_FAKESIZE + ARAM_SIZE;
            }
        }
        offset
    }

    /// Converts a snapshot cache index to a backend offset
    pub fn cache_index_to_offset(&self, cache_index: u32, aram_accessible: bool) -> u32 {
        if aram_accessible {
            if cache_index < ARAM_SIZE {
                return cache_index;
            }
            if cache_index - ARAM_SIZE < self.mem1_size {
                return cache_index - ARAM_SIZE + ARAM_FAKESIZE;
            }
        }
        cache_index
    }

    /// Enabled regions in offset order
    pub fn segments(&self, aram_accessible: bool, mem2_enabled: bool) -> Vec<Segment> {
        if aram_accessible {
            return vec![
                Segment {
                    region: MemoryRegion::Aram,
                    console_start: ARAM_START,
                    len: ARAM_SIZE,
                    offset: 0,
                    cache_index: 0,
                },
                Segment {
                    region: MemoryRegion::Mem1,
                    console_start: MEM1_START,
                    len: self.mem1_size,
                    offset: ARAM_FAKESIZE,
                    cache_index: ARAM_SIZE,
                },
            ];
        }

        let mut segments = vec![Segment {
            region: MemoryRegion::Mem1,
            console_start: MEM1_START,
            len: self.mem1_size,
            offset: 0,
            cache_index: 0,
        }];
        if mem2_enabled {
            segments.push(Segment {
                region: MemoryRegion::Mem2,
                console_start: MEM2_START,
                len: self.mem2_size,
                offset: self.mem1_size,
                cache_index: self.mem1_size,
            });
        }
        segments
    }

    /// Total snapshot buffer size for the enabled regions
    pub fn cache_size(&self, aram_accessible: bool, mem2_enabled: bool) -> usize {
        self.segments(aram_accessible, mem2_enabled)
            .iter()
            .map(|s| s.len as usize)
            .sum()
    }

    fn mem1_end(&self) -> u64 {
        MEM1_START as u64 + self.mem1_size as u64
    }

    fn mem2_end(&self) -> u64 {
        MEM2_START as u64 + self.mem2_size as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_without_aram() {
        let layout = RamLayout::default();
        assert_eq!(layout.addr_to_offset(0x8000_0000, false), 0);
        assert_eq!(layout.addr_to_offset(0x8000_1234, false), 0x1234);
        assert_eq!(layout.addr_to_offset(0x9000_0010, false), 0x0180_0010);
        assert_eq!(layout.offset_to_addr(0x0180_0010, false), 0x9000_0010);
        assert_eq!(layout.offset_to_cache_index(0x0180_0010, false), 0x0180_0010);
    }

    #[test]
    fn test_offsets_with_aram() {
        let layout = RamLayout::default();
        assert_eq!(layout.addr_to_offset(0x7E00_0010, true), 0x10);
        assert_eq!(layout.addr_to_offset(0x8000_0010, true), ARAM_FAKESIZE + 0x10);
        assert_eq!(layout.offset_to_cache_index(ARAM_FAKESIZE + 0x10, true), ARAM_SIZE + 0x10);
        assert_eq!(layout.cache_index_to_offset(ARAM_SIZE + 0x10, true), ARAM_FAKESIZE + 0x10);
        assert_eq!(layout.offset_to_addr(ARAM_FAKESIZE + 0x10, true), 0x8000_0010);
    }

    #[test]
    fn test_unmapped_inputs_are_unchanged() {
        let layout = RamLayout::default();
        assert_eq!(layout.addr_to_offset(0x1234, false), 0x1234);
        // ARAM addresses are not offsets unless ARAM is accessible
        assert_eq!(layout.addr_to_offset(0x7E00_0000, false), 0x7E00_0000);
        // MEM2 is not part of the offset space while ARAM is
        assert_eq!(layout.addr_to_offset(0x9000_0000, true), 0x9000_0000);
        // The hole between ARAM's real and mapped sizes
        assert_eq!(layout.offset_to_addr(ARAM_SIZE + 4, true), ARAM_SIZE + 4);
    }

    #[test]
    fn test_segments_and_cache_size() {
        let layout = RamLayout::default();
        assert_eq!(layout.segments(false, false).len(), 1);
        assert_eq!(layout.cache_size(false, true), 0x0180_0000 + 0x0400_0000);
        assert_eq!(layout.cache_size(true, false), (ARAM_SIZE + 0x0180_0000) as usize);

        let segments = layout.segments(true, false);
        assert_eq!(segments[0].region, MemoryRegion::Aram);
        assert_eq!(segments[1].cache_index, ARAM_SIZE);
        assert_eq!(segments[1].cache_index_of(0x8000_0004), (ARAM_SIZE + 4) as usize);
    }

    #[test]
    fn test_address_validity() {
        let layout = RamLayout::default();
        assert!(layout.is_valid_address(0x8000_0000, false, false));
        assert!(!layout.is_valid_address(0x8180_0000, false, false));
        assert!(!layout.is_valid_address(0x9000_0000, false, false));
        assert!(layout.is_valid_address(0x9000_0000, false, true));
        assert!(layout.is_valid_address(0x7E00_0000, true, false));

        assert!(layout.is_valid_range(0x817F_FFFC, 4, false, false));
        assert!(!layout.is_valid_range(0x817F_FFFE, 4, false, false));
        assert_eq!(
            layout.region_of(0x9000_0000, false, true),
            Some(MemoryRegion::Mem2)
        );
    }

    #[test]
    fn test_mapped_sizes() {
        let layout = RamLayout::default();
        assert_eq!(layout.mem1_mapped_size(), 0x0200_0000);
        assert_eq!(layout.mem2_mapped_size(), 0x0400_0000);
    }
}
