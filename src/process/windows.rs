//! Windows backend: ToolHelp32 lookup and a `VirtualQueryEx` walk

use super::enumerator::find_process_by_names;
use super::handle::ProcessHandle;
use super::{DiscoveredRegions, DolphinProcess, EmuRamInfo};
use crate::core::types::{MemoryError, MemoryResult, ARAM_FAKESIZE};
use crate::memory::translate::RamLayout;
use tracing::{debug, info, warn};
use winapi::um::winnt::MEM_MAPPED;

/// MEM2 views further than this past MEM1 belong to something else
const MEM2_MAX_DISTANCE: u64 = 0x1000_0000;

/// A region reported by `VirtualQueryEx`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostView {
    pub base: u64,
    pub size: u64,
    pub mapped: bool,
    pub resident: bool,
}

/// Picks the MEM1, MEM2 and ARAM views out of a walk of the address space.
///
/// Several mappings share MEM1's size; only resident `MEM_MAPPED` ones count.
/// The first is MEM1, and a second one placed right after it is ARAM. MEM2 is
/// the first resident view of MEM2's mapped size, ignoring any that lie too far
/// past MEM1.
pub fn classify_views(
    views: impl IntoIterator<Item = HostView>,
    layout: &RamLayout,
) -> Option<DiscoveredRegions> {
    let mem1_size = layout.mem1_mapped_size();
    let mem2_size = layout.mem2_mapped_size();

    let mut mem1: Option<u64> = None;
    let mut mem2 = None;
    let mut aram = None;

    for view in views {
        if mem2.is_none() && view.size == mem2_size {
            if mem1.map_or(false, |start| view.base > start + MEM2_MAX_DISTANCE) {
                break;
            }
            if view.resident {
                mem2 = Some(view.base);
            }
        } else if view.size == mem1_size && view.mapped && view.resident {
            match mem1 {
                None => mem1 = Some(view.base),
                Some(start) if view.base == start + ARAM_FAKESIZE as u64 => {
                    aram = Some(view.base)
                }
                Some(_) => {}
            }
        }
    }

    let mem1 = mem1?;
    Some(DiscoveredRegions {
        mem1,
        mem2,
        aram: if mem2.is_some() { None } else { aram },
    })
}

/// Backend for the emulator on Windows
#[derive(Debug)]
pub struct WindowsDolphinProcess {
    names: Vec<String>,
    handle: Option<ProcessHandle>,
    info: EmuRamInfo,
}

impl WindowsDolphinProcess {
    /// Creates a backend that looks for any of the executable `names`
    pub fn new(names: Vec<String>, layout: RamLayout) -> Self {
        WindowsDolphinProcess {
            names,
            handle: None,
            info: EmuRamInfo::new(layout),
        }
    }

    fn handle(&self) -> MemoryResult<&ProcessHandle> {
        self.handle.as_ref().ok_or(MemoryError::NotHooked)
    }

    fn walk(handle: &ProcessHandle) -> Vec<HostView> {
        let mut views = Vec::new();
        let mut address = 0u64;

        while let Some(region) = handle.query(address) {
            let base = region.BaseAddress as u64;
            let size = region.RegionSize as u64;
            views.push(HostView {
                base,
                size,
                mapped: region.Type == MEM_MAPPED,
                resident: handle.is_resident(base),
            });

            match base.checked_add(size) {
                Some(next) if size > 0 => address = next,
                _ => break,
            }
        }

        views
    }
}

impl DolphinProcess for WindowsDolphinProcess {
    fn find_process(&mut self) -> bool {
        self.handle = None;
        self.info.clear();

        let entry = match find_process_by_names(&self.names) {
            Ok(Some(entry)) => entry,
            Ok(None) => return false,
            Err(e) => {
                warn!("Process enumeration failed: {}", e);
                return false;
            }
        };

        match ProcessHandle::open_for_read_write(entry.pid) {
            Ok(handle) => {
                info!("Found emulator process {} ({})", entry.pid, entry.name);
                self.handle = Some(handle);
                true
            }
            Err(e) => {
                warn!("Cannot open {} ({}): {}", entry.name, entry.pid, e);
                false
            }
        }
    }

    fn discover_regions(&mut self) -> bool {
        let Some(handle) = self.handle.as_ref() else {
            return false;
        };

        let views = Self::walk(handle);
        match classify_views(views, &self.info.layout()) {
            Some(regions) => {
                debug!(
                    "MEM1 at 0x{:X}, MEM2 at {:?}, ARAM at {:?}",
                    regions.mem1, regions.mem2, regions.aram
                );
                self.info.apply_discovery(regions);
                true
            }
            None => {
                self.info.clear();
                false
            }
        }
    }

    fn pid(&self) -> Option<u32> {
        self.handle.as_ref().map(ProcessHandle::pid)
    }

    fn ram_info(&self) -> &EmuRamInfo {
        &self.info
    }

    fn ram_info_mut(&mut self) -> &mut EmuRamInfo {
        &mut self.info
    }

    fn read_host(&self, host_address: u64, buffer: &mut [u8]) -> MemoryResult<()> {
        self.handle()?.read_memory(host_address, buffer)
    }

    fn write_host(&mut self, host_address: u64, data: &[u8]) -> MemoryResult<()> {
        self.handle()?.write_memory(host_address, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(base: u64, size: u64, resident: bool) -> HostView {
        HostView {
            base,
            size,
            mapped: true,
            resident,
        }
    }

    #[test]
    fn test_classify_gamecube_views() {
        let views = vec![
            view(0x1000_0000, 0x0200_0000, false),
            view(0x2000_0000, 0x0200_0000, true),
            view(0x2200_0000, 0x0200_0000, true),
        ];
        let regions = classify_views(views, &RamLayout::default()).unwrap();
        assert_eq!(regions.mem1, 0x2000_0000);
        assert_eq!(regions.aram, Some(0x2200_0000));
        assert_eq!(regions.mem2, None);
    }

    #[test]
    fn test_classify_wii_views() {
        let views = vec![
            view(0x2000_0000, 0x0200_0000, true),
            view(0x2400_0000, 0x0400_0000, true),
        ];
        let regions = classify_views(views, &RamLayout::default()).unwrap();
        assert_eq!(regions.mem2, Some(0x2400_0000));
    }

    #[test]
    fn test_distant_mem2_candidate_stops_walk() {
        let views = vec![
            view(0x2000_0000, 0x0200_0000, true),
            view(0x4000_0000, 0x0400_0000, true),
        ];
        let regions = classify_views(views, &RamLayout::default()).unwrap();
        assert_eq!(regions.mem2, None);
    }

    #[test]
    fn test_no_resident_mem1() {
        let views = vec![view(0x2000_0000, 0x0200_0000, false)];
        assert_eq!(classify_views(views, &RamLayout::default()), None);
    }
}
