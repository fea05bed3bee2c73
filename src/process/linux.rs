//! Linux backend: `/proc` scanning and `process_vm_readv`/`process_vm_writev`

use super::{DiscoveredRegions, DolphinProcess, EmuRamInfo};
use crate::core::types::{MemoryError, MemoryResult, ARAM_FAKESIZE};
use crate::memory::translate::RamLayout;
use nix::sys::uio::{process_vm_readv, process_vm_writev, RemoteIoVec};
use nix::unistd::Pid;
use std::fs;
use std::io::{IoSlice, IoSliceMut};
use tracing::{debug, info};

/// Gap the emulator leaves between the MEM1 view and the next view in its
/// shared memory file
const SHM_VIEW_GAP: u64 = 0x40000;

/// One line of `/proc/<pid>/maps`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapsEntry {
    pub start: u64,
    pub end: u64,
    pub perms: String,
    pub offset: u64,
    pub path: Option<String>,
}

impl MapsEntry {
    /// Parses `START-END perms offset dev inode [path]`
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let (start, end) = parts.next()?.split_once('-')?;
        let perms = parts.next()?.to_string();
        let offset = u64::from_str_radix(parts.next()?, 16).ok()?;
        let _dev = parts.next()?;
        let _inode = parts.next()?;
        let path = parts.next().map(str::to_string);

        Some(MapsEntry {
            start: u64::from_str_radix(start, 16).ok()?,
            end: u64::from_str_radix(end, 16).ok()?,
            perms,
            offset,
            path,
        })
    }

    pub fn size(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_read_write(&self) -> bool {
        self.perms.starts_with("rw")
    }

    /// True for the emulator's shared memory file
    pub fn is_emulator_shm(&self) -> bool {
        self.path.as_deref().map_or(false, |p| {
            p.starts_with("/dev/shm/dolphinmem") || p.starts_with("/dev/shm/dolphin-emu")
        })
    }
}

/// Finds the MEM1, MEM2 and ARAM views in the text of `/proc/<pid>/maps`.
///
/// MEM1 is the first read-write view of the shared memory file at file offset
/// 0 with MEM1's mapped size. The view that follows it in the file is MEM2 when
/// it has MEM2's mapped size, or ARAM when it has ARAM's mapped size. Returns
/// `None` when MEM1 is not mapped.
pub fn locate_regions(maps: &str, layout: &RamLayout) -> Option<DiscoveredRegions> {
    let mem1_size = layout.mem1_mapped_size();
    let second_view_offset = mem1_size + SHM_VIEW_GAP;

    let mut mem1 = None;
    let mut mem2 = None;
    let mut aram = None;

    for entry in maps.lines().filter_map(MapsEntry::parse) {
        if !entry.is_emulator_shm() || !entry.is_read_write() {
            continue;
        }

        if entry.offset == 0 && entry.size() == mem1_size {
            mem1.get_or_insert(entry.start);
        } else if entry.offset == second_view_offset {
            if entry.size() == layout.mem2_mapped_size() {
                mem2.get_or_insert(entry.start);
            } else if entry.size() == ARAM_FAKESIZE as u64 {
                aram.get_or_insert(entry.start);
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

/// Backend for a native emulator process on Linux
#[derive(Debug)]
pub struct LinuxDolphinProcess {
    names: Vec<String>,
    pid: Option<i32>,
    info: EmuRamInfo,
}

impl LinuxDolphinProcess {
    /// Creates a backend that looks for any of `names` in `/proc/*/comm`
    pub fn new(names: Vec<String>, layout: RamLayout) -> Self {
        LinuxDolphinProcess {
            names,
            pid: None,
            info: EmuRamInfo::new(layout),
        }
    }

    fn remote_pid(&self) -> MemoryResult<Pid> {
        self.pid
            .map(Pid::from_raw)
            .ok_or(MemoryError::NotHooked)
    }
}

impl DolphinProcess for LinuxDolphinProcess {
    fn find_process(&mut self) -> bool {
        self.pid = None;
        self.info.clear();

        let entries = match fs::read_dir("/proc") {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot list /proc: {}", e);
                return false;
            }
        };

        for entry in entries.flatten() {
            let Some(pid) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<i32>().ok())
            else {
                continue;
            };

            let Ok(comm) = fs::read_to_string(entry.path().join("comm")) else {
                continue;
            };

            if self.names.iter().any(|name| name == comm.trim()) {
                info!("Found emulator process {} ({})", pid, comm.trim());
                self.pid = Some(pid);
                return true;
            }
        }

        false
    }

    fn discover_regions(&mut self) -> bool {
        let Some(pid) = self.pid else {
            return false;
        };

        let maps = match fs::read_to_string(format!("/proc/{}/maps", pid)) {
            Ok(maps) => maps,
            Err(e) => {
                debug!("Cannot read maps of {}: {}", pid, e);
                return false;
            }
        };

        match locate_regions(&maps, &self.info.layout()) {
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
        self.pid.map(|pid| pid as u32)
    }

    fn ram_info(&self) -> &EmuRamInfo {
        &self.info
    }

    fn ram_info_mut(&mut self) -> &mut EmuRamInfo {
        &mut self.info
    }

    fn read_host(&self, host_address: u64, buffer: &mut [u8]) -> MemoryResult<()> {
        let pid = self.remote_pid()?;
        let len = buffer.len();
        let remote = [RemoteIoVec {
            base: host_address as usize,
            len,
        }];

        let read = process_vm_readv(pid, &mut [IoSliceMut::new(buffer)], &remote)?;
        if read != len {
            return Err(MemoryError::read_failed(
                format!("0x{:X}", host_address),
                format!("short read: {} of {} bytes", read, len),
            ));
        }
        Ok(())
    }

    fn write_host(&mut self, host_address: u64, data: &[u8]) -> MemoryResult<()> {
        let pid = self.remote_pid()?;
        let remote = [RemoteIoVec {
            base: host_address as usize,
            len: data.len(),
        }];

        let written = process_vm_writev(pid, &[IoSlice::new(data)], &remote)?;
        if written != data.len() {
            return Err(MemoryError::write_failed(
                format!("0x{:X}", host_address),
                format!("short write: {} of {} bytes", written, data.len()),
            ));
        }
        Ok(())
    }
}
