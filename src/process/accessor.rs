//! Hook state and the entry point every engine operation goes through

use super::{DolphinProcess, EmuRamInfo};
use crate::core::types::{ConsoleAddress, MemoryError, MemoryResult, MEM1_START};
use crate::memory::cache::{RamCache, RamSnapshot};
use crate::memory::translate::RamLayout;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Disc header word that identifies a Wii game
const WII_MAGIC_ADDRESS: ConsoleAddress = 0x8000_0018;
const WII_MAGIC: u32 = 0x5D1C_9EA3;
/// Disc header word that identifies a GameCube game
const GAMECUBE_MAGIC_ADDRESS: ConsoleAddress = 0x8000_001C;
const GAMECUBE_MAGIC: u32 = 0xC233_9F3D;

/// OS globals holding the physical RAM sizes the game booted with
const MEM1_SIZE_ADDRESS: ConsoleAddress = 0x8000_0028;
const MEM2_SIZE_ADDRESS: ConsoleAddress = 0x8000_3118;
const SIZE_GRANULARITY: u32 = 0x10_0000;

/// Connection state with the emulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DolphinStatus {
    /// Regions are mapped and reads go through
    Hooked,
    /// No emulator process was found
    NotRunning,
    /// The emulator runs but no game is being emulated
    NoEmulation,
    /// Never hooked, or unhooked after a failure
    UnHooked,
}

impl fmt::Display for DolphinStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DolphinStatus::Hooked => write!(f, "hooked"),
            DolphinStatus::NotRunning => write!(f, "emulator is not running"),
            DolphinStatus::NoEmulation => write!(f, "emulator is running but not emulating"),
            DolphinStatus::UnHooked => write!(f, "unhooked"),
        }
    }
}

/// Console family of the running game, from the disc header magic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Console {
    GameCube,
    Wii,
    Unknown,
}

/// Owns the backend, the hook status and the shared RAM cache
pub struct DolphinAccessor {
    process: Box<dyn DolphinProcess>,
    status: DolphinStatus,
    cache: RamCache,
}

impl DolphinAccessor {
    pub fn new(process: Box<dyn DolphinProcess>) -> Self {
        DolphinAccessor {
            process,
            status: DolphinStatus::UnHooked,
            cache: RamCache::new(),
        }
    }

    /// Finds the emulator and maps its RAM.
    ///
    /// On success the RAM sizes are refined from the game's OS globals and MEM2
    /// follows the disc type.
    pub fn hook(&mut self) -> DolphinStatus {
        self.cache.clear();

        if !self.process.find_process() {
            self.status = DolphinStatus::NotRunning;
            debug!("Emulator process not found");
            return self.status;
        }

        if !self.process.discover_regions() {
            self.status = DolphinStatus::NoEmulation;
            debug!("Emulator found but no emulated RAM is mapped");
            return self.status;
        }

        self.status = DolphinStatus::Hooked;
        self.refine_layout();

        let console = self.console();
        if console == Console::GameCube && self.is_mem2_enabled() {
            self.process.ram_info_mut().set_mem2_enabled(false);
        }

        info!(
            "Hooked to emulator (pid {:?}, {:?}, MEM2 {}, ARAM {})",
            self.process.pid(),
            console,
            self.is_mem2_enabled(),
            self.is_aram_accessible()
        );
        self.status
    }

    /// Drops the mapping and the cache
    pub fn unhook(&mut self) {
        if self.status == DolphinStatus::Hooked {
            info!("Unhooked from emulator");
        }
        self.process.ram_info_mut().clear();
        self.cache.clear();
        self.status = DolphinStatus::UnHooked;
    }

    pub fn status(&self) -> DolphinStatus {
        self.status
    }

    pub fn is_hooked(&self) -> bool {
        self.status == DolphinStatus::Hooked
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.pid()
    }

    pub fn process(&self) -> &dyn DolphinProcess {
        self.process.as_ref()
    }

    pub fn ram_info(&self) -> &EmuRamInfo {
        self.process.ram_info()
    }

    pub fn layout(&self) -> RamLayout {
        self.ram_info().layout()
    }

    pub fn is_mem2_enabled(&self) -> bool {
        self.ram_info().is_mem2_enabled()
    }

    pub fn is_aram_accessible(&self) -> bool {
        self.ram_info().is_aram_accessible()
    }

    /// Toggles MEM2; enabling it turns ARAM off. The cache is dropped when the
    /// set of enabled regions changes.
    pub fn set_mem2_enabled(&mut self, enabled: bool) -> bool {
        let before = (self.is_mem2_enabled(), self.is_aram_accessible());
        let result = self.process.ram_info_mut().set_mem2_enabled(enabled);
        if before != (self.is_mem2_enabled(), self.is_aram_accessible()) {
            self.cache.clear();
        }
        result
    }

    /// Toggles ARAM access; enabling it turns MEM2 off. The cache is dropped
    /// when the set of enabled regions changes.
    pub fn set_aram_accessible(&mut self, accessible: bool) -> bool {
        let before = (self.is_mem2_enabled(), self.is_aram_accessible());
        let result = self.process.ram_info_mut().set_aram_accessible(accessible);
        if before != (self.is_mem2_enabled(), self.is_aram_accessible()) {
            self.cache.clear();
        }
        result
    }

    pub fn is_valid_address(&self, address: ConsoleAddress) -> bool {
        self.ram_info().is_valid_address(address)
    }

    pub fn is_valid_range(&self, address: ConsoleAddress, len: usize) -> bool {
        self.ram_info().is_valid_range(address, len)
    }

    /// Reads `len` bytes at a console address through the backend
    pub fn read_console(
        &self,
        address: ConsoleAddress,
        len: usize,
        byteswap: bool,
    ) -> MemoryResult<Vec<u8>> {
        self.ensure_hooked()?;
        if !self.is_valid_range(address, len) {
            return Err(MemoryError::invalid_input(format!(
                "0x{:08X}+{} is outside every enabled region",
                address, len
            )));
        }
        let offset = self.ram_info().addr_to_offset(address);
        self.process.read(offset, len, byteswap)
    }

    /// Reads a big-endian word at a console address through the backend
    pub fn read_u32(&self, address: ConsoleAddress) -> MemoryResult<u32> {
        let bytes = self.read_console(address, 4, false)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Writes raw bytes at a console address through the backend
    pub fn write_console(
        &mut self,
        address: ConsoleAddress,
        data: &[u8],
        byteswap: bool,
    ) -> MemoryResult<()> {
        self.ensure_hooked()?;
        if !self.is_valid_range(address, data.len()) {
            return Err(MemoryError::invalid_input(format!(
                "0x{:08X}+{} is outside every enabled region",
                address,
                data.len()
            )));
        }
        let offset = self.ram_info().addr_to_offset(address);
        self.process.write(offset, data, byteswap)
    }

    /// Re-reads the RAM cache. A backend failure unhooks, since the target can
    /// no longer be trusted.
    pub fn refresh_cache(&mut self) -> MemoryResult<Arc<RamSnapshot>> {
        self.ensure_hooked()?;
        match self.cache.refresh(self.process.as_ref()) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                if e.is_operation_failed() {
                    warn!("RAM refresh failed, unhooking: {}", e);
                    self.unhook();
                }
                Err(e)
            }
        }
    }

    /// Latest published snapshot, if any
    pub fn snapshot(&self) -> Option<Arc<RamSnapshot>> {
        self.cache.snapshot()
    }

    /// Latest snapshot, refreshing first when none has been taken yet
    pub fn snapshot_or_refresh(&mut self) -> MemoryResult<Arc<RamSnapshot>> {
        match self.cache.snapshot() {
            Some(snapshot) => Ok(snapshot),
            None => self.refresh_cache(),
        }
    }

    /// Console family from the disc header magic words
    pub fn console(&self) -> Console {
        if self.read_u32(WII_MAGIC_ADDRESS).ok() == Some(WII_MAGIC) {
            Console::Wii
        } else if self.read_u32(GAMECUBE_MAGIC_ADDRESS).ok() == Some(GAMECUBE_MAGIC) {
            Console::GameCube
        } else {
            Console::Unknown
        }
    }

    /// Six character game id at the start of MEM1
    pub fn game_id(&self) -> Option<String> {
        let bytes = self.read_console(MEM1_START, 6, false).ok()?;
        if bytes.iter().all(|b| b.is_ascii_alphanumeric()) {
            Some(String::from_utf8_lossy(&bytes).into_owned())
        } else {
            None
        }
    }

    /// Fails with the reason the last hook attempt left the accessor unhooked
    fn ensure_hooked(&self) -> MemoryResult<()> {
        match self.status {
            DolphinStatus::Hooked => Ok(()),
            DolphinStatus::NotRunning => Err(MemoryError::ProcessNotFound("emulator".to_string())),
            DolphinStatus::NoEmulation => Err(MemoryError::NoEmulation),
            DolphinStatus::UnHooked => Err(MemoryError::NotHooked),
        }
    }

    /// Adopts the RAM sizes the game reports when they fit the host mappings
    fn refine_layout(&mut self) {
        let layout = self.layout();
        let mut refined = layout;

        if let Ok(size) = self.read_u32(MEM1_SIZE_ADDRESS) {
            if plausible_size(size, layout.mem1_mapped_size()) {
                refined.mem1_size = size;
            }
        }
        if self.is_mem2_enabled() {
            if let Ok(size) = self.read_u32(MEM2_SIZE_ADDRESS) {
                if plausible_size(size, layout.mem2_mapped_size()) {
                    refined.mem2_size = size;
                }
            }
        }

        if refined != layout {
            debug!(
                "RAM sizes reported by the game: MEM1 0x{:X}, MEM2 0x{:X}",
                refined.mem1_size, refined.mem2_size
            );
            self.process.ram_info_mut().set_layout(refined);
        }
    }
}

fn plausible_size(size: u32, mapped: u64) -> bool {
    size != 0 && size % SIZE_GRANULARITY == 0 && (size as u64).next_power_of_two() == mapped
}

impl fmt::Debug for DolphinAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DolphinAccessor")
            .field("status", &self.status)
            .field("pid", &self.pid())
            .field("ram_info", self.ram_info())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ErrorKind, ARAM_START, MEM2_START};
    use crate::process::SnapshotProcess;

    fn layout() -> RamLayout {
        RamLayout::new(0x1000, 0x2000)
    }

    #[test]
    fn test_hook_states() {
        let process = SnapshotProcess::detached(layout());
        let control = process.clone();
        let mut accessor = DolphinAccessor::new(Box::new(process));
        assert_eq!(accessor.status(), DolphinStatus::UnHooked);
        assert_eq!(accessor.hook(), DolphinStatus::NotRunning);
        assert_eq!(
            accessor.read_u32(MEM1_START).unwrap_err().kind(),
            ErrorKind::NotFound
        );

        control.set_running(true);
        control.set_emulating(false);
        assert_eq!(accessor.hook(), DolphinStatus::NoEmulation);
        assert!(matches!(accessor.refresh_cache(), Err(MemoryError::NoEmulation)));
        assert_eq!(
            accessor.read_u32(MEM1_START).unwrap_err().kind(),
            ErrorKind::NoEmulation
        );

        control.set_emulating(true);
        assert_eq!(accessor.hook(), DolphinStatus::Hooked);

        accessor.unhook();
        assert!(!accessor.is_hooked());
        assert!(matches!(accessor.read_u32(MEM1_START), Err(MemoryError::NotHooked)));
    }

    #[test]
    fn test_refresh_failure_unhooks() {
        let process = SnapshotProcess::new(layout());
        let control = process.clone();
        let mut accessor = DolphinAccessor::new(Box::new(process));
        accessor.hook();
        assert!(accessor.refresh_cache().is_ok());

        control.set_failing(true);
        let err = accessor.refresh_cache().unwrap_err();
        assert!(err.is_operation_failed());
        assert_eq!(accessor.status(), DolphinStatus::UnHooked);
        assert!(accessor.snapshot().is_none());
    }

    #[test]
    fn test_console_detection() {
        let process = SnapshotProcess::new(layout()).with_mem2();
        let control = process.clone();
        let mut accessor = DolphinAccessor::new(Box::new(process));

        control.poke(MEM1_START, b"GALE01");
        control.poke_u32(GAMECUBE_MAGIC_ADDRESS, GAMECUBE_MAGIC);
        accessor.hook();
        assert_eq!(accessor.console(), Console::GameCube);
        assert_eq!(accessor.game_id().as_deref(), Some("GALE01"));
        assert!(!accessor.is_mem2_enabled());

        control.poke_u32(WII_MAGIC_ADDRESS, WII_MAGIC);
        accessor.hook();
        assert_eq!(accessor.console(), Console::Wii);
        assert!(accessor.is_mem2_enabled());
    }

    #[test]
    fn test_region_toggles() {
        let process = SnapshotProcess::new(layout()).with_mem2().with_aram();
        let mut accessor = DolphinAccessor::new(Box::new(process));
        accessor.hook();
        assert!(accessor.is_mem2_enabled());
        accessor.refresh_cache().unwrap();

        assert!(accessor.set_aram_accessible(true));
        assert!(!accessor.is_mem2_enabled());
        assert!(accessor.snapshot().is_none());
        assert!(accessor.is_valid_address(ARAM_START));
        assert!(!accessor.is_valid_address(MEM2_START));

        assert!(accessor.set_mem2_enabled(true));
        assert!(!accessor.is_aram_accessible());
    }

    #[test]
    fn test_console_io_validates_ranges() {
        let process = SnapshotProcess::new(layout());
        let mut accessor = DolphinAccessor::new(Box::new(process));
        accessor.hook();

        accessor.write_console(MEM1_START + 8, &[0, 0, 1, 0], false).unwrap();
        assert_eq!(accessor.read_u32(MEM1_START + 8).unwrap(), 0x100);
        assert_eq!(
            accessor.read_console(MEM1_START + 8, 4, true).unwrap(),
            vec![0, 1, 0, 0]
        );

        let err = accessor.read_console(MEM1_START + 0xFFE, 4, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(accessor.write_console(MEM2_START, &[1], false).is_err());
    }

    #[test]
    fn test_plausible_sizes() {
        assert!(plausible_size(0x0180_0000, 0x0200_0000));
        assert!(!plausible_size(0, 0x0200_0000));
        assert!(!plausible_size(0x0180_0001, 0x0200_0000));
        assert!(!plausible_size(0x0400_0000, 0x0200_0000));
    }
}
