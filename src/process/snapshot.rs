//! In-memory backend
//!
//! [`SnapshotProcess`] serves console RAM from owned byte images instead of a
//! live emulator. It drives the engine against RAM dumps and in tests. Clones
//! share the same images, so a test can keep one clone to mutate "guest" memory
//! or inject failures while an accessor owns the other.

use super::{DiscoveredRegions, DolphinProcess, EmuRamInfo};
use crate::core::types::{
    ConsoleAddress, MemoryError, MemoryRegion, MemoryResult, ARAM_SIZE, DEFAULT_MEM2_SIZE,
};
use crate::memory::translate::RamLayout;
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

const MEM1_HOST_BASE: u64 = 0x1000_0000_0000;
const MEM2_HOST_BASE: u64 = 0x2000_0000_0000;
const ARAM_HOST_BASE: u64 = 0x3000_0000_0000;

#[derive(Debug)]
struct Images {
    mem1: Vec<u8>,
    mem2: Option<Vec<u8>>,
    aram: Option<Vec<u8>>,
    running: bool,
    emulating: bool,
    failing: bool,
}

impl Images {
    fn host_slice(&self, host_address: u64, len: usize) -> Option<(&Vec<u8>, usize)> {
        let candidates = [
            (MEM1_HOST_BASE, Some(&self.mem1)),
            (MEM2_HOST_BASE, self.mem2.as_ref()),
            (ARAM_HOST_BASE, self.aram.as_ref()),
        ];
        candidates.into_iter().find_map(|(base, image)| {
            let image = image?;
            let start = host_address.checked_sub(base)? as usize;
            (start + len <= image.len()).then_some((image, start))
        })
    }

    fn image_mut(&mut self, region: MemoryRegion) -> Option<&mut Vec<u8>> {
        match region {
            MemoryRegion::Mem1 => Some(&mut self.mem1),
            MemoryRegion::Mem2 => self.mem2.as_mut(),
            MemoryRegion::Aram => self.aram.as_mut(),
        }
    }

    fn image(&self, region: MemoryRegion) -> Option<&Vec<u8>> {
        match region {
            MemoryRegion::Mem1 => Some(&self.mem1),
            MemoryRegion::Mem2 => self.mem2.as_ref(),
            MemoryRegion::Aram => self.aram.as_ref(),
        }
    }
}

/// Backend over in-memory RAM images
#[derive(Debug, Clone)]
pub struct SnapshotProcess {
    images: Arc<RwLock<Images>>,
    info: EmuRamInfo,
    found: bool,
}

impl SnapshotProcess {
    /// A running, emulating GameCube-style target with zeroed MEM1 only
    pub fn new(layout: RamLayout) -> Self {
        SnapshotProcess {
            images: Arc::new(RwLock::new(Images {
                mem1: vec![0; layout.mem1_size as usize],
                mem2: None,
                aram: None,
                running: true,
                emulating: true,
                failing: false,
            })),
            info: EmuRamInfo::new(layout),
            found: false,
        }
    }

    /// A target that is not running
    pub fn detached(layout: RamLayout) -> Self {
        let process = Self::new(layout);
        process.set_running(false);
        process
    }

    /// Adds a zeroed MEM2 image
    pub fn with_mem2(self) -> Self {
        let size = self.info.layout().mem2_size as usize;
        self.write_images().mem2 = Some(vec![0; size]);
        self
    }

    /// Adds a zeroed ARAM image
    pub fn with_aram(self) -> Self {
        self.write_images().aram = Some(vec![0; ARAM_SIZE as usize]);
        self
    }

    /// Loads MEM1 and optionally MEM2 from raw dump files.
    ///
    /// Region sizes are taken from the file lengths.
    pub fn from_dump(mem1: &Path, mem2: Option<&Path>) -> MemoryResult<Self> {
        let mem1_image = fs::read(mem1)?;
        let mem2_image = mem2.map(fs::read).transpose()?;

        let mem1_size = u32::try_from(mem1_image.len())
            .map_err(|_| MemoryError::invalid_input("MEM1 dump is too large"))?;
        let mem2_size = match &mem2_image {
            Some(image) => u32::try_from(image.len())
                .map_err(|_| MemoryError::invalid_input("MEM2 dump is too large"))?,
            None => DEFAULT_MEM2_SIZE,
        };
        if mem1_size == 0 {
            return Err(MemoryError::invalid_input("MEM1 dump is empty"));
        }

        let process = Self::new(RamLayout::new(mem1_size, mem2_size));
        {
            let mut images = process.write_images();
            images.mem1 = mem1_image;
            images.mem2 = mem2_image;
        }
        Ok(process)
    }

    pub fn set_running(&self, running: bool) {
        self.write_images().running = running;
    }

    pub fn set_emulating(&self, emulating: bool) {
        self.write_images().emulating = emulating;
    }

    /// Makes every host read and write fail until cleared
    pub fn set_failing(&self, failing: bool) {
        self.write_images().failing = failing;
    }

    /// Writes raw bytes at a console address, bypassing the enabled-region flags
    pub fn poke(&self, address: ConsoleAddress, bytes: &[u8]) -> bool {
        let Some((region, start)) = self.locate(address, bytes.len()) else {
            return false;
        };
        let mut images = self.write_images();
        match images.image_mut(region) {
            Some(image) if start + bytes.len() <= image.len() => {
                image[start..start + bytes.len()].copy_from_slice(bytes);
                true
            }
            _ => false,
        }
    }

    /// Writes a big-endian word at a console address
    pub fn poke_u32(&self, address: ConsoleAddress, value: u32) -> bool {
        self.poke(address, &value.to_be_bytes())
    }

    /// Reads raw bytes at a console address, bypassing the enabled-region flags
    pub fn peek(&self, address: ConsoleAddress, len: usize) -> Option<Vec<u8>> {
        let (region, start) = self.locate(address, len)?;
        let images = self.read_images();
        let image = images.image(region)?;
        image.get(start..start + len).map(<[u8]>::to_vec)
    }

    fn locate(&self, address: ConsoleAddress, len: usize) -> Option<(MemoryRegion, usize)> {
        let layout = self.info.layout();
        [(true, false), (false, true)]
            .into_iter()
            .flat_map(|(aram, mem2)| layout.segments(aram, mem2))
            .find(|s| s.contains(address, len.max(1)))
            .map(|s| (s.region, (address - s.console_start) as usize))
    }

    fn read_images(&self) -> RwLockReadGuard<'_, Images> {
        self.images.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_images(&self) -> RwLockWriteGuard<'_, Images> {
        self.images.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl DolphinProcess for SnapshotProcess {
    fn find_process(&mut self) -> bool {
        self.info.clear();
        let running = self.read_images().running;
        self.found = running;
        self.found
    }

    fn discover_regions(&mut self) -> bool {
        let images = self.read_images();
        if !self.found || !images.running || !images.emulating {
            drop(images);
            self.info.clear();
            return false;
        }

        let regions = DiscoveredRegions {
            mem1: MEM1_HOST_BASE,
            mem2: images.mem2.as_ref().map(|_| MEM2_HOST_BASE),
            aram: images.aram.as_ref().map(|_| ARAM_HOST_BASE),
        };
        drop(images);
        self.info.apply_discovery(regions);
        true
    }

    fn pid(&self) -> Option<u32> {
        self.found.then_some(std::process::id())
    }

    fn ram_info(&self) -> &EmuRamInfo {
        &self.info
    }

    fn ram_info_mut(&mut self) -> &mut EmuRamInfo {
        &mut self.info
    }

    fn read_host(&self, host_address: u64, buffer: &mut [u8]) -> MemoryResult<()> {
        let images = self.read_images();
        if images.failing || !images.running {
            return Err(MemoryError::read_failed(
                format!("0x{:X}", host_address),
                "target is gone",
            ));
        }
        let (image, start) = images
            .host_slice(host_address, buffer.len())
            .ok_or_else(|| {
                MemoryError::read_failed(format!("0x{:X}", host_address), "unmapped host range")
            })?;
        buffer.copy_from_slice(&image[start..start + buffer.len()]);
        Ok(())
    }

    fn write_host(&mut self, host_address: u64, data: &[u8]) -> MemoryResult<()> {
        let mut images = self.write_images();
        if images.failing || !images.running {
            return Err(MemoryError::write_failed(
                format!("0x{:X}", host_address),
                "target is gone",
            ));
        }
        let start = images
            .host_slice(host_address, data.len())
            .map(|(_, start)| start)
            .ok_or_else(|| {
                MemoryError::write_failed(format!("0x{:X}", host_address), "unmapped host range")
            })?;

        let image = if host_address >= ARAM_HOST_BASE {
            images.aram.as_mut()
        } else if host_address >= MEM2_HOST_BASE {
            images.mem2.as_mut()
        } else {
            Some(&mut images.mem1)
        };
        if let Some(image) = image {
            image[start..start + data.len()].copy_from_slice(data);
        }
        Ok(())
    }
}
