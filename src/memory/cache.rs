//! Double-buffered snapshot of the emulated RAM
//!
//! [`RamCache::refresh`] reads every enabled region into a spare buffer and
//! only publishes it once all reads succeeded. Readers hold an
//! `Arc<RamSnapshot>`, so a refresh never changes bytes under them.

use crate::core::types::{
    format_memory, ConsoleAddress, MemBase, MemType, MemoryError, MemoryResult, Signedness,
    UNKNOWN_VALUE,
};
use crate::memory::translate::Segment;
use crate::process::DolphinProcess;
use std::sync::Arc;
use tracing::{debug, warn};

/// Immutable copy of the enabled RAM regions
#[derive(Debug, Clone)]
pub struct RamSnapshot {
    data: Vec<u8>,
    segments: Vec<Segment>,
    generation: u64,
}

impl RamSnapshot {
    /// Builds a snapshot from raw cache bytes laid out per `segments`
    pub fn from_parts(data: Vec<u8>, segments: Vec<Segment>, generation: u64) -> Self {
        RamSnapshot {
            data,
            segments,
            generation,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw cache bytes, indexed by cache index
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Regions covered by the snapshot
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of the refresh that produced this snapshot
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Segment holding all of `[address, address + len)`
    pub fn segment_for(&self, address: ConsoleAddress, len: usize) -> Option<&Segment> {
        self.segments.iter().find(|s| s.contains(address, len.max(1)))
    }

    /// Cache index of a console address, if it is cached
    pub fn cache_index_of(&self, address: ConsoleAddress) -> Option<usize> {
        self.segment_for(address, 1)
            .map(|s| s.cache_index_of(address))
    }

    /// Cached bytes of `[address, address + len)` when the whole range lies in
    /// one region
    pub fn bytes_at(&self, address: ConsoleAddress, len: usize) -> Option<&[u8]> {
        let index = self.segment_for(address, len)?.cache_index_of(address);
        self.data.get(index..index + len)
    }

    /// Copies `count` bytes at `address` into `dest`.
    ///
    /// Leaves `dest` untouched and returns false unless every byte of the range
    /// is cached and `dest` can hold it.
    pub fn copy_raw(&self, address: ConsoleAddress, count: usize, dest: &mut [u8]) -> bool {
        match (self.bytes_at(address, count), dest.get_mut(..count)) {
            (Some(src), Some(dest)) => {
                dest.copy_from_slice(src);
                true
            }
            _ => false,
        }
    }

    /// Formats the value stored at a cache index
    pub fn read_typed(
        &self,
        cache_index: usize,
        ty: MemType,
        length: usize,
        base: MemBase,
        signedness: Signedness,
    ) -> String {
        let size = ty.size(length);
        match self.data.get(cache_index..cache_index + size) {
            Some(bytes) => format_memory(bytes, ty, base, signedness),
            None => UNKNOWN_VALUE.to_string(),
        }
    }

    /// Formats the value stored at a console address
    pub fn format_at(
        &self,
        address: ConsoleAddress,
        ty: MemType,
        length: usize,
        base: MemBase,
        signedness: Signedness,
    ) -> String {
        match self.bytes_at(address, ty.size(length)) {
            Some(bytes) => format_memory(bytes, ty, base, signedness),
            None => UNKNOWN_VALUE.to_string(),
        }
    }
}

/// Owner of the current snapshot and the buffer the next refresh fills
#[derive(Debug, Default)]
pub struct RamCache {
    current: Option<Arc<RamSnapshot>>,
    spare: Vec<u8>,
    generation: u64,
}

impl RamCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest complete snapshot
    pub fn snapshot(&self) -> Option<Arc<RamSnapshot>> {
        self.current.clone()
    }

    /// Drops the published snapshot
    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Number of successful refreshes so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Reads every enabled region and publishes the result.
    ///
    /// Performs one backend read per region. On failure the previously
    /// published snapshot stays in place and the error is returned.
    pub fn refresh(&mut self, process: &dyn DolphinProcess) -> MemoryResult<Arc<RamSnapshot>> {
        let info = process.ram_info();
        if !info.is_mapped() {
            return Err(MemoryError::NotHooked);
        }

        let segments = info.segments();
        let mut buffer = std::mem::take(&mut self.spare);
        buffer.clear();
        buffer.resize(info.cache_size(), 0);

        for segment in &segments {
            let start = segment.cache_index as usize;
            let end = start + segment.len as usize;
            if let Err(e) = process.read_into(segment.offset, &mut buffer[start..end], false) {
                warn!("Refreshing {} failed: {}", segment.region, e);
                self.spare = buffer;
                return Err(e);
            }
        }

        self.generation += 1;
        let snapshot = Arc::new(RamSnapshot::from_parts(buffer, segments, self.generation));

        if let Some(previous) = self.current.replace(Arc::clone(&snapshot)) {
            // Reuse the old buffer if nobody is still reading it
            if let Ok(previous) = Arc::try_unwrap(previous) {
                self.spare = previous.data;
            }
        }

        debug!(
            "RAM snapshot {} refreshed ({} bytes)",
            self.generation,
            snapshot.len()
        );
        Ok(snapshot)
    }
}
