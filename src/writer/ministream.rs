//! Mini stream packing for small streams.
//!
//! Streams below the 4096-byte cutoff share one container, carved into
//! 64-byte mini sectors and chained through the MiniFAT. The container
//! itself is later stored as an ordinary FAT-allocated stream owned by
//! the root directory entry.

use crate::consts::*;

/// Packs small streams into the shared mini stream and records their
/// MiniFAT chains.
#[derive(Debug, Default)]
pub struct MiniStreamAllocator {
    minifat: Vec<u32>,
    container: Vec<u8>,
}

impl MiniStreamAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one small stream, padded to a mini sector boundary, and
    /// chain its consecutive mini sectors. Returns the starting mini
    /// sector, or `ENDOFCHAIN` for an empty stream.
    pub fn allocate(&mut self, data: &[u8]) -> u32 {
        if data.is_empty() {
            return ENDOFCHAIN;
        }

        let num_sectors = data.len().div_ceil(MINI_SECTOR_SIZE);
        let start = self.minifat.len() as u32;

        for i in 0..num_sectors {
            let next = if i < num_sectors - 1 {
                start + i as u32 + 1
            } else {
                ENDOFCHAIN
            };
            self.minifat.push(next);
        }

        let offset = self.container.len();
        self.container.resize(offset + num_sectors * MINI_SECTOR_SIZE, 0);
        self.container[offset..offset + data.len()].copy_from_slice(data);

        start
    }

    /// The packed container; always a multiple of 64 bytes.
    pub fn container(&self) -> &[u8] {
        &self.container
    }

    pub fn is_empty(&self) -> bool {
        self.minifat.is_empty()
    }

    /// MiniFAT entries packed little-endian and padded with `FREESECT` to
    /// a whole number of 512-byte sectors.
    pub fn minifat_bytes(&self) -> Vec<u8> {
        if self.minifat.is_empty() {
            return Vec::new();
        }
        let padded_entries =
            self.minifat.len().div_ceil(FAT_ENTRIES_PER_SECTOR) * FAT_ENTRIES_PER_SECTOR;
        let mut bytes = Vec::with_capacity(padded_entries * 4);
        for &entry in &self.minifat {
            bytes.extend_from_slice(&entry.to_le_bytes());
        }
        for _ in self.minifat.len()..padded_entries {
            bytes.extend_from_slice(&FREESECT.to_le_bytes());
        }
        bytes
    }

    /// Number of regular sectors the MiniFAT itself occupies.
    pub fn minifat_sector_count(&self) -> u32 {
        self.minifat.len().div_ceil(FAT_ENTRIES_PER_SECTOR) as u32
    }

    #[cfg(test)]
    pub fn minifat(&self) -> &[u32] {
        &self.minifat
    }
}
