//! Container assembly.
//!
//! `ContainerBuilder` takes a map of `/`-separated paths to byte slices
//! and produces one complete version 3 compound file. Every call to
//! [`ContainerBuilder::build`] plans the layout from scratch; the builder
//! holds no state besides the borrowed stream map.
//!
//! The serialized region order mirrors the sector numbering exactly —
//! header, directory, FAT, DIFAT, MiniFAT, stream data — so the output is
//! a single sequential concatenation with each region zero-padded to a
//! sector boundary.

use super::directory::DirectoryTree;
use super::header::write_header;
use super::ministream::MiniStreamAllocator;
use super::sectors::SectorPlan;
use crate::consts::*;
use crate::error::Result;

/// Builds a compound file from named streams.
///
/// Paths use `/` to denote storage nesting; intermediate storages are
/// created implicitly. The caller keeps ownership of the stream bytes,
/// which are only borrowed for the duration of [`ContainerBuilder::build`].
///
/// ```
/// use cfbforge::ContainerBuilder;
///
/// # fn main() -> cfbforge::Result<()> {
/// let workbook = vec![0u8; 6000];
/// let module = b"Sub x()\nEnd".to_vec();
///
/// let mut builder = ContainerBuilder::new();
/// builder.insert("Workbook", &workbook);
/// builder.insert("_VBA_PROJECT_CUR/VBA/Module1", &module);
/// let container = builder.build()?;
/// # assert!(container.len() > 1536);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct ContainerBuilder<'a> {
    /// Streams in insertion order; order decides data sector placement
    streams: Vec<(String, &'a [u8])>,
}

impl<'a> ContainerBuilder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stream, replacing any previous bytes at the same path.
    pub fn insert(&mut self, path: &str, data: &'a [u8]) {
        if let Some(existing) = self.streams.iter_mut().find(|(p, _)| p == path) {
            existing.1 = data;
        } else {
            self.streams.push((path.to_string(), data));
        }
    }

    /// Assemble the complete container.
    pub fn build(&self) -> Result<Vec<u8>> {
        let paths: Vec<&str> = self.streams.iter().map(|(p, _)| p.as_str()).collect();
        let mut tree = DirectoryTree::from_paths(&paths)?;

        // Small streams go through the mini stream; their directory entries
        // point into MiniFAT space and the sizes are the unpadded lengths.
        let mut mini = MiniStreamAllocator::new();
        let mut regular: Vec<(u32, &[u8])> = Vec::new();
        for (path, data) in &self.streams {
            let sid = tree.sid_of(path);
            if data.len() < MINI_STREAM_CUTOFF as usize {
                let start = mini.allocate(data);
                let entry = &mut tree.entries[sid as usize];
                entry.start_sector = start;
                entry.size = data.len() as u64;
            } else {
                regular.push((sid, data));
            }
        }

        // The packed mini stream container becomes one more regular
        // payload, owned by the root entry (sid 0).
        let minifat_bytes = mini.minifat_bytes();
        if !mini.is_empty() {
            regular.push((0, mini.container()));
        }

        let payload_sizes: Vec<usize> = regular.iter().map(|(_, d)| d.len()).collect();
        let plan = SectorPlan::compute(
            tree.entries.len() * DIRENTRY_SIZE,
            mini.minifat_sector_count(),
            &payload_sizes,
        )?;

        for (&(sid, data), &start) in regular.iter().zip(&plan.data_start_sectors) {
            let entry = &mut tree.entries[sid as usize];
            entry.start_sector = start;
            entry.size = data.len() as u64;
        }

        let header = write_header(&plan);

        // Region order matches sector numbering, so the file is written
        // front to back with no gaps.
        let mut out = Vec::with_capacity((plan.total_sectors as usize + 1) * SECTOR_SIZE);
        out.extend_from_slice(&header);
        extend_padded(&mut out, &tree.serialize());
        for entry in &plan.fat {
            out.extend_from_slice(&entry.to_le_bytes());
        }
        extend_difat_sectors(&mut out, &plan);
        out.extend_from_slice(&minifat_bytes);
        for (_, data) in &regular {
            extend_padded(&mut out, data);
        }

        debug_assert_eq!(out.len(), (plan.total_sectors as usize + 1) * SECTOR_SIZE);
        Ok(out)
    }
}

/// Append `data` zero-padded to the next sector boundary.
fn extend_padded(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(data);
    let rem = data.len() % SECTOR_SIZE;
    if rem != 0 {
        out.resize(out.len() + SECTOR_SIZE - rem, 0);
    }
}

/// Append the DIFAT sectors: 127 FAT sector ids each, then a pointer to
/// the next DIFAT sector (`ENDOFCHAIN` in the last one).
fn extend_difat_sectors(out: &mut Vec<u8>, plan: &SectorPlan) {
    let overflow = &plan.fat_sector_ids[HEADER_FAT_SLOTS.min(plan.fat_sector_ids.len())..];
    for (i, ids) in overflow.chunks(DIFAT_IDS_PER_SECTOR).enumerate() {
        let mut sector = [0xFFu8; SECTOR_SIZE]; // FREESECT fill
        for (j, &id) in ids.iter().enumerate() {
            sector[j * 4..j * 4 + 4].copy_from_slice(&id.to_le_bytes());
        }
        let next = plan
            .difat_sector_ids
            .get(i + 1)
            .copied()
            .unwrap_or(ENDOFCHAIN);
        sector[SECTOR_SIZE - 4..].copy_from_slice(&next.to_le_bytes());
        out.extend_from_slice(&sector);
    }
}
