//! Sector layout planning.
//!
//! The planner decides how many sectors every structural region needs and
//! assigns absolute sector numbers in a fixed order: directory, FAT,
//! DIFAT, MiniFAT, then stream data. The FAT-sector count depends on the
//! total sector count, which includes the FAT sectors themselves, so the
//! two are resolved by a bounded fixed-point iteration.

use crate::consts::*;
use crate::error::{CfbError, Result};

/// Sectors needed to hold `size` bytes (zero for an empty region).
pub fn sectors_for(size: usize) -> u32 {
    size.div_ceil(SECTOR_SIZE) as u32
}

/// A self-consistent sector layout for one container.
#[derive(Debug)]
pub struct SectorPlan {
    /// The full FAT, padded with `FREESECT` to fill its sectors
    pub fat: Vec<u32>,
    pub first_dir_sector: u32,
    pub dir_sector_count: u32,
    /// Absolute ids of the FAT sectors, in order
    pub fat_sector_ids: Vec<u32>,
    /// Absolute ids of the DIFAT sectors, in order (empty unless the FAT
    /// overflows the 109 header slots)
    pub difat_sector_ids: Vec<u32>,
    /// `ENDOFCHAIN` when no small streams exist
    pub first_minifat_sector: u32,
    pub minifat_sector_count: u32,
    /// Starting sector per data payload, in the order the payload sizes
    /// were given; `ENDOFCHAIN` for empty payloads
    pub data_start_sectors: Vec<u32>,
    /// Total allocated sectors, excluding the header
    pub total_sectors: u32,
}

impl SectorPlan {
    /// Compute the layout for a directory of `dir_bytes` bytes, a MiniFAT
    /// of `minifat_sectors` sectors, and the given data payload sizes.
    pub fn compute(
        dir_bytes: usize,
        minifat_sectors: u32,
        payload_sizes: &[usize],
    ) -> Result<Self> {
        let dir_sector_count = sectors_for(dir_bytes);
        let data_sectors: Vec<u32> = payload_sizes.iter().map(|&s| sectors_for(s)).collect();
        let total_data: u32 = data_sectors.iter().sum();
        let base = dir_sector_count + minifat_sectors + total_data;

        let (fat_sector_count, difat_sector_count) = Self::solve_fat_counts(base)?;

        let mut fat = Vec::new();
        let mut next_sector = 0u32;

        let first_dir_sector = push_chain(&mut fat, &mut next_sector, dir_sector_count);

        let mut fat_sector_ids = Vec::with_capacity(fat_sector_count as usize);
        for _ in 0..fat_sector_count {
            fat_sector_ids.push(next_sector);
            fat.push(FATSECT);
            next_sector += 1;
        }

        let mut difat_sector_ids = Vec::with_capacity(difat_sector_count as usize);
        for _ in 0..difat_sector_count {
            difat_sector_ids.push(next_sector);
            fat.push(DIFSECT);
            next_sector += 1;
        }

        let first_minifat_sector = if minifat_sectors > 0 {
            push_chain(&mut fat, &mut next_sector, minifat_sectors)
        } else {
            ENDOFCHAIN
        };

        let mut data_start_sectors = Vec::with_capacity(data_sectors.len());
        for &count in &data_sectors {
            let start = if count == 0 {
                ENDOFCHAIN
            } else {
                push_chain(&mut fat, &mut next_sector, count)
            };
            data_start_sectors.push(start);
        }

        let total_sectors = next_sector;
        let capacity = fat_sector_count as usize * FAT_ENTRIES_PER_SECTOR;
        debug_assert!(fat.len() <= capacity);
        fat.resize(capacity, FREESECT);

        Ok(Self {
            fat,
            first_dir_sector,
            dir_sector_count,
            fat_sector_ids,
            difat_sector_ids,
            first_minifat_sector,
            minifat_sector_count: minifat_sectors,
            data_start_sectors,
            total_sectors,
        })
    }

    /// Fixed-point iteration for the FAT/DIFAT sector counts.
    ///
    /// Starts from zero FAT sectors and recomputes until both counts stop
    /// changing. The iteration is monotone non-decreasing and settles in a
    /// handful of rounds for any realistic input; exhausting the budget is
    /// reported as an error, never papered over with the last estimate.
    fn solve_fat_counts(base_sectors: u32) -> Result<(u32, u32)> {
        let mut fat_sectors = 0u32;
        let mut difat_sectors = 0u32;

        for _ in 0..MAX_LAYOUT_ROUNDS {
            let total = base_sectors + fat_sectors + difat_sectors;
            let needed_fat = total.div_ceil(FAT_ENTRIES_PER_SECTOR as u32);
            let needed_difat = if needed_fat > HEADER_FAT_SLOTS as u32 {
                (needed_fat - HEADER_FAT_SLOTS as u32).div_ceil(DIFAT_IDS_PER_SECTOR as u32)
            } else {
                0
            };

            if needed_fat == fat_sectors && needed_difat == difat_sectors {
                return Ok((fat_sectors, difat_sectors));
            }
            fat_sectors = needed_fat;
            difat_sectors = needed_difat;
        }

        Err(CfbError::LayoutDidNotConverge(MAX_LAYOUT_ROUNDS))
    }
}

/// Append a chain of `count` consecutive sectors to the FAT, each linking
/// to its successor and the last ending the chain. Returns the first
/// sector of the chain.
fn push_chain(fat: &mut Vec<u32>, next_sector: &mut u32, count: u32) -> u32 {
    let start = *next_sector;
    for i in 0..count {
        let next = if i < count - 1 {
            *next_sector + 1
        } else {
            ENDOFCHAIN
        };
        fat.push(next);
        *next_sector += 1;
    }
    start
}
