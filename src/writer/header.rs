//! Container header serialization.
//!
//! The 512-byte header is a pure function of the sector plan. Only the
//! fields meaningful for a version 3 container are populated; the CLSID,
//! transaction signature, and reserved ranges stay zero.

use super::sectors::SectorPlan;
use crate::consts::*;

/// Serialize the fixed 512-byte header for a version 3 container.
pub fn write_header(plan: &SectorPlan) -> [u8; 512] {
    let mut header = [0u8; 512];

    header[0..8].copy_from_slice(MAGIC);
    // CLSID at 8..24 stays zero

    // Minor version, major version (3 = 512-byte sectors), byte order
    header[24..26].copy_from_slice(&0x003Eu16.to_le_bytes());
    header[26..28].copy_from_slice(&0x0003u16.to_le_bytes());
    header[28..30].copy_from_slice(&0xFFFEu16.to_le_bytes());

    // Sector shift 9 (512) and mini sector shift 6 (64)
    header[30..32].copy_from_slice(&9u16.to_le_bytes());
    header[32..34].copy_from_slice(&6u16.to_le_bytes());

    // Reserved at 34..40; directory sector count at 40..44 must be 0 in v3

    let fat_sector_count = plan.fat_sector_ids.len() as u32;
    header[44..48].copy_from_slice(&fat_sector_count.to_le_bytes());
    header[48..52].copy_from_slice(&plan.first_dir_sector.to_le_bytes());
    // Transaction signature at 52..56 stays zero
    header[56..60].copy_from_slice(&MINI_STREAM_CUTOFF.to_le_bytes());
    header[60..64].copy_from_slice(&plan.first_minifat_sector.to_le_bytes());
    header[64..68].copy_from_slice(&plan.minifat_sector_count.to_le_bytes());

    let first_difat = plan.difat_sector_ids.first().copied().unwrap_or(ENDOFCHAIN);
    let difat_sector_count = plan.difat_sector_ids.len() as u32;
    header[68..72].copy_from_slice(&first_difat.to_le_bytes());
    header[72..76].copy_from_slice(&difat_sector_count.to_le_bytes());

    // First 109 FAT sector ids inline; unused slots are FREESECT
    for (i, &id) in plan.fat_sector_ids.iter().take(HEADER_FAT_SLOTS).enumerate() {
        header[76 + i * 4..80 + i * 4].copy_from_slice(&id.to_le_bytes());
    }
    for i in plan.fat_sector_ids.len()..HEADER_FAT_SLOTS {
        header[76 + i * 4..80 + i * 4].copy_from_slice(&FREESECT.to_le_bytes());
    }

    header
}
