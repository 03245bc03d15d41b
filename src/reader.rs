//! Compound file reader.
//!
//! Parses an existing CFB/OLE2 container far enough to enumerate its
//! directory tree and extract stream bytes. This is the decode side the
//! rebuild orchestrator uses on both of its inputs; it deliberately stays
//! read-only and loads the FAT, MiniFAT, and directory eagerly while
//! fetching stream payloads on demand.

use crate::consts::*;
use crate::error::{CfbError, Result};
use std::io::{Read, Seek, SeekFrom};
use zerocopy::{FromBytes, LE, U16, U32, U64};
use zerocopy_derive::FromBytes as DeriveFromBytes;

/// On-disk layout of one 128-byte directory entry.
#[derive(Debug, Clone, DeriveFromBytes)]
#[repr(C)]
struct RawDirEntry {
    /// Entry name in UTF-16LE, null-padded
    name: [u8; 64],
    /// Name length in bytes including the null terminator
    name_len: U16<LE>,
    /// Entry type (storage, stream, root)
    entry_type: u8,
    /// Node colour (0 = red, 1 = black)
    color: u8,
    sid_left: U32<LE>,
    sid_right: U32<LE>,
    sid_child: U32<LE>,
    clsid: [u8; 16],
    state_bits: U32<LE>,
    creation_time: U64<LE>,
    modified_time: U64<LE>,
    start_sector: U32<LE>,
    stream_size: U64<LE>,
}

/// A decoded directory entry (stream or storage).
#[derive(Debug, Clone)]
pub struct CfbEntry {
    /// Index of this entry in the directory
    pub sid: u32,
    /// Decoded UTF-16 name
    pub name: String,
    /// One of the `STGTY_*` values
    pub entry_type: u8,
    pub sid_left: u32,
    pub sid_right: u32,
    pub sid_child: u32,
    /// First sector (FAT or MiniFAT space depending on `in_ministream`)
    pub start_sector: u32,
    /// Stream length in bytes
    pub size: u64,
    /// Whether the payload lives in the mini stream
    pub in_ministream: bool,
}

/// A parsed compound file.
///
/// ```no_run
/// use std::io::Cursor;
/// use cfbforge::CfbFile;
///
/// # fn main() -> cfbforge::Result<()> {
/// let bytes = std::fs::read("report.xls")?;
/// let mut cfb = CfbFile::open(Cursor::new(&bytes))?;
/// for path in cfb.list_streams() {
///     println!("{}", path.join("/"));
/// }
/// let workbook = cfb.open_stream(&["Workbook"])?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CfbFile<R: Read + Seek> {
    reader: R,
    sector_size: usize,
    mini_sector_size: usize,
    mini_stream_cutoff: u32,
    fat: Vec<u32>,
    minifat: Vec<u32>,
    entries: Vec<Option<CfbEntry>>,
    root: Option<CfbEntry>,
    /// Mini stream container, loaded on first small-stream read
    ministream: Option<Vec<u8>>,
}

impl<R: Read + Seek> CfbFile<R> {
    /// Parse the header, FAT, directory, and MiniFAT of a compound file.
    pub fn open(mut reader: R) -> Result<Self> {
        let file_size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        if file_size < MINIMAL_FILE_SIZE as u64 {
            return Err(CfbError::MalformedContainer(
                "file is smaller than an empty container".into(),
            ));
        }

        let mut header = [0u8; 512];
        reader.read_exact(&mut header)?;

        if &header[0..8] != MAGIC {
            return Err(CfbError::MalformedContainer("bad magic signature".into()));
        }

        let major_version = read_u16(&header, 0x1A);
        let byte_order = read_u16(&header, 0x1C);
        let sector_shift = read_u16(&header, 0x1E);
        let mini_sector_shift = read_u16(&header, 0x20);
        let first_dir_sector = read_u32(&header, 0x30);
        let mini_stream_cutoff = read_u32(&header, 0x38);
        let first_minifat_sector = read_u32(&header, 0x3C);
        let num_minifat_sectors = read_u32(&header, 0x40);
        let first_difat_sector = read_u32(&header, 0x44);
        let num_difat_sectors = read_u32(&header, 0x48);

        if byte_order != 0xFFFE {
            return Err(CfbError::MalformedContainer("bad byte-order mark".into()));
        }
        if sector_shift >= 32 || mini_sector_shift >= 16 {
            return Err(CfbError::MalformedContainer("bad sector shift".into()));
        }

        let sector_size = 1usize << sector_shift;
        let mini_sector_size = 1usize << mini_sector_shift;
        // Only versions 3 and 4 exist; anything else would leave the
        // sector geometry below unconstrained
        match (major_version, sector_size) {
            (3, 512) | (4, 4096) => {}
            _ => {
                return Err(CfbError::MalformedContainer(format!(
                    "major version {major_version} with sector size {sector_size}"
                )));
            }
        }

        let mut cfb = CfbFile {
            reader,
            sector_size,
            mini_sector_size,
            mini_stream_cutoff,
            fat: Vec::new(),
            minifat: Vec::new(),
            entries: Vec::new(),
            root: None,
            ministream: None,
        };

        cfb.load_fat(&header, first_difat_sector, num_difat_sectors)?;
        cfb.load_directory(first_dir_sector)?;
        if num_minifat_sectors > 0 {
            cfb.load_minifat(first_minifat_sector)?;
        }

        Ok(cfb)
    }

    /// Collect the sector ids of every FAT sector (109 inline ids plus the
    /// DIFAT overflow chain), then flatten those sectors into the FAT table.
    fn load_fat(
        &mut self,
        header: &[u8; 512],
        first_difat_sector: u32,
        num_difat_sectors: u32,
    ) -> Result<()> {
        let mut fat_sectors = Vec::new();
        for i in 0..HEADER_FAT_SLOTS {
            let id = read_u32(header, 0x4C + i * 4);
            if id == FREESECT || id == ENDOFCHAIN {
                break;
            }
            fat_sectors.push(id);
        }

        let ids_per_difat = self.sector_size / 4 - 1;
        let mut difat_sector = first_difat_sector;
        for _ in 0..num_difat_sectors {
            if difat_sector == ENDOFCHAIN || difat_sector == FREESECT {
                break;
            }
            let sector = self.read_sector(difat_sector)?;
            for i in 0..ids_per_difat {
                let id = read_u32(&sector, i * 4);
                if id == FREESECT || id == ENDOFCHAIN {
                    break;
                }
                fat_sectors.push(id);
            }
            difat_sector = read_u32(&sector, ids_per_difat * 4);
        }

        let entries_per_sector = self.sector_size / 4;
        self.fat.reserve(fat_sectors.len() * entries_per_sector);
        for &id in &fat_sectors {
            let sector = self.read_sector(id)?;
            for i in 0..entries_per_sector {
                self.fat.push(read_u32(&sector, i * 4));
            }
        }

        Ok(())
    }

    fn load_minifat(&mut self, first_minifat_sector: u32) -> Result<()> {
        let data = self.read_fat_chain(first_minifat_sector)?;
        self.minifat.reserve(data.len() / 4);
        for chunk in data.chunks_exact(4) {
            self.minifat
                .push(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }
        Ok(())
    }

    fn load_directory(&mut self, first_dir_sector: u32) -> Result<()> {
        let dir_data = self.read_fat_chain(first_dir_sector)?;
        let num_entries = dir_data.len() / DIRENTRY_SIZE;
        if num_entries == 0 {
            return Err(CfbError::MalformedContainer("empty directory".into()));
        }
        self.entries = vec![None; num_entries];

        let root = self.parse_entry(&dir_data[0..DIRENTRY_SIZE], 0)?;
        let root_child = root.sid_child;
        self.root = Some(root);
        self.parse_subtree(root_child, &dir_data)?;
        Ok(())
    }

    fn parse_entry(&self, data: &[u8], sid: u32) -> Result<CfbEntry> {
        let raw = RawDirEntry::read_from_bytes(data)
            .map_err(|_| CfbError::MalformedContainer("short directory entry".into()))?;

        let name_len = raw.name_len.get() as usize;
        let name = decode_utf16le(&raw.name[..name_len.saturating_sub(2).min(64)]);

        // Version 3 files only carry a meaningful low dword in the size field
        let size = if self.sector_size == 512 {
            raw.stream_size.get() & 0xFFFF_FFFF
        } else {
            raw.stream_size.get()
        };

        let in_ministream =
            raw.entry_type == STGTY_STREAM && size < self.mini_stream_cutoff as u64;

        Ok(CfbEntry {
            sid,
            name,
            entry_type: raw.entry_type,
            sid_left: raw.sid_left.get(),
            sid_right: raw.sid_right.get(),
            sid_child: raw.sid_child.get(),
            start_sector: raw.start_sector.get(),
            size,
            in_ministream,
        })
    }

    /// Walk sibling/child links from `sid`, parsing every reachable entry.
    ///
    /// Uses an explicit worklist rather than recursion: sibling links come
    /// straight from the file, and a degenerate chain of entries must not
    /// be able to exhaust the stack.
    fn parse_subtree(&mut self, sid: u32, dir_data: &[u8]) -> Result<()> {
        let num_entries = dir_data.len() / DIRENTRY_SIZE;
        let mut pending = vec![sid];
        while let Some(sid) = pending.pop() {
            if sid == NOSTREAM {
                continue;
            }
            let idx = sid as usize;
            if idx >= num_entries {
                return Err(CfbError::MalformedContainer(format!(
                    "directory id {sid} out of range"
                )));
            }
            if self.entries[idx].is_some() {
                // Already parsed; a cycle in the sibling links
                continue;
            }

            let offset = idx * DIRENTRY_SIZE;
            let entry = self.parse_entry(&dir_data[offset..offset + DIRENTRY_SIZE], sid)?;
            pending.push(entry.sid_left);
            pending.push(entry.sid_right);
            pending.push(entry.sid_child);
            self.entries[idx] = Some(entry);
        }
        Ok(())
    }

    fn read_sector(&mut self, sector_id: u32) -> Result<Vec<u8>> {
        let position = (sector_id as u64 + 1) * self.sector_size as u64;
        self.reader.seek(SeekFrom::Start(position))?;
        let mut buffer = vec![0u8; self.sector_size];
        self.reader.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Read a whole chain out of the FAT, sector-granular (not truncated).
    fn read_fat_chain(&mut self, start_sector: u32) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        let mut sector = start_sector;
        let mut hops = 0usize;
        while sector != ENDOFCHAIN {
            if sector > MAXREGSECT || sector as usize >= self.fat.len() {
                return Err(CfbError::MalformedContainer(format!(
                    "FAT chain references invalid sector {sector}"
                )));
            }
            if hops > self.fat.len() {
                return Err(CfbError::MalformedContainer("FAT chain cycle".into()));
            }
            let chunk = self.read_sector(sector)?;
            data.extend_from_slice(&chunk);
            sector = self.fat[sector as usize];
            hops += 1;
        }
        Ok(data)
    }

    /// Read a small stream out of the mini stream, truncated to `size`.
    fn read_mini_chain(&mut self, start_sector: u32, size: u64) -> Result<Vec<u8>> {
        if self.ministream.is_none() {
            let (start, container_size) = match self.root {
                Some(ref root) => (root.start_sector, root.size),
                None => return Err(CfbError::MalformedContainer("no root entry".into())),
            };
            let container = if container_size == 0 {
                Vec::new()
            } else {
                self.read_fat_chain(start)?
            };
            self.ministream = Some(container);
        }
        let ministream = self.ministream.as_ref().unwrap();

        let mut data = Vec::new();
        let mut sector = start_sector;
        let mut hops = 0usize;
        while sector != ENDOFCHAIN {
            if sector as usize >= self.minifat.len() {
                return Err(CfbError::MalformedContainer(format!(
                    "MiniFAT chain references invalid mini sector {sector}"
                )));
            }
            if hops > self.minifat.len() {
                return Err(CfbError::MalformedContainer("MiniFAT chain cycle".into()));
            }
            let position = sector as usize * self.mini_sector_size;
            if position + self.mini_sector_size > ministream.len() {
                return Err(CfbError::MalformedContainer(
                    "mini sector beyond mini stream".into(),
                ));
            }
            data.extend_from_slice(&ministream[position..position + self.mini_sector_size]);
            sector = self.minifat[sector as usize];
            hops += 1;
        }

        data.truncate(size as usize);
        Ok(data)
    }

    /// All stream paths in the container, each as its storage components.
    pub fn list_streams(&self) -> Vec<Vec<String>> {
        let mut streams = Vec::new();
        if let Some(ref root) = self.root {
            self.collect_streams(root.sid_child, &mut streams);
        }
        streams
    }

    /// In-order traversal of the sibling trees, descending into storages.
    ///
    /// Iterative for the same reason as `parse_subtree`. An unexpanded
    /// frame stands for a whole subtree; expanding it pushes the right
    /// subtree, the node itself, and the left subtree, so streams come out
    /// in sibling order with storage contents in place.
    fn collect_streams(&self, sid: u32, out: &mut Vec<Vec<String>>) {
        let mut seen = vec![false; self.entries.len()];
        let mut stack: Vec<(u32, Vec<String>, bool)> = vec![(sid, Vec::new(), false)];
        while let Some((sid, prefix, expanded)) = stack.pop() {
            if sid == NOSTREAM || sid as usize >= self.entries.len() {
                continue;
            }
            let Some(ref entry) = self.entries[sid as usize] else {
                continue;
            };

            if expanded {
                let mut path = prefix;
                path.push(entry.name.clone());
                match entry.entry_type {
                    STGTY_STREAM => out.push(path),
                    STGTY_STORAGE => stack.push((entry.sid_child, path, false)),
                    _ => {}
                }
            } else {
                if seen[sid as usize] {
                    continue;
                }
                seen[sid as usize] = true;
                stack.push((entry.sid_right, prefix.clone(), false));
                stack.push((sid, prefix.clone(), true));
                stack.push((entry.sid_left, prefix, false));
            }
        }
    }

    /// Extract one stream's bytes by path.
    pub fn open_stream(&mut self, path: &[&str]) -> Result<Vec<u8>> {
        let entry = self.find_entry(path)?;
        if entry.entry_type != STGTY_STREAM {
            return Err(CfbError::MalformedContainer(format!(
                "{:?} is not a stream",
                path.join("/")
            )));
        }

        if entry.size == 0 {
            return Ok(Vec::new());
        }
        if entry.in_ministream {
            self.read_mini_chain(entry.start_sector, entry.size)
        } else {
            let mut data = self.read_fat_chain(entry.start_sector)?;
            data.truncate(entry.size as usize);
            Ok(data)
        }
    }

    /// Whether an entry (stream or storage) exists at the given path.
    pub fn exists(&self, path: &[&str]) -> bool {
        self.find_entry(path).is_ok()
    }

    fn find_entry(&self, path: &[&str]) -> Result<CfbEntry> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| CfbError::StreamNotFound(path.join("/")))?;
        if path.is_empty() {
            return Ok(root.clone());
        }

        let mut current = root.sid_child;
        for (i, &name) in path.iter().enumerate() {
            let entry = self
                .find_sibling(current, name)
                .ok_or_else(|| CfbError::StreamNotFound(path.join("/")))?;
            if i == path.len() - 1 {
                return Ok(entry);
            }
            current = entry.sid_child;
        }
        Err(CfbError::StreamNotFound(path.join("/")))
    }

    /// Case-insensitive name lookup within one sibling tree.
    fn find_sibling(&self, sid: u32, name: &str) -> Option<CfbEntry> {
        let mut seen = vec![false; self.entries.len()];
        let mut pending = vec![sid];
        while let Some(sid) = pending.pop() {
            if sid == NOSTREAM || sid as usize >= self.entries.len() {
                continue;
            }
            if seen[sid as usize] {
                continue;
            }
            seen[sid as usize] = true;
            let Some(ref entry) = self.entries[sid as usize] else {
                continue;
            };
            if entry.name.eq_ignore_ascii_case(name) {
                return Some(entry.clone());
            }
            pending.push(entry.sid_left);
            pending.push(entry.sid_right);
        }
        None
    }
}

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

fn decode_utf16le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
        .trim_end_matches('\0')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn rejects_short_input() {
        let err = CfbFile::open(Cursor::new(vec![0u8; 100])).unwrap_err();
        assert!(matches!(err, CfbError::MalformedContainer(_)));
    }

    #[test]
    fn rejects_bad_magic() {
        let err = CfbFile::open(Cursor::new(vec![0u8; 2048])).unwrap_err();
        assert!(matches!(err, CfbError::MalformedContainer(_)));
    }

    #[test]
    fn rejects_bad_byte_order() {
        let mut data = vec![0u8; 2048];
        data[0..8].copy_from_slice(MAGIC);
        // sane shifts, wrong byte-order mark
        data[0x1E] = 9;
        data[0x20] = 6;
        let err = CfbFile::open(Cursor::new(data)).unwrap_err();
        assert!(matches!(err, CfbError::MalformedContainer(_)));
    }

    #[test]
    fn rejects_unsupported_major_version() {
        // Version 5 with sector shift 0 would make every piece of sector
        // geometry below the header checks nonsensical
        let mut data = vec![0u8; 2048];
        data[0..8].copy_from_slice(MAGIC);
        data[0x1A..0x1C].copy_from_slice(&5u16.to_le_bytes());
        data[0x1C..0x1E].copy_from_slice(&0xFFFEu16.to_le_bytes());
        data[0x1E] = 0;
        data[0x20] = 6;
        // One DIFAT sector, so an accepted header would walk the DIFAT
        data[0x44..0x48].copy_from_slice(&0u32.to_le_bytes());
        data[0x48..0x4C].copy_from_slice(&1u32.to_le_bytes());

        let err = CfbFile::open(Cursor::new(data)).unwrap_err();
        assert!(matches!(err, CfbError::MalformedContainer(_)));
    }

    #[test]
    fn rejects_version_and_sector_size_mismatch() {
        let mut data = vec![0u8; 8192];
        data[0..8].copy_from_slice(MAGIC);
        data[0x1A..0x1C].copy_from_slice(&3u16.to_le_bytes());
        data[0x1C..0x1E].copy_from_slice(&0xFFFEu16.to_le_bytes());
        data[0x1E] = 12; // 4096-byte sectors under version 3
        data[0x20] = 6;

        let err = CfbFile::open(Cursor::new(data)).unwrap_err();
        assert!(matches!(err, CfbError::MalformedContainer(_)));
    }

    #[test]
    fn deep_sibling_chain_does_not_exhaust_the_stack() {
        use crate::writer::ContainerBuilder;

        const N: usize = 20_000;
        let names: Vec<String> = (0..N).map(|i| format!("s{i:05}")).collect();
        let mut builder = ContainerBuilder::new();
        for name in &names {
            builder.insert(name, b"x");
        }
        let mut data = builder.build().unwrap();

        // Relink the balanced sibling tree into one long left-sibling
        // chain; the directory region starts right after the header with
        // the root at index 0 and the streams at 1..=N in sorted order
        let entry = |sid: usize| 512 + sid * DIRENTRY_SIZE;
        data[entry(0) + 76..entry(0) + 80].copy_from_slice(&1u32.to_le_bytes());
        for sid in 1..=N {
            let left = if sid < N { sid as u32 + 1 } else { NOSTREAM };
            data[entry(sid) + 68..entry(sid) + 72].copy_from_slice(&left.to_le_bytes());
            data[entry(sid) + 72..entry(sid) + 76].copy_from_slice(&NOSTREAM.to_le_bytes());
        }

        let mut cfb = CfbFile::open(Cursor::new(data)).unwrap();
        assert_eq!(cfb.list_streams().len(), N);
        assert_eq!(cfb.open_stream(&["s00000"]).unwrap(), b"x");
        assert_eq!(cfb.open_stream(&["s19999"]).unwrap(), b"x");
    }

    #[test]
    fn decodes_utf16_names() {
        assert_eq!(decode_utf16le(&[0x57, 0x00, 0x62, 0x00]), "Wb");
        assert_eq!(decode_utf16le(&[]), "");
    }
}
