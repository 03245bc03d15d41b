//! Directory tree construction.
//!
//! Turns a flat set of `/`-separated stream paths into the 128-byte
//! directory entry list: one implicit storage per unique path prefix, one
//! stream entry per path, and the mandatory root at index 0. Sibling lists
//! are linked as balanced binary trees built by recursive midpoint over
//! the sorted entry ids.
//!
//! Sibling order here is plain sorted-id order (storages in sorted prefix
//! order, then streams in sorted path order), not the MS-CFB mandated
//! shorter-name-first UTF-16 ordering, and every node is written black.
//! Common readers (Excel, olefile, POI) accept this layout; a strictly
//! conforming validator might not.

use crate::consts::*;
use crate::error::{CfbError, Result};
use std::collections::{BTreeSet, HashMap};

/// One directory entry under construction.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    /// One of the `STGTY_*` values
    pub entry_type: u8,
    /// First sector; FAT space for regular streams and the root's mini
    /// stream container, MiniFAT space for small streams
    pub start_sector: u32,
    pub size: u64,
    pub color: u8,
    pub sid_left: u32,
    pub sid_right: u32,
    pub sid_child: u32,
}

impl DirEntry {
    fn new(name: String, entry_type: u8) -> Self {
        Self {
            name,
            entry_type,
            start_sector: ENDOFCHAIN,
            size: 0,
            color: COLOR_BLACK,
            sid_left: NOSTREAM,
            sid_right: NOSTREAM,
            sid_child: NOSTREAM,
        }
    }

    fn root() -> Self {
        Self::new("Root Entry".to_string(), STGTY_ROOT)
    }

    /// Pack into the 128-byte on-disk layout.
    pub fn to_bytes(&self) -> [u8; DIRENTRY_SIZE] {
        let mut data = [0u8; DIRENTRY_SIZE];

        let units: Vec<u16> = self.name.encode_utf16().collect();
        for (i, unit) in units.iter().enumerate() {
            data[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
        }
        // Name length in bytes including the null terminator
        let name_len = ((units.len() + 1) * 2) as u16;
        data[64..66].copy_from_slice(&name_len.to_le_bytes());

        data[66] = self.entry_type;
        data[67] = self.color;
        data[68..72].copy_from_slice(&self.sid_left.to_le_bytes());
        data[72..76].copy_from_slice(&self.sid_right.to_le_bytes());
        data[76..80].copy_from_slice(&self.sid_child.to_le_bytes());
        // CLSID, state bits, and timestamps stay zero
        data[116..120].copy_from_slice(&self.start_sector.to_le_bytes());
        data[120..128].copy_from_slice(&self.size.to_le_bytes());

        data
    }
}

/// The assembled directory: entries indexed by SID plus a path lookup.
#[derive(Debug)]
pub struct DirectoryTree {
    pub entries: Vec<DirEntry>,
    index: HashMap<String, u32>,
}

impl DirectoryTree {
    /// Build the full tree from the set of stream paths.
    ///
    /// Rejects names longer than 31 UTF-16 code units and paths that name
    /// both a stream and a storage; neither is recoverable by truncation.
    pub fn from_paths(paths: &[&str]) -> Result<Self> {
        for path in paths {
            for segment in path.split('/') {
                let units = segment.encode_utf16().count();
                if units > MAX_NAME_UNITS {
                    return Err(CfbError::NameTooLong {
                        name: segment.to_string(),
                        units,
                    });
                }
            }
        }

        // Every path segment except the last names a storage
        let mut storages = BTreeSet::new();
        for path in paths {
            let parts: Vec<&str> = path.split('/').collect();
            for i in 1..parts.len() {
                storages.insert(parts[..i].join("/"));
            }
        }

        let mut entries = vec![DirEntry::root()];
        let mut index = HashMap::new();

        for storage_path in &storages {
            if paths.contains(&storage_path.as_str()) {
                return Err(CfbError::ConflictingPath(storage_path.clone()));
            }
            let name = storage_path.rsplit('/').next().unwrap_or(storage_path);
            let sid = entries.len() as u32;
            entries.push(DirEntry::new(name.to_string(), STGTY_STORAGE));
            index.insert(storage_path.clone(), sid);
        }

        let mut sorted_paths: Vec<&str> = paths.to_vec();
        sorted_paths.sort_unstable();
        for path in sorted_paths {
            let name = path.rsplit('/').next().unwrap_or(path);
            let sid = entries.len() as u32;
            entries.push(DirEntry::new(name.to_string(), STGTY_STREAM));
            index.insert(path.to_string(), sid);
        }

        // Group entries under their parent: root for top-level paths,
        // the owning storage otherwise
        let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
        for (path, &sid) in &index {
            let parent_sid = match path.rfind('/') {
                Some(pos) => index[&path[..pos]],
                None => 0,
            };
            children.entry(parent_sid).or_default().push(sid);
        }

        for (&parent_sid, sids) in &mut children {
            sids.sort_unstable();
            let child = Self::link_siblings(&mut entries, sids);
            entries[parent_sid as usize].sid_child = child;
        }

        Ok(Self { entries, index })
    }

    /// Link one sibling group as a balanced binary tree and return its root.
    fn link_siblings(entries: &mut [DirEntry], sids: &[u32]) -> u32 {
        if sids.is_empty() {
            return NOSTREAM;
        }
        let mid = sids.len() / 2;
        let root = sids[mid];
        let left = Self::link_siblings(entries, &sids[..mid]);
        let right = Self::link_siblings(entries, &sids[mid + 1..]);
        entries[root as usize].sid_left = left;
        entries[root as usize].sid_right = right;
        root
    }

    /// SID of the entry at `path`. The path must have been passed to
    /// [`DirectoryTree::from_paths`].
    pub fn sid_of(&self, path: &str) -> u32 {
        self.index[path]
    }

    /// Serialize all entries in SID order (unpadded).
    pub fn serialize(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.entries.len() * DIRENTRY_SIZE);
        for entry in &self.entries {
            data.extend_from_slice(&entry.to_bytes());
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_first_entry() {
        let tree = DirectoryTree::from_paths(&["Workbook"]).unwrap();
        assert_eq!(tree.entries.len(), 2);
        assert_eq!(tree.entries[0].name, "Root Entry");
        assert_eq!(tree.entries[0].entry_type, STGTY_ROOT);
        assert_eq!(tree.entries[0].sid_child, tree.sid_of("Workbook"));
    }

    #[test]
    fn storages_created_from_prefixes() {
        let tree = DirectoryTree::from_paths(&[
            "_VBA_PROJECT_CUR/VBA/Module1",
            "_VBA_PROJECT_CUR/VBA/dir",
            "Workbook",
        ])
        .unwrap();

        // Root + 2 storages + 3 streams
        assert_eq!(tree.entries.len(), 6);
        let vba = &tree.entries[tree.sid_of("_VBA_PROJECT_CUR/VBA") as usize];
        assert_eq!(vba.entry_type, STGTY_STORAGE);
        assert_eq!(vba.name, "VBA");

        let module = &tree.entries[tree.sid_of("_VBA_PROJECT_CUR/VBA/Module1") as usize];
        assert_eq!(module.entry_type, STGTY_STREAM);
        assert_eq!(module.name, "Module1");
    }

    #[test]
    fn sibling_tree_is_balanced() {
        let tree = DirectoryTree::from_paths(&["A", "B", "C", "D", "E"]).unwrap();
        // Sorted sibling sids are 1..=5; midpoint 3 becomes root's child
        assert_eq!(tree.entries[0].sid_child, 3);
        assert_eq!(tree.entries[3].sid_left, 2);
        assert_eq!(tree.entries[3].sid_right, 5);
        assert_eq!(tree.entries[2].sid_left, 1);
        assert_eq!(tree.entries[5].sid_left, 4);
        assert_eq!(tree.entries[1].sid_left, NOSTREAM);
        assert_eq!(tree.entries[1].sid_right, NOSTREAM);
    }

    #[test]
    fn name_at_limit_accepted() {
        let name = "a".repeat(31);
        let tree = DirectoryTree::from_paths(&[name.as_str()]).unwrap();
        assert_eq!(tree.entries[1].name.len(), 31);
    }

    #[test]
    fn over_long_name_rejected() {
        let name = "a".repeat(32);
        let err = DirectoryTree::from_paths(&[name.as_str()]).unwrap_err();
        assert!(matches!(err, CfbError::NameTooLong { units: 32, .. }));
    }

    #[test]
    fn over_long_storage_name_rejected() {
        let path = format!("{}/Stream", "s".repeat(40));
        let err = DirectoryTree::from_paths(&[path.as_str()]).unwrap_err();
        assert!(matches!(err, CfbError::NameTooLong { units: 40, .. }));
    }

    #[test]
    fn stream_and_storage_collision_rejected() {
        let err = DirectoryTree::from_paths(&["A", "A/B"]).unwrap_err();
        assert!(matches!(err, CfbError::ConflictingPath(p) if p == "A"));
    }

    #[test]
    fn entry_packs_to_128_bytes() {
        let tree = DirectoryTree::from_paths(&["Workbook"]).unwrap();
        let bytes = tree.entries[1].to_bytes();
        assert_eq!(bytes.len(), 128);
        // "Workbook" is 8 units + null = 18 bytes
        assert_eq!(u16::from_le_bytes([bytes[64], bytes[65]]), 18);
        assert_eq!(bytes[0], b'W');
        assert_eq!(bytes[1], 0);
        assert_eq!(bytes[66], STGTY_STREAM);
        assert_eq!(bytes[67], COLOR_BLACK);
    }
}
