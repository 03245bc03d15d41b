//! Constants shared by the CFB reader and writer.
//!
//! All values come from the Microsoft Compound File Binary Format
//! specification (MS-CFB). The writer only ever emits version 3
//! containers (512-byte sectors); the reader accepts version 4 too.

/// Magic bytes at the start of every compound file
pub const MAGIC: &[u8; 8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1";

/// Minimal size of a version 3 compound file (header + 2 sectors)
pub const MINIMAL_FILE_SIZE: usize = 1536;

/// Sector size for version 3 containers (2^9)
pub const SECTOR_SIZE: usize = 512;

/// Mini sector size (2^6)
pub const MINI_SECTOR_SIZE: usize = 64;

/// Streams smaller than this live in the mini stream
pub const MINI_STREAM_CUTOFF: u32 = 4096;

/// Size of a packed directory entry in bytes
pub const DIRENTRY_SIZE: usize = 128;

/// FAT entries held by one 512-byte sector
pub const FAT_ENTRIES_PER_SECTOR: usize = 128;

/// FAT sector ids carried inline in the header
pub const HEADER_FAT_SLOTS: usize = 109;

/// FAT sector ids per DIFAT sector (last slot is the next-DIFAT pointer)
pub const DIFAT_IDS_PER_SECTOR: usize = 127;

/// Directory entry names are capped at 31 UTF-16 code units plus terminator
pub const MAX_NAME_UNITS: usize = 31;

/// Round budget for the FAT sector-count fixed point
pub const MAX_LAYOUT_ROUNDS: u32 = 10;

// Sector ids (from AAF specifications)
/// Maximum regular sector id
pub const MAXREGSECT: u32 = 0xFFFFFFFA; // -6
/// Denotes a DIFAT sector in the FAT
pub const DIFSECT: u32 = 0xFFFFFFFC; // -4
/// Denotes a FAT sector in the FAT
pub const FATSECT: u32 = 0xFFFFFFFD; // -3
/// End of a sector chain
pub const ENDOFCHAIN: u32 = 0xFFFFFFFE; // -2
/// Unallocated sector
pub const FREESECT: u32 = 0xFFFFFFFF; // -1

// Directory entry ids (from AAF specifications)
/// Maximum directory entry id
pub const MAXREGSID: u32 = 0xFFFFFFFA; // -6
/// Unallocated directory entry / absent sibling
pub const NOSTREAM: u32 = 0xFFFFFFFF; // -1

// Object types in storage (from AAF specifications)
/// Empty directory entry
pub const STGTY_EMPTY: u8 = 0;
/// Element is a storage object
pub const STGTY_STORAGE: u8 = 1;
/// Element is a stream object
pub const STGTY_STREAM: u8 = 2;
/// Element is a root storage
pub const STGTY_ROOT: u8 = 5;

// Directory tree node colours
pub const COLOR_RED: u8 = 0;
pub const COLOR_BLACK: u8 = 1;
