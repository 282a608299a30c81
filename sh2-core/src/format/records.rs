use std::fmt;

use binrw::BinRead;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

/// Table 1 record: maps a file entry address to the address of its path string.
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathPairEntry {
    pub file_address: u32,
    pub path_address: u32,
}

impl PathPairEntry {
    pub const SIZE: u32 = 8;

    pub fn is_sentinel(&self) -> bool {
        self.file_address == 0 && self.path_address == 0
    }
}

impl fmt::Display for PathPairEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{file_address:0x{:X} path_address:0x{:X}}}",
            self.file_address, self.path_address
        )
    }
}

/// Discriminant written before every table 2 record.
#[derive(FromPrimitive, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EntryTag {
    Eof = 0x00,
    /// Loose files on the disc (GX/GY/GZ and friends)
    BinaryFile = 0x03,
    MergeFile = 0x23,
    /// A file living inside a merge file
    DataChunk = 0x50,
}

impl EntryTag {
    pub const SIZE: u32 = 4;

    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::from_u32(raw)
    }
}

/// Shared layout of binary file and merge file records.
///
/// The two trailing words have never been seen non-zero.
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MergeFileEntry {
    pub path_address: u32,
    pub reserved1: u32,
    pub reserved2: u32,
}

impl MergeFileEntry {
    pub fn has_reserved_bits(&self) -> bool {
        self.reserved1 != 0 || self.reserved2 != 0
    }
}

impl fmt::Display for MergeFileEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{path_address:0x{:X} reserved1:0x{:X} reserved2:0x{:X}}}",
            self.path_address, self.reserved1, self.reserved2
        )
    }
}

/// Where a file's bytes live inside its merge file.
///
/// `parent_address` points at the owning [`MergeFileEntry`] plus 0x10 for every
/// nested sub-directory, see [`crate::IndexResolver::resolve_merge_file_for_chunk`].
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataChunkEntry {
    pub parent_address: u32,
    pub chunk_offset: u32,
    pub chunk_length: u32,
}

impl DataChunkEntry {
    /// One past the last byte of the chunk.
    pub fn end(&self) -> u64 {
        self.chunk_offset as u64 + self.chunk_length as u64
    }
}

impl fmt::Display for DataChunkEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{parent_address:0x{:X} chunk_offset:0x{:X} chunk_length:0x{:X}}}",
            self.parent_address, self.chunk_offset, self.chunk_length
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tags() {
        assert_eq!(EntryTag::from_raw(0x00), Some(EntryTag::Eof));
        assert_eq!(EntryTag::from_raw(0x03), Some(EntryTag::BinaryFile));
        assert_eq!(EntryTag::from_raw(0x23), Some(EntryTag::MergeFile));
        assert_eq!(EntryTag::from_raw(0x50), Some(EntryTag::DataChunk));
        assert_eq!(EntryTag::from_raw(0x99), None);
    }

    #[test]
    fn chunk_end_does_not_overflow() {
        let chunk = DataChunkEntry {
            parent_address: 0,
            chunk_offset: u32::MAX,
            chunk_length: u32::MAX,
        };
        assert_eq!(chunk.end(), 2 * u32::MAX as u64);
    }

    #[test]
    fn display_uses_hex() {
        let entry = PathPairEntry { file_address: 0x3D0100, path_address: 0x3E4680 };
        assert_eq!(entry.to_string(), "{file_address:0x3D0100 path_address:0x3E4680}");
    }
}
