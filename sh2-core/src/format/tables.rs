//! Decoders for the first two index tables.
//!
//! Each table is a run of fixed-size records closed by a sentinel. The decoders are
//! pull-based iterators over a [`BinaryCursor`]; once the sentinel is reached the
//! cursor is left sitting on it, so the caller can skip the gap to the next table.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek};

use crate::error::{IndexError, Result};

use super::cursor::BinaryCursor;
use super::records::{DataChunkEntry, EntryTag, MergeFileEntry, PathPairEntry};

/// Iterator over table 1.
pub struct PathPairs<'c, R> {
    cursor: &'c mut BinaryCursor<R>,
    seen: HashSet<u32>,
    done: bool,
}

impl<'c, R: Read + Seek> PathPairs<'c, R> {
    pub fn new(cursor: &'c mut BinaryCursor<R>) -> Self {
        Self { cursor, seen: HashSet::new(), done: false }
    }

    fn advance(&mut self) -> Result<Option<PathPairEntry>> {
        let offset = self.cursor.current_offset()?;
        let entry: PathPairEntry = self.cursor.read_fixed()?;

        if entry.is_sentinel() {
            self.cursor.rewind(PathPairEntry::SIZE)?;
            return Ok(None);
        }

        if !self.seen.insert(entry.file_address) {
            return Err(IndexError::DuplicateKey { address: entry.file_address, offset });
        }

        Ok(Some(entry))
    }
}

impl<R: Read + Seek> Iterator for PathPairs<'_, R> {
    type Item = Result<PathPairEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.advance().transpose();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

/// Read table 1 up to (not including) its all-zero terminator.
pub fn decode_path_pairs<R: Read + Seek>(cursor: &mut BinaryCursor<R>) -> Result<Vec<PathPairEntry>> {
    PathPairs::new(cursor).collect()
}

/// A decoded table 2 record, without its tag word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypedEntry {
    BinaryFile(MergeFileEntry),
    MergeFile(MergeFileEntry),
    DataChunk(DataChunkEntry),
}

/// Iterator over table 2, yielding each record with the absolute offset of its tag.
pub struct TypedEntries<'c, R> {
    cursor: &'c mut BinaryCursor<R>,
    done: bool,
}

impl<'c, R: Read + Seek> TypedEntries<'c, R> {
    pub fn new(cursor: &'c mut BinaryCursor<R>) -> Self {
        Self { cursor, done: false }
    }

    fn advance(&mut self) -> Result<Option<(u32, TypedEntry)>> {
        let address = self.cursor.current_offset()?;
        let raw: u32 = self.cursor.read_fixed()?;

        let entry = match EntryTag::from_raw(raw) {
            Some(EntryTag::Eof) => {
                self.cursor.rewind(EntryTag::SIZE)?;
                return Ok(None);
            }
            Some(EntryTag::BinaryFile) => TypedEntry::BinaryFile(self.cursor.read_fixed()?),
            Some(EntryTag::MergeFile) => TypedEntry::MergeFile(self.cursor.read_fixed()?),
            Some(EntryTag::DataChunk) => TypedEntry::DataChunk(self.cursor.read_fixed()?),
            None => return Err(IndexError::UnknownEntryTag { tag: raw, offset: address }),
        };

        Ok(Some((address, entry)))
    }
}

impl<R: Read + Seek> Iterator for TypedEntries<'_, R> {
    type Item = Result<(u32, TypedEntry)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.advance().transpose();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

/// Table 2 split by record kind, keyed by the absolute offset of each record's tag.
#[derive(Debug, Clone, Default)]
pub struct EntryTables {
    pub binary_files: HashMap<u32, MergeFileEntry>,
    pub merge_files: HashMap<u32, MergeFileEntry>,
    pub data_chunks: HashMap<u32, DataChunkEntry>,
}

impl EntryTables {
    pub fn len(&self) -> usize {
        self.binary_files.len() + self.merge_files.len() + self.data_chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read table 2 up to its `EOF` tag.
pub fn decode_typed_entries<R: Read + Seek>(cursor: &mut BinaryCursor<R>) -> Result<EntryTables> {
    let mut tables = EntryTables::default();

    for item in TypedEntries::new(cursor) {
        let (address, entry) = item?;
        match entry {
            TypedEntry::BinaryFile(e) => {
                tables.binary_files.insert(address, e);
            }
            TypedEntry::MergeFile(e) => {
                tables.merge_files.insert(address, e);
            }
            TypedEntry::DataChunk(e) => {
                tables.data_chunks.insert(address, e);
            }
        }
    }

    Ok(tables)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use super::*;

    fn words(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn path_pairs_stop_at_sentinel() {
        let bytes = words(&[0x10, 0x20, 0x30, 0x40, 0x50, 0x60, 0, 0, 0xAA, 0xBB]);
        let mut cursor = BinaryCursor::new(Cursor::new(bytes));

        let pairs = decode_path_pairs(&mut cursor).unwrap();
        assert_eq!(
            pairs,
            vec![
                PathPairEntry { file_address: 0x10, path_address: 0x20 },
                PathPairEntry { file_address: 0x30, path_address: 0x40 },
                PathPairEntry { file_address: 0x50, path_address: 0x60 },
            ]
        );
        // sitting on the sentinel
        assert_eq!(cursor.current_offset().unwrap(), 24);
    }

    #[test]
    fn path_pairs_with_only_a_sentinel() {
        let mut cursor = BinaryCursor::new(Cursor::new(words(&[0, 0])));
        assert!(decode_path_pairs(&mut cursor).unwrap().is_empty());
        assert_eq!(cursor.current_offset().unwrap(), 0);
    }

    #[test]
    fn path_pair_half_zero_is_not_a_sentinel() {
        let bytes = words(&[0, 0x20, 0x30, 0, 0, 0]);
        let mut cursor = BinaryCursor::new(Cursor::new(bytes));
        assert_eq!(decode_path_pairs(&mut cursor).unwrap().len(), 2);
    }

    #[test]
    fn path_pairs_without_sentinel_are_truncated() {
        let mut cursor = BinaryCursor::new(Cursor::new(words(&[0x10, 0x20, 0x30])));
        assert!(matches!(
            decode_path_pairs(&mut cursor),
            Err(IndexError::TruncatedInput { offset: 8, needed: 8 })
        ));
    }

    #[test]
    fn duplicate_file_address_is_rejected() {
        let bytes = words(&[0x10, 0x20, 0x30, 0x40, 0x10, 0x99, 0, 0]);
        let mut cursor = BinaryCursor::new(Cursor::new(bytes));
        match decode_path_pairs(&mut cursor) {
            Err(IndexError::DuplicateKey { address: 0x10, offset: 16 }) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn path_pair_iterator_is_fused_after_error() {
        let bytes = words(&[0x10, 0x20, 0x10, 0x20, 0x30, 0x40, 0, 0]);
        let mut cursor = BinaryCursor::new(Cursor::new(bytes));
        let mut pairs = PathPairs::new(&mut cursor);
        assert!(matches!(pairs.next(), Some(Ok(_))));
        assert!(matches!(pairs.next(), Some(Err(IndexError::DuplicateKey { .. }))));
        assert!(pairs.next().is_none());
    }

    #[test]
    fn typed_entries_are_keyed_by_tag_offset() {
        let mut bytes = vec![0u8; 0x20];
        bytes.extend(words(&[0x23, 0x1000, 0, 0]));
        bytes.extend(words(&[0x50, 0x1020, 0x800, 0x100]));
        bytes.extend(words(&[0x03, 0x2000, 0, 0]));
        bytes.extend(words(&[0x00]));

        let mut cursor = BinaryCursor::at(Cursor::new(bytes), 0x20).unwrap();
        let tables = decode_typed_entries(&mut cursor).unwrap();

        assert_eq!(tables.len(), 3);
        assert_eq!(
            tables.merge_files.get(&0x20),
            Some(&MergeFileEntry { path_address: 0x1000, reserved1: 0, reserved2: 0 })
        );
        assert_eq!(
            tables.data_chunks.get(&0x30),
            Some(&DataChunkEntry { parent_address: 0x1020, chunk_offset: 0x800, chunk_length: 0x100 })
        );
        assert_eq!(
            tables.binary_files.get(&0x40),
            Some(&MergeFileEntry { path_address: 0x2000, reserved1: 0, reserved2: 0 })
        );
        // sitting on the EOF tag
        assert_eq!(cursor.current_offset().unwrap(), 0x50);
    }

    #[test]
    fn unknown_tag_aborts() {
        let mut bytes = words(&[0x23, 0x1000, 0, 0]);
        bytes.extend(words(&[0x99, 1, 2, 3]));
        bytes.extend(words(&[0x00]));

        let mut cursor = BinaryCursor::new(Cursor::new(bytes));
        match decode_typed_entries(&mut cursor) {
            Err(IndexError::UnknownEntryTag { tag: 0x99, offset: 16 }) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn truncated_record_aborts() {
        let bytes = words(&[0x50, 0x1000, 0x10]);
        let mut cursor = BinaryCursor::new(Cursor::new(bytes));
        assert!(matches!(
            decode_typed_entries(&mut cursor),
            Err(IndexError::TruncatedInput { offset: 4, needed: 12 })
        ));
    }
}
