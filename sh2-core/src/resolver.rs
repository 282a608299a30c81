use std::collections::HashMap;
use std::io::{Read, Seek};

use crate::error::Result;
use crate::format::{
    decode_path_pairs, decode_string_pool, decode_typed_entries, BinaryCursor, DataChunkEntry,
    EntryTables, MergeFileEntry, PathPairEntry, PADDING_WORD,
};
use crate::profile::{TableGap, VersionProfile, DEFAULT_PARENT_STRIDE};

/// Summary of a decoded index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub path_pairs: usize,
    pub binary_files: usize,
    pub merge_files: usize,
    pub data_chunks: usize,
    pub paths: usize,
    /// Binary/merge file records whose reserved words are non-zero.
    pub reserved_warnings: usize,
    pub path_table_offset: u32,
    pub entry_table_offset: u32,
    pub string_pool_offset: u32,
    pub end_offset: u32,
}

/// The decoded index, with lookups by raw (stored) address.
///
/// Every table is keyed by absolute offset inside the executable. A raw address
/// taken from any record maps to that offset by subtracting the magic offset; a raw
/// address below the magic offset simply has no entry.
#[derive(Debug, Clone)]
pub struct IndexResolver {
    path_pairs: Vec<PathPairEntry>,
    binary_files: HashMap<u32, MergeFileEntry>,
    merge_files: HashMap<u32, MergeFileEntry>,
    data_chunks: HashMap<u32, DataChunkEntry>,
    paths: HashMap<u32, String>,
    magic_offset: u32,
    parent_stride: u32,
    stats: IndexStats,
}

impl IndexResolver {
    pub fn new(
        path_pairs: Vec<PathPairEntry>,
        tables: EntryTables,
        paths: HashMap<u32, String>,
        magic_offset: u32,
    ) -> Self {
        let EntryTables { binary_files, merge_files, data_chunks } = tables;

        let mut reserved_warnings = 0;
        for (kind, map) in [("binary file", &binary_files), ("merge file", &merge_files)] {
            for (address, entry) in map {
                if entry.has_reserved_bits() {
                    log::warn!("{} at 0x{:X} has non-zero reserved fields: {}", kind, address, entry);
                    reserved_warnings += 1;
                }
            }
        }

        let stats = IndexStats {
            path_pairs: path_pairs.len(),
            binary_files: binary_files.len(),
            merge_files: merge_files.len(),
            data_chunks: data_chunks.len(),
            paths: paths.len(),
            reserved_warnings,
            ..Default::default()
        };

        Self {
            path_pairs,
            binary_files,
            merge_files,
            data_chunks,
            paths,
            magic_offset,
            parent_stride: DEFAULT_PARENT_STRIDE,
            stats,
        }
    }

    pub fn with_parent_stride(mut self, stride: u32) -> Self {
        self.parent_stride = stride;
        self
    }

    /// Seek `reader` to the profile's data offset and decode all three tables.
    pub fn read<R: Read + Seek>(reader: R, profile: &VersionProfile) -> Result<Self> {
        let mut cursor = BinaryCursor::at(reader, profile.data_offset)?;
        Self::decode(&mut cursor, profile)
    }

    /// Decode all three tables starting at the cursor's current position.
    pub fn decode<R: Read + Seek>(cursor: &mut BinaryCursor<R>, profile: &VersionProfile) -> Result<Self> {
        let path_table_offset = cursor.current_offset()?;
        log::debug!("path table at 0x{:X}", path_table_offset);
        let path_pairs = decode_path_pairs(cursor)?;
        log::debug!("total path pairs: {}", path_pairs.len());

        skip_gap(cursor, profile.gap_after_path_pairs)?;

        let entry_table_offset = cursor.current_offset()?;
        log::debug!("entry table at 0x{:X}", entry_table_offset);
        let tables = decode_typed_entries(cursor)?;
        log::debug!(
            "total binary files: {}, merge files: {}, data chunks: {}",
            tables.binary_files.len(),
            tables.merge_files.len(),
            tables.data_chunks.len()
        );

        skip_gap(cursor, profile.gap_after_entries)?;

        let string_pool_offset = cursor.current_offset()?;
        log::debug!("string pool at 0x{:X}", string_pool_offset);
        let paths = decode_string_pool(cursor, profile.max_string_len)?;
        let end_offset = cursor.current_offset()?;
        log::debug!("total paths: {}, index ends at 0x{:X}", paths.len(), end_offset);

        let mut resolver = Self::new(path_pairs, tables, paths, profile.magic_offset)
            .with_parent_stride(profile.parent_stride);
        resolver.stats.path_table_offset = path_table_offset;
        resolver.stats.entry_table_offset = entry_table_offset;
        resolver.stats.string_pool_offset = string_pool_offset;
        resolver.stats.end_offset = end_offset;

        Ok(resolver)
    }

    #[inline]
    fn key(&self, raw: u32) -> Option<u32> {
        raw.checked_sub(self.magic_offset)
    }

    pub fn magic_offset(&self) -> u32 {
        self.magic_offset
    }

    pub fn parent_stride(&self) -> u32 {
        self.parent_stride
    }

    pub fn stats(&self) -> IndexStats {
        self.stats
    }

    /// Table 1 in on-disc order.
    pub fn path_pairs(&self) -> &[PathPairEntry] {
        &self.path_pairs
    }

    pub fn resolve_binary_file(&self, raw: u32) -> Option<MergeFileEntry> {
        self.binary_files.get(&self.key(raw)?).copied()
    }

    pub fn resolve_merge_file(&self, raw: u32) -> Option<MergeFileEntry> {
        self.merge_files.get(&self.key(raw)?).copied()
    }

    pub fn resolve_data_chunk(&self, raw: u32) -> Option<DataChunkEntry> {
        self.data_chunks.get(&self.key(raw)?).copied()
    }

    pub fn resolve_path(&self, raw: u32) -> Option<&str> {
        self.paths.get(&self.key(raw)?).map(String::as_str)
    }

    /// Find the merge file a chunk belongs to.
    ///
    /// The authoring tool never stored a plain parent pointer: it wrote the parent's
    /// address plus 0x10 for every sub-directory between the merge file and the
    /// chunk. Stepping back one stride at a time undoes that, stopping once the
    /// address falls below `lower_bound` (the start of the index).
    pub fn resolve_merge_file_for_chunk(&self, chunk: &DataChunkEntry, lower_bound: u32) -> Option<MergeFileEntry> {
        self.probe_merge_file(chunk.parent_address, lower_bound, self.parent_stride)
    }

    /// Backward probe from `raw` in steps of `stride`. A zero stride probes once.
    pub fn probe_merge_file(&self, raw: u32, lower_bound: u32, stride: u32) -> Option<MergeFileEntry> {
        let mut addr = raw;
        while addr >= lower_bound {
            if let Some(entry) = self.resolve_merge_file(addr) {
                return Some(entry);
            }
            if stride == 0 {
                break;
            }
            addr = addr.checked_sub(stride)?;
        }
        None
    }

    /// Guess the magic offset from the smallest path address in table 1 and the
    /// smallest string offset in the pool. Not always right.
    pub fn guess_magic_offset(&self) -> Option<u32> {
        let min_path_address = self.path_pairs.iter().map(|e| e.path_address).min()?;
        let min_string_offset = self.paths.keys().copied().min()?;
        Some(min_path_address.abs_diff(min_string_offset))
    }

    /// Merge files sorted by table offset.
    pub fn merge_files(&self) -> Vec<(u32, MergeFileEntry)> {
        sorted(&self.merge_files)
    }

    /// Binary files sorted by table offset.
    pub fn binary_files(&self) -> Vec<(u32, MergeFileEntry)> {
        sorted(&self.binary_files)
    }
}

fn sorted<V: Copy>(map: &HashMap<u32, V>) -> Vec<(u32, V)> {
    let mut entries: Vec<_> = map.iter().map(|(k, v)| (*k, *v)).collect();
    entries.sort_unstable_by_key(|(k, _)| *k);
    entries
}

fn skip_gap<R: Read + Seek>(cursor: &mut BinaryCursor<R>, gap: TableGap) -> Result<()> {
    match gap {
        TableGap::Scan { max_steps } => {
            let skipped = cursor.skip_zero_padding(max_steps, PADDING_WORD)?;
            log::debug!("skipped {} bytes", skipped);
        }
        TableGap::Fixed { bytes } => cursor.skip(bytes)?,
    }
    Ok(())
}
