//! On-disc layout of the game's file index.
//!
//! The index lives inside the game executable as three tables laid out back to back,
//! separated by zero padding:
//! 1. path pairs: `(file address, path address)` records
//! 2. typed entries: binary files, merge files and the chunks stored inside merge files
//! 3. a pool of NUL-terminated path strings

mod cursor;
mod records;
mod strings;
mod tables;

pub use cursor::{BinaryCursor, PADDING_WORD};
pub use records::{DataChunkEntry, EntryTag, MergeFileEntry, PathPairEntry};
pub use strings::{decode_string_pool, PoolStrings, DEFAULT_STRING_WINDOW};
pub use tables::{decode_path_pairs, decode_typed_entries, EntryTables, PathPairs, TypedEntries, TypedEntry};
