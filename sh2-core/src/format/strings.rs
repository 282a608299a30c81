//! Table 3: the path string pool.

use std::collections::HashMap;
use std::io::{Read, Seek};

use crate::error::{IndexError, Result};

use super::cursor::BinaryCursor;

/// Longest run (terminator excluded) accepted before a string counts as runaway.
pub const DEFAULT_STRING_WINDOW: usize = 128;

#[inline]
fn is_printable(b: u8) -> bool {
    (0x20..0x7F).contains(&b)
}

/// Iterator over the pool, yielding `(absolute offset, string)` pairs.
///
/// NUL padding between strings is skipped. The pool ends at the first byte outside
/// the printable ASCII range, or at the end of input.
pub struct PoolStrings<'c, R> {
    cursor: &'c mut BinaryCursor<R>,
    window: usize,
    done: bool,
}

impl<'c, R: Read + Seek> PoolStrings<'c, R> {
    pub fn new(cursor: &'c mut BinaryCursor<R>, window: usize) -> Self {
        Self { cursor, window, done: false }
    }

    fn advance(&mut self) -> Result<Option<(u32, String)>> {
        let mut start = 0;
        let mut text = Vec::new();

        loop {
            let offset = self.cursor.current_offset()?;
            let Some(b) = self.cursor.read_byte()? else {
                // an unterminated string is not an entry
                return Ok(None);
            };

            match b {
                0 if text.is_empty() => continue,
                0 => return Ok(Some((start, to_ascii(text)))),
                b if is_printable(b) => {
                    if text.is_empty() {
                        start = offset;
                    }
                    text.push(b);
                    if text.len() >= self.window {
                        return Err(IndexError::StringTooLong { offset: start, limit: self.window });
                    }
                }
                _ => {
                    log::trace!("string pool ends at 0x{:X} (byte 0x{:02X})", offset, b);
                    self.cursor.rewind(1)?;
                    return Ok(None);
                }
            }
        }
    }
}

impl<R: Read + Seek> Iterator for PoolStrings<'_, R> {
    type Item = Result<(u32, String)>;

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

fn to_ascii(bytes: Vec<u8>) -> String {
    bytes.into_iter().map(char::from).collect()
}

/// Read the whole pool, keyed by the absolute offset of each string's first byte.
pub fn decode_string_pool<R: Read + Seek>(
    cursor: &mut BinaryCursor<R>,
    window: usize,
) -> Result<HashMap<u32, String>> {
    PoolStrings::new(cursor, window).collect()
}
