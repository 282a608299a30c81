use std::io::{self, ErrorKind, Read, Seek, SeekFrom};
use std::mem::size_of;

use binrw::{BinRead, Endian};
use byteorder::ReadBytesExt;

use crate::error::{IndexError, Result};

/// Word size used when stepping over the zero padding between tables.
pub const PADDING_WORD: usize = 8;

/// A seekable byte source that hands out absolute 32-bit offsets.
///
/// All multi-byte values in the index are little-endian.
#[derive(Debug)]
pub struct BinaryCursor<R> {
    inner: R,
}

impl<R: Read + Seek> BinaryCursor<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Wrap `inner` and seek it to `offset`.
    pub fn at(inner: R, offset: u32) -> Result<Self> {
        let mut cursor = Self::new(inner);
        cursor.seek_to(offset)?;
        Ok(cursor)
    }

    pub fn current_offset(&mut self) -> Result<u32> {
        let position = self
            .inner
            .stream_position()
            .map_err(|source| IndexError::Position { source })?;
        u32::try_from(position).map_err(|_| IndexError::OffsetOutOfRange { position })
    }

    pub fn seek_to(&mut self, offset: u32) -> Result<()> {
        self.inner
            .seek(SeekFrom::Start(offset as u64))
            .map_err(|source| IndexError::Io { offset, source })?;
        Ok(())
    }

    pub fn skip(&mut self, bytes: u32) -> Result<()> {
        self.seek_relative(bytes as i64)
    }

    pub fn rewind(&mut self, bytes: u32) -> Result<()> {
        self.seek_relative(-(bytes as i64))
    }

    fn seek_relative(&mut self, delta: i64) -> Result<()> {
        let offset = self.current_offset()?;
        self.inner
            .seek(SeekFrom::Current(delta))
            .map_err(|source| IndexError::Io { offset, source })?;
        Ok(())
    }

    /// Decode one little-endian record of fixed layout.
    pub fn read_fixed<T>(&mut self) -> Result<T>
    where
        T: for<'a> BinRead<Args<'a> = ()>,
    {
        let offset = self.current_offset()?;
        T::read_options(&mut self.inner, Endian::Little, ())
            .map_err(|err| read_error(err, offset, size_of::<T>()))
    }

    /// Read a single byte. End of input is `None`, not an error.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        match self.inner.read_u8() {
            Ok(b) => Ok(Some(b)),
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => Ok(None),
            Err(source) => Err(IndexError::Io {
                offset: self.current_offset()?,
                source,
            }),
        }
    }

    /// Step over zero words until the first non-zero one, leaving the cursor on it.
    ///
    /// Returns the number of bytes skipped.
    pub fn skip_zero_padding(&mut self, max_steps: usize, step: usize) -> Result<u32> {
        let start = self.current_offset()?;
        let mut word = vec![0u8; step];

        for i in 0..max_steps {
            let offset = self.current_offset()?;
            self.inner.read_exact(&mut word).map_err(|source| {
                if source.kind() == ErrorKind::UnexpectedEof {
                    IndexError::TruncatedInput { offset, needed: step }
                } else {
                    IndexError::Io { offset, source }
                }
            })?;

            if word.iter().any(|&b| b != 0) {
                self.rewind(step as u32)?;
                return Ok((i * step) as u32);
            }
        }

        Err(IndexError::GapTooLarge { offset: start, max_steps })
    }
}

fn read_error(err: binrw::Error, offset: u32, needed: usize) -> IndexError {
    if err.is_eof() {
        return IndexError::TruncatedInput { offset, needed };
    }
    match err {
        binrw::Error::Io(source) => IndexError::Io { offset, source },
        other => IndexError::Io {
            offset,
            source: io::Error::new(ErrorKind::InvalidData, other.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn read_fixed_is_little_endian() {
        let mut cursor = BinaryCursor::new(Cursor::new(vec![0x78, 0x56, 0x34, 0x12, 0xFF]));
        assert_eq!(cursor.read_fixed::<u32>().unwrap(), 0x1234_5678);
        assert_eq!(cursor.current_offset().unwrap(), 4);
    }

    #[test]
    fn read_fixed_reports_truncation() {
        let mut cursor = BinaryCursor::new(Cursor::new(vec![1, 2]));
        match cursor.read_fixed::<u32>() {
            Err(IndexError::TruncatedInput { offset: 0, needed: 4 }) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn read_byte_returns_none_at_end() {
        let mut cursor = BinaryCursor::new(Cursor::new(vec![0x41]));
        assert_eq!(cursor.read_byte().unwrap(), Some(0x41));
        assert_eq!(cursor.read_byte().unwrap(), None);
    }

    #[test]
    fn skip_zero_padding_stops_on_first_data_word() {
        let mut bytes = vec![0u8; 24];
        bytes.extend_from_slice(&[0, 0, 0, 7, 0, 0, 0, 0]);
        let mut cursor = BinaryCursor::new(Cursor::new(bytes));

        let skipped = cursor.skip_zero_padding(32, PADDING_WORD).unwrap();
        assert_eq!(skipped, 24);
        assert_eq!(cursor.current_offset().unwrap(), 24);
    }

    #[test]
    fn skip_zero_padding_does_not_move_when_already_on_data() {
        let mut cursor = BinaryCursor::new(Cursor::new(vec![1u8; 16]));
        assert_eq!(cursor.skip_zero_padding(4, PADDING_WORD).unwrap(), 0);
        assert_eq!(cursor.current_offset().unwrap(), 0);
    }

    #[test]
    fn skip_zero_padding_gives_up_after_max_steps() {
        let mut bytes = vec![0u8; 64];
        bytes.push(1);
        let mut cursor = BinaryCursor::new(Cursor::new(bytes));
        match cursor.skip_zero_padding(4, PADDING_WORD) {
            Err(IndexError::GapTooLarge { offset: 0, max_steps: 4 }) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn skip_zero_padding_hits_end_of_input() {
        let mut cursor = BinaryCursor::new(Cursor::new(vec![0u8; 12]));
        assert!(matches!(
            cursor.skip_zero_padding(8, PADDING_WORD),
            Err(IndexError::TruncatedInput { offset: 8, needed: 8 })
        ));
    }

    struct Unseekable;

    impl Read for Unseekable {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }
    }

    impl Seek for Unseekable {
        fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
            Err(io::Error::new(ErrorKind::Unsupported, "no seeking"))
        }
    }

    #[test]
    fn failed_position_query_claims_no_offset() {
        let mut cursor = BinaryCursor::new(Unseekable);
        let err = cursor.current_offset().unwrap_err();
        assert!(matches!(err, IndexError::Position { .. }), "{:?}", err);
        assert!(!err.to_string().contains("0x"));
    }
}
