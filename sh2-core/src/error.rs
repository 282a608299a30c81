use std::io;

/// Errors raised while decoding the index tables.
///
/// Every variant is fatal for the decode: a half-built index is never handed out.
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    #[error("truncated input: needed {needed} bytes at 0x{offset:X}")]
    TruncatedInput { offset: u32, needed: usize },

    #[error("no table data found within {max_steps} steps of 0x{offset:X}")]
    GapTooLarge { offset: u32, max_steps: usize },

    #[error("unknown entry tag 0x{tag:X} at 0x{offset:X}")]
    UnknownEntryTag { tag: u32, offset: u32 },

    #[error("string at 0x{offset:X} is not terminated within {limit} bytes")]
    StringTooLong { offset: u32, limit: usize },

    #[error("duplicate file address 0x{address:X} in path table at 0x{offset:X}")]
    DuplicateKey { address: u32, offset: u32 },

    #[error("stream position 0x{position:X} does not fit in a 32-bit address")]
    OffsetOutOfRange { position: u64 },

    #[error("unable to query the stream position: {source}")]
    Position {
        #[source]
        source: io::Error,
    },

    #[error("i/o error at 0x{offset:X}: {source}")]
    Io {
        offset: u32,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, IndexError>;
