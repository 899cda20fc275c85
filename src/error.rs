#![forbid(unsafe_code)]

use std::io;

use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Error)]
pub enum Error {
    #[error("buffer too short: need {needed} bytes, have {actual}")]
    TooShort { needed: usize, actual: usize },

    #[error("length mismatch: declared {expected}, actual {actual}")]
    LengthMismatch { expected: u64, actual: u64 },

    #[error("chunk crc mismatch: stored {expected:#010x}, computed {computed:#010x}")]
    CrcMismatch { expected: u32, computed: u32 },

    #[error("checksum mismatch: stored {expected:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { expected: u32, computed: u32 },

    #[error("unsupported chunk type {tag}")]
    UnsupportedType { tag: i32 },

    #[error("input is neither gzip nor pkzip")]
    UnsupportedFormat,

    #[error("pkzip entry has no inline crc/sizes (data descriptor or zip64)")]
    NotStreamable,

    #[error("pkzip entry is encrypted")]
    Encrypted,

    #[error("unsupported compression method {method}")]
    UnsupportedCompression { method: u16 },

    #[error("compressed stream ended prematurely")]
    IncompleteStream,

    #[error("inflate made no progress on its input")]
    InflateStalled,

    #[error("chunk of {len} bytes exceeds the allowed size")]
    ChunkTooLarge { len: u64 },

    #[error("invalid header: {0}")]
    InvalidHeader(&'static str),

    #[error("inflate failed: {0}")]
    Inflate(#[from] flate2::DecompressError),

    #[error("decompressor must be reset after an error")]
    NeedsReset,

    #[error("raw compression failed: {0}")]
    Compression(&'static str),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////
