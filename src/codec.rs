#![forbid(unsafe_code)]

use crate::chunk::{ChunkHeader, ChunkType};
use crate::error::{Error, Result};
use crate::lzo::{Lzo1x, RawCompressor};

////////////////////////////////////////////////////////////////////////////////

/// Turns whole buffers into self-verifying compressed chunks and back.
pub struct ChunkCodec<C = Lzo1x, const INLINE_LENGTH: bool = true> {
    compressor: C,
}

pub type InlineChunkCodec = ChunkCodec<Lzo1x, true>;
pub type ExternalChunkCodec = ChunkCodec<Lzo1x, false>;

impl<const INLINE_LENGTH: bool> ChunkCodec<Lzo1x, INLINE_LENGTH> {
    pub fn new() -> Self {
        Self::with_compressor(Lzo1x::new())
    }
}

impl<const INLINE_LENGTH: bool> Default for ChunkCodec<Lzo1x, INLINE_LENGTH> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: RawCompressor, const INLINE_LENGTH: bool> ChunkCodec<C, INLINE_LENGTH> {
    pub fn with_compressor(compressor: C) -> Self {
        Self { compressor }
    }

    pub fn header_len(&self) -> usize {
        ChunkHeader::<INLINE_LENGTH>::LENGTH
    }

    /// Largest chunk `compress` can emit for `uncompressed_len` input bytes.
    pub fn max_chunk_len(&self, uncompressed_len: usize) -> usize {
        self.compressor.max_compressed_len(uncompressed_len) + self.header_len()
    }

    pub fn compress(&mut self, data: &[u8], out: &mut Vec<u8>) -> Result<()> {
        let uncompressed_length = u32::try_from(data.len()).map_err(|_| Error::ChunkTooLarge {
            len: data.len() as u64,
        })?;
        let header_len = self.header_len();

        out.clear();
        out.resize(self.max_chunk_len(data.len()), 0);
        let produced = self.compressor.compress(data, &mut out[header_len..])?;
        out.truncate(header_len + produced);

        ChunkHeader::<INLINE_LENGTH>::new(ChunkType::Lzo1x, uncompressed_length).write(out)
    }

    pub fn uncompress(&self, chunk: &[u8], out: &mut Vec<u8>) -> Result<()> {
        self.uncompress_bounded(chunk, out, usize::MAX)
    }

    /// Like `uncompress`, but refuses chunks that declare more than
    /// `max_len` uncompressed bytes before allocating for them.
    pub fn uncompress_bounded(
        &self,
        chunk: &[u8],
        out: &mut Vec<u8>,
        max_len: usize,
    ) -> Result<()> {
        let mut header = ChunkHeader::<INLINE_LENGTH>::default();
        let payload = header.read(chunk)?;
        if header.uncompressed_length as usize > max_len {
            return Err(Error::ChunkTooLarge {
                len: header.uncompressed_length.into(),
            });
        }

        out.clear();
        out.resize(header.uncompressed_length as usize, 0);
        if header.chunk_type != ChunkType::Lzo1x {
            return Err(Error::UnsupportedType {
                tag: header.chunk_type.into(),
            });
        }

        let produced = self.compressor.decompress(payload, out)?;
        if produced != out.len() {
            return Err(Error::LengthMismatch {
                expected: out.len() as u64,
                actual: produced as u64,
            });
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////
