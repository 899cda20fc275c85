#![forbid(unsafe_code)]

use rust_lzo::{LZOContext, LZOError};

use crate::error::{Error, Result};

////////////////////////////////////////////////////////////////////////////////

/// A one-shot block compressor that the chunk codec wraps.
pub trait RawCompressor {
    /// Worst-case output size for `len` bytes of input.
    fn max_compressed_len(&self, len: usize) -> usize;

    /// Compresses `src` into `dst`, returning the number of bytes produced.
    fn compress(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize>;

    /// Decompresses `src` into `dst`, returning the number of bytes produced.
    /// Never writes past the end of `dst`.
    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize>;
}

////////////////////////////////////////////////////////////////////////////////

/// LZO1X-1 backed by the `rust-lzo` port.
pub struct Lzo1x {
    context: LZOContext,
}

impl Lzo1x {
    pub fn new() -> Self {
        Self {
            context: LZOContext::new(),
        }
    }
}

impl Default for Lzo1x {
    fn default() -> Self {
        Self::new()
    }
}

impl RawCompressor for Lzo1x {
    fn max_compressed_len(&self, len: usize) -> usize {
        rust_lzo::worst_compress(len)
    }

    fn compress(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        let (out, status) = self.context.compress_to_slice(src, dst);
        if !matches!(status, LZOError::OK) {
            return Err(Error::Compression("lzo1x compression failed"));
        }
        Ok(out.len())
    }

    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        let (out, status) = LZOContext::decompress_to_slice(src, dst);
        if !matches!(status, LZOError::OK) {
            return Err(Error::Compression("lzo1x stream is corrupt"));
        }
        Ok(out.len())
    }
}

////////////////////////////////////////////////////////////////////////////////
