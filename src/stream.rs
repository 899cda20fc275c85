#![forbid(unsafe_code)]

//! Chunk streams: a Start chunk, any number of LZO1X chunks, a Stop chunk.
//!
//! Chunks use the inline-length variant so a reader can frame them by their
//! 4-byte length prefix.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;

use crate::chunk::InlineChunkHeader;
use crate::codec::InlineChunkCodec;
use crate::error::{Error, Result};

////////////////////////////////////////////////////////////////////////////////

pub const DEFAULT_BLOCK_SIZE: usize = 256 * 1024;
pub const DEFAULT_MAX_CHUNK_LEN: usize = 64 * 1024 * 1024;

////////////////////////////////////////////////////////////////////////////////

pub struct ChunkStreamWriter<W> {
    inner: W,
    codec: InlineChunkCodec,
    chunk: Vec<u8>,
    total: u64,
}

impl<W: Write> ChunkStreamWriter<W> {
    /// Writes the Start chunk. `total_hint` is the expected total length of
    /// all blocks, or 0 when unknown.
    pub fn new(mut inner: W, total_hint: u32) -> Result<Self> {
        inner.write_all(&InlineChunkHeader::make_start(total_hint)?)?;
        Ok(Self {
            inner,
            codec: InlineChunkCodec::new(),
            chunk: Vec::new(),
            total: 0,
        })
    }

    pub fn write_block(&mut self, data: &[u8]) -> Result<()> {
        self.codec.compress(data, &mut self.chunk)?;
        self.inner.write_all(&self.chunk)?;
        self.total += data.len() as u64;
        debug!("block of {} bytes -> chunk of {}", data.len(), self.chunk.len());
        Ok(())
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Writes the Stop chunk and hands back the inner writer.
    pub fn finish(mut self) -> Result<W> {
        self.inner.write_all(&InlineChunkHeader::make_stop()?)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

////////////////////////////////////////////////////////////////////////////////

pub struct ChunkStreamReader<R> {
    inner: R,
    codec: InlineChunkCodec,
    chunk: Vec<u8>,
    max_chunk_len: usize,
    total_hint: u32,
    total: u64,
    is_avail: bool,
}

impl<R: Read> ChunkStreamReader<R> {
    pub fn new(inner: R) -> Result<Self> {
        Self::with_max_chunk_len(inner, DEFAULT_MAX_CHUNK_LEN)
    }

    /// Reads the Start chunk. Chunks longer than `max_chunk_len`, or declaring
    /// more uncompressed bytes than that, are refused.
    pub fn with_max_chunk_len(inner: R, max_chunk_len: usize) -> Result<Self> {
        let mut reader = Self {
            inner,
            codec: InlineChunkCodec::new(),
            chunk: Vec::new(),
            max_chunk_len,
            total_hint: 0,
            total: 0,
            is_avail: true,
        };
        reader.read_chunk()?;
        let mut header = InlineChunkHeader::default();
        if !header.try_read_start(&reader.chunk) {
            return Err(Error::InvalidHeader("chunk stream does not open with a start chunk"));
        }
        reader.total_hint = header.uncompressed_length;
        debug!("chunk stream started, total hint {}", reader.total_hint);
        Ok(reader)
    }

    pub fn total_hint(&self) -> u32 {
        self.total_hint
    }

    pub fn next_block(&mut self) -> Option<Result<Vec<u8>>> {
        if !self.is_avail {
            return None;
        }
        match self.read_block() {
            Ok(Some(block)) => Some(Ok(block)),
            Ok(None) => None,
            Err(err) => {
                self.is_avail = false;
                Some(Err(err))
            }
        }
    }

    fn read_block(&mut self) -> Result<Option<Vec<u8>>> {
        self.read_chunk()?;

        let mut header = InlineChunkHeader::default();
        if header.try_read_stop(&self.chunk) {
            self.is_avail = false;
            debug!("chunk stream stopped after {} bytes", self.total);
            if self.total_hint != 0 && u64::from(self.total_hint) != self.total {
                return Err(Error::LengthMismatch {
                    expected: self.total_hint.into(),
                    actual: self.total,
                });
            }
            return Ok(None);
        }

        let mut block = Vec::new();
        self.codec
            .uncompress_bounded(&self.chunk, &mut block, self.max_chunk_len)?;
        self.total += block.len() as u64;
        Ok(Some(block))
    }

    fn read_chunk(&mut self) -> Result<()> {
        let length = self.inner.read_u32::<LittleEndian>().map_err(eof_is_truncation)?;
        if length as usize > self.max_chunk_len {
            return Err(Error::ChunkTooLarge {
                len: length.into(),
            });
        }
        self.chunk.clear();
        self.chunk.extend_from_slice(&length.to_le_bytes());
        self.chunk.resize(4 + length as usize, 0);
        self.inner
            .read_exact(&mut self.chunk[4..])
            .map_err(eof_is_truncation)?;
        Ok(())
    }
}

impl<R: Read> Iterator for ChunkStreamReader<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_block()
    }
}

fn eof_is_truncation(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::IncompleteStream
    } else {
        err.into()
    }
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{ChunkType, NULL_CHUNK};
    use anyhow::Result;

    fn write_stream(blocks: &[&[u8]], total_hint: u32) -> Result<Vec<u8>> {
        let mut writer = ChunkStreamWriter::new(Vec::new(), total_hint)?;
        for block in blocks {
            writer.write_block(block)?;
        }
        Ok(writer.finish()?)
    }

    #[test]
    fn blocks_come_back() -> Result<()> {
        let blocks: [&[u8]; 3] = [b"first block", &[0u8; 5000], b"last"];
        let stream = write_stream(&blocks, 5015)?;

        let mut reader = ChunkStreamReader::new(stream.as_slice())?;
        assert_eq!(reader.total_hint(), 5015);
        for block in blocks.iter() {
            assert_eq!(reader.next_block().transpose()?.as_deref(), Some(*block));
        }
        assert!(reader.next_block().is_none());
        assert!(reader.next_block().is_none());
        Ok(())
    }

    #[test]
    fn null_chunks_frame_a_stream() -> Result<()> {
        let mut stream = NULL_CHUNK.to_vec();
        let mut codec = InlineChunkCodec::new();
        let mut chunk = Vec::new();
        codec.compress(b"between nulls", &mut chunk)?;
        stream.extend_from_slice(&chunk);
        stream.extend_from_slice(&NULL_CHUNK);

        let reader = ChunkStreamReader::new(stream.as_slice())?;
        assert_eq!(reader.total_hint(), 0);
        let blocks = reader.collect::<std::result::Result<Vec<_>, _>>()?;
        assert_eq!(blocks, vec![b"between nulls".to_vec()]);
        Ok(())
    }

    #[test]
    fn wrong_total() -> Result<()> {
        let stream = write_stream(&[&b"12345"[..]], 6)?;
        let mut reader = ChunkStreamReader::new(stream.as_slice())?;
        assert!(reader.next_block().transpose()?.is_some());
        assert!(matches!(
            reader.next_block(),
            Some(Err(Error::LengthMismatch { .. }))
        ));
        assert!(reader.next_block().is_none());
        Ok(())
    }

    #[test]
    fn missing_start() -> Result<()> {
        let stream = write_stream(&[&b"abc"[..]], 3)?;
        let headless = &stream[InlineChunkHeader::LENGTH..];
        assert!(matches!(
            ChunkStreamReader::new(headless),
            Err(Error::InvalidHeader(_))
        ));
        Ok(())
    }

    #[test]
    fn truncated_stream() -> Result<()> {
        let stream = write_stream(&[&b"some data"[..], &b"more data"[..]], 0)?;
        let cut = &stream[..stream.len() - 3];
        let reader = ChunkStreamReader::new(cut)?;
        let result: std::result::Result<Vec<_>, _> = reader.collect();
        assert!(matches!(result, Err(Error::IncompleteStream)));
        Ok(())
    }

    #[test]
    fn oversized_chunk() -> Result<()> {
        let noise: Vec<u8> = (0..10000u32)
            .map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8)
            .collect();
        let stream = write_stream(&[noise.as_slice()], 0)?;
        let mut reader = ChunkStreamReader::with_max_chunk_len(stream.as_slice(), 1024)?;
        assert!(matches!(
            reader.next_block(),
            Some(Err(Error::ChunkTooLarge { .. }))
        ));
        Ok(())
    }

    #[test]
    fn oversized_declared_length() -> Result<()> {
        let payload = b"tiny";
        let mut chunk = vec![0u8; InlineChunkHeader::LENGTH];
        chunk.extend_from_slice(payload);
        InlineChunkHeader::new(ChunkType::Lzo1x, 200_000_000).write(&mut chunk)?;

        let mut stream = InlineChunkHeader::make_start(0)?;
        stream.extend_from_slice(&chunk);
        stream.extend_from_slice(&InlineChunkHeader::make_stop()?);

        let mut reader = ChunkStreamReader::with_max_chunk_len(stream.as_slice(), 64)?;
        assert!(matches!(
            reader.next_block(),
            Some(Err(Error::ChunkTooLarge { len: 200_000_000 }))
        ));
        assert!(reader.next_block().is_none());
        Ok(())
    }
}
