#![forbid(unsafe_code)]

//! Self-describing chunk header.
//!
//! Wire layout, all fields little-endian:
//!
//! ```text
//! 0..4    chunk_length          u32   bytes after this field (inline variant only)
//! 4..8    crc32                 u32   CRC-32 of every byte after this field
//! 8..12   chunk_type            i32   Stop=0, Uncompressed=1, Lzo1x=2, Start=-1
//! 12..16  uncompressed_length   u32
//! 16..    payload
//! ```
//!
//! The external-length variant drops the leading `chunk_length` field and
//! relies on the transport to frame chunks. A Null chunk is four zero bytes
//! and means the same as a Stop chunk.

use std::mem;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};

use crate::crc32;
use crate::error::{Error, Result};

////////////////////////////////////////////////////////////////////////////////

const LENGTH_FIELD: usize = mem::size_of::<u32>();

pub const NULL_CHUNK: [u8; LENGTH_FIELD] = [0; LENGTH_FIELD];

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum ChunkType {
    Start = -1,
    Stop = 0,
    /// Payload stored as is (`None` on the wire).
    Uncompressed = 1,
    Lzo1x = 2,
}

impl TryFrom<i32> for ChunkType {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        Ok(match value {
            -1 => ChunkType::Start,
            0 => ChunkType::Stop,
            1 => ChunkType::Uncompressed,
            2 => ChunkType::Lzo1x,
            tag => return Err(Error::UnsupportedType { tag }),
        })
    }
}

impl From<ChunkType> for i32 {
    fn from(ty: ChunkType) -> i32 {
        ty as i32
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Chunk header; `INLINE_LENGTH` selects whether the leading length field is
/// part of the chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkHeader<const INLINE_LENGTH: bool> {
    pub chunk_length: u32,
    pub crc32: u32,
    pub chunk_type: ChunkType,
    pub uncompressed_length: u32,
}

pub type InlineChunkHeader = ChunkHeader<true>;
pub type ExternalChunkHeader = ChunkHeader<false>;

impl<const INLINE_LENGTH: bool> Default for ChunkHeader<INLINE_LENGTH> {
    fn default() -> Self {
        Self::new(ChunkType::Stop, 0)
    }
}

impl<const INLINE_LENGTH: bool> ChunkHeader<INLINE_LENGTH> {
    /// Offset of the crc field.
    const CRC_OFFSET: usize = if INLINE_LENGTH { LENGTH_FIELD } else { 0 };
    /// Offset of the first byte covered by the crc.
    const BODY_OFFSET: usize = Self::CRC_OFFSET + 4;

    pub const LENGTH: usize = Self::BODY_OFFSET + 8;

    pub fn new(chunk_type: ChunkType, uncompressed_length: u32) -> Self {
        Self {
            chunk_length: 0,
            crc32: 0,
            chunk_type,
            uncompressed_length,
        }
    }

    pub fn header_len() -> usize {
        Self::LENGTH
    }

    /// Serializes the header into the head of `chunk`, whose tail already
    /// holds the payload. Fills in `chunk_length` and `crc32`.
    pub fn write(&mut self, chunk: &mut [u8]) -> Result<()> {
        if chunk.len() < Self::LENGTH {
            return Err(Error::TooShort {
                needed: Self::LENGTH,
                actual: chunk.len(),
            });
        }
        let total = u32::try_from(chunk.len()).map_err(|_| Error::ChunkTooLarge {
            len: chunk.len() as u64,
        })?;
        self.chunk_length = if INLINE_LENGTH {
            total - LENGTH_FIELD as u32
        } else {
            total
        };

        let body = Self::BODY_OFFSET;
        LittleEndian::write_i32(&mut chunk[body..body + 4], self.chunk_type.into());
        LittleEndian::write_u32(&mut chunk[body + 4..body + 8], self.uncompressed_length);
        self.crc32 = crc32::checksum(&chunk[body..]);

        if INLINE_LENGTH {
            LittleEndian::write_u32(&mut chunk[..LENGTH_FIELD], self.chunk_length);
        }
        LittleEndian::write_u32(&mut chunk[Self::CRC_OFFSET..body], self.crc32);
        Ok(())
    }

    /// Parses and verifies `chunk`, returning its payload.
    pub fn read<'a>(&mut self, chunk: &'a [u8]) -> Result<&'a [u8]> {
        if is_null_chunk(chunk) {
            *self = Self::default();
            return Ok(&[]);
        }
        if chunk.len() < Self::LENGTH {
            return Err(Error::TooShort {
                needed: Self::LENGTH,
                actual: chunk.len(),
            });
        }

        let mut rdr = chunk;
        let actual_length = if INLINE_LENGTH {
            self.chunk_length = rdr.read_u32::<LittleEndian>()?;
            chunk.len() - LENGTH_FIELD
        } else {
            self.chunk_length = chunk.len() as u32;
            chunk.len()
        };
        if self.chunk_length as usize != actual_length {
            return Err(Error::LengthMismatch {
                expected: self.chunk_length.into(),
                actual: actual_length as u64,
            });
        }

        self.crc32 = rdr.read_u32::<LittleEndian>()?;
        let computed = crc32::checksum(&chunk[Self::BODY_OFFSET..]);
        if computed != self.crc32 {
            return Err(Error::CrcMismatch {
                expected: self.crc32,
                computed,
            });
        }

        self.chunk_type = ChunkType::try_from(rdr.read_i32::<LittleEndian>()?)?;
        self.uncompressed_length = rdr.read_u32::<LittleEndian>()?;
        Ok(&chunk[Self::LENGTH..])
    }

    pub fn try_read(&mut self, chunk: &[u8]) -> bool {
        self.read(chunk).is_ok()
    }

    /// A Null chunk always matches.
    pub fn try_read_start(&mut self, chunk: &[u8]) -> bool {
        self.try_read_as(chunk, ChunkType::Start)
    }

    /// A Null chunk always matches.
    pub fn try_read_stop(&mut self, chunk: &[u8]) -> bool {
        self.try_read_as(chunk, ChunkType::Stop)
    }

    fn try_read_as(&mut self, chunk: &[u8], expected: ChunkType) -> bool {
        if is_null_chunk(chunk) {
            *self = Self::default();
            return true;
        }
        self.try_read(chunk) && self.chunk_type == expected
    }

    /// Builds a payload-less Start chunk carrying the total uncompressed length.
    pub fn make_start(total_uncompressed_length: u32) -> Result<Vec<u8>> {
        Self::make_marker(ChunkType::Start, total_uncompressed_length)
    }

    pub fn make_stop() -> Result<Vec<u8>> {
        Self::make_marker(ChunkType::Stop, 0)
    }

    fn make_marker(chunk_type: ChunkType, uncompressed_length: u32) -> Result<Vec<u8>> {
        let mut chunk = vec![0; Self::LENGTH];
        Self::new(chunk_type, uncompressed_length).write(&mut chunk)?;
        Ok(chunk)
    }
}

pub fn is_null_chunk(chunk: &[u8]) -> bool {
    chunk == NULL_CHUNK
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn data_chunk<const INLINE: bool>(payload: &[u8]) -> Result<Vec<u8>> {
        let mut chunk = vec![0; ChunkHeader::<INLINE>::LENGTH];
        chunk.extend_from_slice(payload);
        ChunkHeader::<INLINE>::new(ChunkType::Uncompressed, payload.len() as u32)
            .write(&mut chunk)?;
        Ok(chunk)
    }

    #[test]
    fn header_lengths() {
        assert_eq!(InlineChunkHeader::header_len(), 16);
        assert_eq!(ExternalChunkHeader::header_len(), 12);
    }

    #[test]
    fn inline_layout() -> Result<()> {
        let chunk = data_chunk::<true>(b"abc")?;
        assert_eq!(chunk.len(), 19);
        assert_eq!(&chunk[0..4], &15u32.to_le_bytes());
        assert_eq!(&chunk[4..8], &crc32::checksum(&chunk[8..]).to_le_bytes());
        assert_eq!(&chunk[8..12], &1i32.to_le_bytes());
        assert_eq!(&chunk[12..16], &3u32.to_le_bytes());
        assert_eq!(&chunk[16..], b"abc");
        Ok(())
    }

    #[test]
    fn read_back() -> Result<()> {
        let chunk = data_chunk::<true>(b"hello chunk")?;
        let mut header = InlineChunkHeader::default();
        assert_eq!(header.read(&chunk)?, b"hello chunk");
        assert_eq!(header.chunk_type, ChunkType::Uncompressed);
        assert_eq!(header.uncompressed_length, 11);
        assert_eq!(header.chunk_length as usize, chunk.len() - 4);

        let chunk = data_chunk::<false>(b"external")?;
        assert_eq!(chunk.len(), 12 + 8);
        let mut header = ExternalChunkHeader::default();
        assert_eq!(header.read(&chunk)?, b"external");
        assert_eq!(header.chunk_length as usize, chunk.len());
        Ok(())
    }

    #[test]
    fn write_too_short() {
        let mut buf = [0u8; 15];
        let err = InlineChunkHeader::new(ChunkType::Lzo1x, 0)
            .write(&mut buf)
            .unwrap_err();
        assert!(matches!(err, Error::TooShort { needed: 16, actual: 15 }));
    }

    #[test]
    fn read_too_short() {
        let mut header = InlineChunkHeader::default();
        assert!(matches!(
            header.read(&[1, 0, 0, 0, 0]),
            Err(Error::TooShort { .. })
        ));
    }

    #[test]
    fn length_mismatch() -> Result<()> {
        let mut chunk = data_chunk::<true>(b"payload")?;
        chunk.push(0);
        let mut header = InlineChunkHeader::default();
        assert!(matches!(
            header.read(&chunk),
            Err(Error::LengthMismatch { .. })
        ));
        Ok(())
    }

    fn flipped_bits_are_detected<const INLINE: bool>() -> Result<()> {
        let chunk = data_chunk::<INLINE>(b"integrity matters")?;
        let mut header = ChunkHeader::<INLINE>::default();
        for byte in ChunkHeader::<INLINE>::CRC_OFFSET..chunk.len() {
            for bit in 0..8 {
                let mut corrupt = chunk.clone();
                corrupt[byte] ^= 1 << bit;
                assert!(
                    matches!(header.read(&corrupt), Err(Error::CrcMismatch { .. })),
                    "flip at byte {} bit {} went unnoticed (inline length: {})",
                    byte,
                    bit,
                    INLINE
                );
            }
        }
        Ok(())
    }

    #[test]
    fn every_flipped_bit_is_detected() -> Result<()> {
        flipped_bits_are_detected::<true>()?;
        flipped_bits_are_detected::<false>()
    }

    #[test]
    fn unknown_type() -> Result<()> {
        let mut chunk = vec![0; InlineChunkHeader::LENGTH];
        InlineChunkHeader::new(ChunkType::Stop, 0).write(&mut chunk)?;
        LittleEndian::write_i32(&mut chunk[8..12], 7);
        let crc = crc32::checksum(&chunk[8..]);
        LittleEndian::write_u32(&mut chunk[4..8], crc);

        let mut header = InlineChunkHeader::default();
        assert!(matches!(
            header.read(&chunk),
            Err(Error::UnsupportedType { tag: 7 })
        ));
        Ok(())
    }

    #[test]
    fn null_chunk() -> Result<()> {
        let mut header = InlineChunkHeader::new(ChunkType::Lzo1x, 5);
        assert!(header.read(&NULL_CHUNK)?.is_empty());
        assert_eq!(header.chunk_type, ChunkType::Stop);
        assert!(header.try_read_start(&NULL_CHUNK));
        assert!(header.try_read_stop(&NULL_CHUNK));

        let mut header = ExternalChunkHeader::default();
        assert!(header.try_read_start(&NULL_CHUNK));
        assert!(header.try_read_stop(&NULL_CHUNK));
        Ok(())
    }

    #[test]
    fn start_and_stop_markers() -> Result<()> {
        let start = InlineChunkHeader::make_start(1234)?;
        let stop = InlineChunkHeader::make_stop()?;
        assert_eq!(start.len(), InlineChunkHeader::LENGTH);

        let mut header = InlineChunkHeader::default();
        assert!(header.try_read_start(&start));
        assert_eq!(header.uncompressed_length, 1234);
        assert!(!header.try_read_stop(&start));

        assert!(header.try_read_stop(&stop));
        assert!(!header.try_read_start(&stop));

        let data = data_chunk::<true>(b"x")?;
        assert!(header.try_read(&data));
        assert!(!header.try_read_start(&data));
        assert!(!header.try_read_stop(&data));
        Ok(())
    }

    #[test]
    fn probes_never_fail_loudly() {
        let mut header = ExternalChunkHeader::default();
        assert!(!header.try_read(b""));
        assert!(!header.try_read(b"garbage that is not a chunk"));
        assert!(!header.try_read_start(&[0, 0, 0]));
    }
}
