#![forbid(unsafe_code)]

//! The pkzip local file header, as far as a single streamed entry needs it.

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{Error, Result};

////////////////////////////////////////////////////////////////////////////////

pub const MAGIC: [u8; 4] = *b"PK\x03\x04";

/// Size of the fixed record that follows the magic.
pub const RECORD_LENGTH: usize = 26;

pub const METHOD_STORED: u16 = 0;
pub const METHOD_DEFLATE: u16 = 8;

const FLAG_ENCRYPTED: u16 = 1 << 0;
const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;

const ZIP64_SIZE: u32 = u32::MAX;

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocalFileHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub modification_time: u16,
    pub modification_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub filename_length: u16,
    pub extra_field_length: u16,
}

impl LocalFileHeader {
    /// Parses the fixed record (everything after the magic).
    pub fn parse(record: &[u8; RECORD_LENGTH]) -> Result<Self> {
        let mut rdr = &record[..];
        Ok(Self {
            version_needed: rdr.read_u16::<LittleEndian>()?,
            flags: rdr.read_u16::<LittleEndian>()?,
            compression_method: rdr.read_u16::<LittleEndian>()?,
            modification_time: rdr.read_u16::<LittleEndian>()?,
            modification_date: rdr.read_u16::<LittleEndian>()?,
            crc32: rdr.read_u32::<LittleEndian>()?,
            compressed_size: rdr.read_u32::<LittleEndian>()?,
            uncompressed_size: rdr.read_u32::<LittleEndian>()?,
            filename_length: rdr.read_u16::<LittleEndian>()?,
            extra_field_length: rdr.read_u16::<LittleEndian>()?,
        })
    }

    /// Checks that the entry can be inflated without seeing anything past it.
    pub fn validate_streamable(&self) -> Result<()> {
        if self.flags & FLAG_ENCRYPTED != 0 {
            return Err(Error::Encrypted);
        }
        if self.flags & FLAG_DATA_DESCRIPTOR != 0
            || self.compressed_size == ZIP64_SIZE
            || self.uncompressed_size == ZIP64_SIZE
        {
            return Err(Error::NotStreamable);
        }
        match self.compression_method {
            METHOD_DEFLATE => Ok(()),
            METHOD_STORED if self.is_empty() => Ok(()),
            method => Err(Error::UnsupportedCompression { method }),
        }
    }

    /// Bytes between the fixed record and the compressed data.
    pub fn variable_length(&self) -> usize {
        self.filename_length as usize + self.extra_field_length as usize
    }

    pub fn is_empty(&self) -> bool {
        self.compressed_size == 0
    }
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn record(flags: u16, method: u16, compressed: u32) -> [u8; RECORD_LENGTH] {
        let mut out = [0u8; RECORD_LENGTH];
        out[0..2].copy_from_slice(&20u16.to_le_bytes());
        out[2..4].copy_from_slice(&flags.to_le_bytes());
        out[4..6].copy_from_slice(&method.to_le_bytes());
        out[10..14].copy_from_slice(&0x1237_bd2fu32.to_le_bytes());
        out[14..18].copy_from_slice(&compressed.to_le_bytes());
        out[18..22].copy_from_slice(&16u32.to_le_bytes());
        out[22..24].copy_from_slice(&8u16.to_le_bytes());
        out[24..26].copy_from_slice(&3u16.to_le_bytes());
        out
    }

    #[test]
    fn parse_fields() -> Result<()> {
        let header = LocalFileHeader::parse(&record(0, METHOD_DEFLATE, 8))?;
        assert_eq!(header.version_needed, 20);
        assert_eq!(header.compression_method, METHOD_DEFLATE);
        assert_eq!(header.crc32, 0x1237_bd2f);
        assert_eq!(header.compressed_size, 8);
        assert_eq!(header.uncompressed_size, 16);
        assert_eq!(header.variable_length(), 11);
        header.validate_streamable()?;
        Ok(())
    }

    #[test]
    fn data_descriptor_is_not_streamable() -> Result<()> {
        let header = LocalFileHeader::parse(&record(FLAG_DATA_DESCRIPTOR, METHOD_DEFLATE, 0))?;
        assert!(matches!(
            header.validate_streamable(),
            Err(Error::NotStreamable)
        ));
        let header = LocalFileHeader::parse(&record(0, METHOD_DEFLATE, ZIP64_SIZE))?;
        assert!(matches!(
            header.validate_streamable(),
            Err(Error::NotStreamable)
        ));
        Ok(())
    }

    #[test]
    fn encrypted() -> Result<()> {
        let header = LocalFileHeader::parse(&record(FLAG_ENCRYPTED, METHOD_DEFLATE, 8))?;
        assert!(matches!(header.validate_streamable(), Err(Error::Encrypted)));
        Ok(())
    }

    #[test]
    fn methods() -> Result<()> {
        let header = LocalFileHeader::parse(&record(0, METHOD_STORED, 0))?;
        header.validate_streamable()?;

        let header = LocalFileHeader::parse(&record(0, METHOD_STORED, 16))?;
        assert!(matches!(
            header.validate_streamable(),
            Err(Error::UnsupportedCompression { method: 0 })
        ));

        let header = LocalFileHeader::parse(&record(0, 14, 16))?;
        assert!(matches!(
            header.validate_streamable(),
            Err(Error::UnsupportedCompression { method: 14 })
        ));
        Ok(())
    }
}
