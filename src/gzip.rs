#![forbid(unsafe_code)]

//! Gzip member header and footer (RFC 1952).

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::crc32;
use crate::error::{Error, Result};

////////////////////////////////////////////////////////////////////////////////

pub const ID1: u8 = 0x1f;
pub const ID2: u8 = 0x8b;
pub const MAGIC: [u8; 2] = [ID1, ID2];

pub const FOOTER_LENGTH: usize = 8;

/// Longest name or comment accepted, without the terminating zero.
pub const MAX_FIELD_LENGTH: usize = 64 * 1024;

/// No valid header is longer than this.
pub const MAX_HEADER_LENGTH: usize =
    FIXED_LENGTH + 2 + u16::MAX as usize + 2 * (MAX_FIELD_LENGTH + 1) + 2;

const FIXED_LENGTH: usize = 10;

const CM_DEFLATE: u8 = 8;

const FHCRC_OFFSET: u8 = 1;
const FEXTRA_OFFSET: u8 = 2;
const FNAME_OFFSET: u8 = 3;
const FCOMMENT_OFFSET: u8 = 4;
const RESERVED_MASK: u8 = 0xe0;

////////////////////////////////////////////////////////////////////////////////

#[derive(Debug)]
pub struct MemberHeader {
    pub compression_method: CompressionMethod,
    pub flags: MemberFlags,
    pub modification_time: u32,
    pub extra: Option<Vec<u8>>,
    pub name: Option<String>,
    pub comment: Option<String>,
    pub extra_flags: u8,
    pub os: u8,
}

#[derive(Debug)]
pub enum HeaderParse {
    /// The header and its encoded length.
    Complete(MemberHeader, usize),
    Incomplete(Needed),
}

/// What a partial header is waiting for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Needed {
    /// The buffer has to grow to at least this many bytes.
    Length(usize),
    /// A zero-terminated field is still open.
    Terminator,
}

impl MemberHeader {
    /// Parses a member header from the front of `buf`, which may hold only a
    /// prefix of it.
    pub fn parse(buf: &[u8]) -> Result<HeaderParse> {
        let mut rdr = buf;
        let need = |rdr: &[u8], n: usize| {
            let wanted = buf.len() - rdr.len() + n;
            (rdr.len() < n).then(|| HeaderParse::Incomplete(Needed::Length(wanted)))
        };

        if let Some(incomplete) = need(rdr, FIXED_LENGTH) {
            return Ok(incomplete);
        }
        let id1 = rdr.read_u8()?;
        let id2 = rdr.read_u8()?;
        if id1 != ID1 || id2 != ID2 {
            return Err(Error::InvalidHeader("wrong gzip id values"));
        }
        let cm = CompressionMethod::from(rdr.read_u8()?);
        if cm != CompressionMethod::Deflate {
            return Err(Error::UnsupportedCompression {
                method: u8::from(cm).into(),
            });
        }
        let flags = MemberFlags(rdr.read_u8()?);
        if flags.0 & RESERVED_MASK != 0 {
            return Err(Error::InvalidHeader("reserved gzip flags are set"));
        }
        let mtime = rdr.read_u32::<LittleEndian>()?;
        let xfl = rdr.read_u8()?;
        let os = rdr.read_u8()?;

        let extra = if flags.has_extra() {
            if let Some(incomplete) = need(rdr, 2) {
                return Ok(incomplete);
            }
            let len = rdr.read_u16::<LittleEndian>()? as usize;
            if let Some(incomplete) = need(rdr, len) {
                return Ok(incomplete);
            }
            let mut extra = vec![0; len];
            rdr.read_exact(&mut extra)?;
            Some(extra)
        } else {
            None
        };

        let name = if flags.has_name() {
            match read_zero_terminated(&mut rdr)? {
                Some(name) => Some(name),
                None => return Ok(HeaderParse::Incomplete(Needed::Terminator)),
            }
        } else {
            None
        };

        let comment = if flags.has_comment() {
            match read_zero_terminated(&mut rdr)? {
                Some(comment) => Some(comment),
                None => return Ok(HeaderParse::Incomplete(Needed::Terminator)),
            }
        } else {
            None
        };

        if flags.has_crc() {
            if let Some(incomplete) = need(rdr, 2) {
                return Ok(incomplete);
            }
            let covered = buf.len() - rdr.len();
            let crc = rdr.read_u16::<LittleEndian>()?;
            let computed = (crc32::checksum(&buf[..covered]) & 0xffff) as u16;
            if crc != computed {
                return Err(Error::ChecksumMismatch {
                    expected: crc.into(),
                    computed: computed.into(),
                });
            }
        }

        let header = MemberHeader {
            compression_method: cm,
            flags,
            modification_time: mtime,
            extra,
            name,
            comment,
            extra_flags: xfl,
            os,
        };
        Ok(HeaderParse::Complete(header, buf.len() - rdr.len()))
    }
}

/// `None` while the terminating zero has not arrived yet.
fn read_zero_terminated(rdr: &mut &[u8]) -> Result<Option<String>> {
    match rdr.iter().position(|&b| b == 0) {
        Some(end) if end <= MAX_FIELD_LENGTH => {
            // ISO 8859-1 on the wire.
            let field = rdr[..end].iter().map(|&b| b as char).collect();
            *rdr = &rdr[end + 1..];
            Ok(Some(field))
        }
        None if rdr.len() <= MAX_FIELD_LENGTH => Ok(None),
        _ => Err(Error::InvalidHeader("gzip header field is too long")),
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, Debug, PartialEq, Ord, PartialOrd, Eq)]
pub enum CompressionMethod {
    Deflate,
    Unknown(u8),
}

impl From<u8> for CompressionMethod {
    fn from(value: u8) -> Self {
        match value {
            CM_DEFLATE => Self::Deflate,
            x => Self::Unknown(x),
        }
    }
}

impl From<CompressionMethod> for u8 {
    fn from(method: CompressionMethod) -> u8 {
        match method {
            CompressionMethod::Deflate => CM_DEFLATE,
            CompressionMethod::Unknown(x) => x,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy)]
pub struct MemberFlags(u8);

impl MemberFlags {
    fn bit(&self, n: u8) -> bool {
        (self.0 >> n) & 1 != 0
    }

    pub fn has_crc(&self) -> bool {
        self.bit(FHCRC_OFFSET)
    }

    pub fn has_extra(&self) -> bool {
        self.bit(FEXTRA_OFFSET)
    }

    pub fn has_name(&self) -> bool {
        self.bit(FNAME_OFFSET)
    }

    pub fn has_comment(&self) -> bool {
        self.bit(FCOMMENT_OFFSET)
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Debug)]
pub struct MemberFooter {
    pub data_crc32: u32,
    pub data_size: u32,
}

impl MemberFooter {
    pub fn parse(buf: &[u8; FOOTER_LENGTH]) -> Result<Self> {
        let mut rdr = &buf[..];
        let data_crc32 = rdr.read_u32::<LittleEndian>()?;
        let data_size = rdr.read_u32::<LittleEndian>()?;
        Ok(MemberFooter {
            data_crc32,
            data_size,
        })
    }

    /// Checks the footer against the CRC and length of the inflated member.
    pub fn verify(&self, crc: u32, byte_count: u64) -> Result<()> {
        if crc != self.data_crc32 {
            return Err(Error::ChecksumMismatch {
                expected: self.data_crc32,
                computed: crc,
            });
        }
        // ISIZE is the length modulo 2^32.
        if byte_count as u32 != self.data_size {
            return Err(Error::LengthMismatch {
                expected: self.data_size.into(),
                actual: byte_count,
            });
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////
