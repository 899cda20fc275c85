#![forbid(unsafe_code)]

//! Push-driven decompressor for gzip streams and single-entry pkzip archives.
//!
//! Input may be split anywhere, including inside magics, headers and deflate
//! codewords. Each call returns whatever output the new bytes produced.

use std::io::Write;

use log::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::gzip::{self, HeaderParse, MemberFooter, MemberHeader, Needed};
use crate::inflate::Inflater;
use crate::pkzip::{self, LocalFileHeader};
use crate::tracking_writer::TrackingWriter;

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// Waiting for enough bytes to tell gzip from pkzip.
    NotStarted,
    GzipHeader,
    GzipBody,
    GzipTrailer,
    /// A member has been verified. More bytes may start another member;
    /// once something else shows up the rest of the input is dropped.
    GzipFinished { discarding: bool },
    PkzipHeader,
    /// Skipping the filename and extra field.
    PkzipExtra {
        header: LocalFileHeader,
        remaining: usize,
    },
    PkzipBody {
        header: LocalFileHeader,
        remaining: usize,
    },
    /// The entry has been verified; the rest of the archive is dropped.
    PkzipTrailer,
    /// A previous call failed.
    Failed,
}

////////////////////////////////////////////////////////////////////////////////

pub struct ContainerDecompressor {
    state: State,
    scratch: Vec<u8>,
    header_needed: Needed,
    inflater: Inflater,
    output: TrackingWriter<Vec<u8>>,
}

impl Default for ContainerDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerDecompressor {
    pub fn new() -> Self {
        Self {
            state: State::NotStarted,
            scratch: Vec::new(),
            header_needed: Needed::Length(0),
            inflater: Inflater::new(),
            output: TrackingWriter::new(Vec::new()),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Prepares for a new stream. Buffers are kept.
    pub fn reset(&mut self) {
        self.state = State::NotStarted;
        self.scratch.clear();
        self.inflater.reset();
        self.output.get_mut_ref_inner().clear();
        self.output.reset_tracking();
    }

    /// Consumes all of `data` and returns the bytes it inflated to. The slice
    /// may be empty when more input is needed, and is only valid until the
    /// next call.
    pub fn decompress(&mut self, mut data: &[u8]) -> Result<&[u8]> {
        self.output.get_mut_ref_inner().clear();
        if self.state == State::Failed {
            return Err(Error::NeedsReset);
        }
        trace!("{} bytes in state {:?}", data.len(), self.state);

        while !data.is_empty() {
            let consumed = match self.step(data) {
                Ok(consumed) => consumed,
                Err(err) => {
                    debug!("decompression failed in state {:?}: {}", self.state, err);
                    self.state = State::Failed;
                    return Err(err);
                }
            };
            data = &data[consumed..];
        }
        Ok(self.output.get_ref().as_slice())
    }

    /// Whether the input so far forms a complete, verified stream.
    pub fn end_decompression(&self) -> bool {
        matches!(self.state, State::GzipFinished { .. } | State::PkzipTrailer)
    }

    fn step(&mut self, data: &[u8]) -> Result<usize> {
        match self.state {
            State::NotStarted => self.sniff(data[0]),
            State::GzipHeader => self.gzip_header(data),
            State::GzipBody => self.gzip_body(data),
            State::GzipTrailer => self.gzip_trailer(data),
            State::GzipFinished { discarding: false } => self.gzip_next_member(data),
            State::GzipFinished { discarding: true } | State::PkzipTrailer => Ok(data.len()),
            State::PkzipHeader => self.pkzip_header(data),
            State::PkzipExtra { header, remaining } => self.pkzip_extra(data, header, remaining),
            State::PkzipBody { header, remaining } => self.pkzip_body(data, header, remaining),
            State::Failed => Err(Error::NeedsReset),
        }
    }

    fn sniff(&mut self, byte: u8) -> Result<usize> {
        self.scratch.push(byte);
        if self.scratch == gzip::MAGIC {
            self.start_gzip_member();
        } else if self.scratch == pkzip::MAGIC {
            debug!("pkzip local file header found");
            self.scratch.clear();
            self.state = State::PkzipHeader;
        } else if !gzip::MAGIC.starts_with(&self.scratch)
            && !pkzip::MAGIC.starts_with(&self.scratch)
        {
            return Err(Error::UnsupportedFormat);
        }
        Ok(1)
    }

    ////////////////////////////////////////////////////////////////////////////

    /// Expects the magic to be in `scratch` already.
    fn start_gzip_member(&mut self) {
        debug!("gzip member found");
        self.inflater.reset();
        self.output.reset_tracking();
        self.header_needed = Needed::Length(0);
        self.state = State::GzipHeader;
    }

    fn gzip_header(&mut self, data: &[u8]) -> Result<usize> {
        let seen = self.scratch.len();
        let fresh = &data[..data.len().min(gzip::MAX_HEADER_LENGTH - seen)];
        self.scratch.extend_from_slice(fresh);

        let parse = match self.header_needed {
            Needed::Length(len) => self.scratch.len() >= len,
            Needed::Terminator => fresh.contains(&0),
        };
        if parse {
            match MemberHeader::parse(&self.scratch)? {
                HeaderParse::Incomplete(needed) => self.header_needed = needed,
                HeaderParse::Complete(header, length) => {
                    debug!(
                        "gzip header of {} bytes, name {:?}",
                        length,
                        header.name.as_deref().unwrap_or("")
                    );
                    self.scratch.clear();
                    self.state = State::GzipBody;
                    return Ok(length - seen);
                }
            }
        }

        if self.scratch.len() == gzip::MAX_HEADER_LENGTH {
            return Err(Error::InvalidHeader("gzip header is too long"));
        }
        Ok(fresh.len())
    }

    fn gzip_body(&mut self, data: &[u8]) -> Result<usize> {
        let output = &mut self.output;
        let consumed = self.inflater.feed(data, |buf| {
            output.write_all(buf)?;
            Ok(())
        })?;
        if self.inflater.is_finished() {
            debug!("gzip deflate stream ended after {} bytes", self.inflater.total_out());
            self.state = State::GzipTrailer;
        } else if consumed == 0 {
            return Err(Error::InflateStalled);
        }
        Ok(consumed)
    }

    fn gzip_trailer(&mut self, data: &[u8]) -> Result<usize> {
        let take = data.len().min(gzip::FOOTER_LENGTH - self.scratch.len());
        self.scratch.extend_from_slice(&data[..take]);
        if self.scratch.len() == gzip::FOOTER_LENGTH {
            let mut buf = [0u8; gzip::FOOTER_LENGTH];
            buf.copy_from_slice(&self.scratch);
            MemberFooter::parse(&buf)?.verify(self.output.crc32(), self.output.byte_count())?;
            debug!("gzip member verified");
            self.scratch.clear();
            self.state = State::GzipFinished { discarding: false };
        }
        Ok(take)
    }

    fn gzip_next_member(&mut self, data: &[u8]) -> Result<usize> {
        self.scratch.push(data[0]);
        if self.scratch == gzip::MAGIC {
            self.start_gzip_member();
            Ok(1)
        } else if gzip::MAGIC.starts_with(&self.scratch) {
            Ok(1)
        } else {
            warn!("ignoring trailing garbage after gzip stream");
            self.scratch.clear();
            self.state = State::GzipFinished { discarding: true };
            Ok(data.len())
        }
    }

    ////////////////////////////////////////////////////////////////////////////

    fn pkzip_header(&mut self, data: &[u8]) -> Result<usize> {
        let take = data.len().min(pkzip::RECORD_LENGTH - self.scratch.len());
        self.scratch.extend_from_slice(&data[..take]);
        if self.scratch.len() == pkzip::RECORD_LENGTH {
            let mut record = [0u8; pkzip::RECORD_LENGTH];
            record.copy_from_slice(&self.scratch);
            self.scratch.clear();

            let header = LocalFileHeader::parse(&record)?;
            header.validate_streamable()?;
            debug!(
                "pkzip entry: method {}, {} -> {} bytes",
                header.compression_method, header.compressed_size, header.uncompressed_size
            );
            self.skip_variable_fields(header, header.variable_length())?;
        }
        Ok(take)
    }

    fn pkzip_extra(
        &mut self,
        data: &[u8],
        header: LocalFileHeader,
        remaining: usize,
    ) -> Result<usize> {
        let take = data.len().min(remaining);
        self.skip_variable_fields(header, remaining - take)?;
        Ok(take)
    }

    fn skip_variable_fields(&mut self, header: LocalFileHeader, remaining: usize) -> Result<()> {
        self.state = State::PkzipExtra { header, remaining };
        if remaining == 0 {
            self.start_pkzip_body(header)?;
        }
        Ok(())
    }

    fn start_pkzip_body(&mut self, header: LocalFileHeader) -> Result<()> {
        self.inflater.reset();
        self.output.reset_tracking();
        self.state = State::PkzipBody {
            header,
            remaining: header.compressed_size as usize,
        };
        if header.is_empty() {
            self.finish_pkzip_entry(header)?;
        }
        Ok(())
    }

    fn pkzip_body(
        &mut self,
        data: &[u8],
        header: LocalFileHeader,
        remaining: usize,
    ) -> Result<usize> {
        let take = data.len().min(remaining);
        let output = &mut self.output;
        let consumed = self.inflater.feed(&data[..take], |buf| {
            output.write_all(buf)?;
            Ok(())
        })?;
        if consumed < take {
            if self.inflater.is_finished() {
                let read = header.compressed_size as usize - remaining + consumed;
                return Err(Error::LengthMismatch {
                    expected: header.compressed_size.into(),
                    actual: read as u64,
                });
            }
            return Err(Error::InflateStalled);
        }

        let remaining = remaining - consumed;
        self.state = State::PkzipBody { header, remaining };
        if remaining == 0 {
            self.finish_pkzip_entry(header)?;
        }
        Ok(consumed)
    }

    fn finish_pkzip_entry(&mut self, header: LocalFileHeader) -> Result<()> {
        if !header.is_empty() && !self.inflater.is_finished() {
            return Err(Error::IncompleteStream);
        }
        let crc = self.output.crc32();
        if crc != header.crc32 {
            return Err(Error::ChecksumMismatch {
                expected: header.crc32,
                computed: crc,
            });
        }
        if self.output.byte_count() != u64::from(header.uncompressed_size) {
            return Err(Error::LengthMismatch {
                expected: header.uncompressed_size.into(),
                actual: self.output.byte_count(),
            });
        }
        debug!("pkzip entry verified, skipping the rest of the archive");
        self.state = State::PkzipTrailer;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////
