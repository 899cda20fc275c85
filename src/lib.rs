#![forbid(unsafe_code)]

use std::io::{BufRead, Read, Write};

use log::debug;

pub mod chunk;
pub mod codec;
pub mod crc32;
pub mod decompressor;
pub mod error;
pub mod gzip;
pub mod inflate;
pub mod lzo;
pub mod pkzip;
pub mod stream;
pub mod tracking_writer;

pub use chunk::{ChunkHeader, ChunkType, ExternalChunkHeader, InlineChunkHeader, NULL_CHUNK};
pub use codec::{ChunkCodec, ExternalChunkCodec, InlineChunkCodec};
pub use decompressor::{ContainerDecompressor, State};
pub use error::{Error, Result};
pub use lzo::{Lzo1x, RawCompressor};
pub use stream::{ChunkStreamReader, ChunkStreamWriter, DEFAULT_BLOCK_SIZE, DEFAULT_MAX_CHUNK_LEN};

////////////////////////////////////////////////////////////////////////////////

/// Inflates a gzip stream or single-entry pkzip archive from `input`.
pub fn decompress<R: BufRead, W: Write>(mut input: R, mut output: W) -> Result<()> {
    let mut decompressor = ContainerDecompressor::new();
    loop {
        let buf = input.fill_buf()?;
        if buf.is_empty() {
            break;
        }
        let len = buf.len();
        output.write_all(decompressor.decompress(buf)?)?;
        input.consume(len);
    }
    if !decompressor.end_decompression() {
        return Err(Error::IncompleteStream);
    }
    output.flush()?;
    Ok(())
}

/// Splits `input` into blocks of `block_size` bytes and writes them as a
/// chunk stream. Returns the number of bytes read.
pub fn pack<R: Read, W: Write>(
    mut input: R,
    output: W,
    block_size: usize,
    total_hint: u32,
) -> Result<u64> {
    let mut writer = ChunkStreamWriter::new(output, total_hint)?;
    let mut block = Vec::with_capacity(block_size);
    loop {
        block.clear();
        input.by_ref().take(block_size as u64).read_to_end(&mut block)?;
        if block.is_empty() {
            break;
        }
        writer.write_block(&block)?;
    }
    let total = writer.total();
    writer.finish()?;
    debug!("packed {} bytes", total);
    Ok(total)
}

/// Decodes a chunk stream. Returns the number of bytes written.
pub fn unpack<R: Read, W: Write>(input: R, mut output: W, max_chunk_len: usize) -> Result<u64> {
    let reader = ChunkStreamReader::with_max_chunk_len(input, max_chunk_len)?;
    let mut total = 0;
    for block in reader {
        let block = block?;
        output.write_all(&block)?;
        total += block.len() as u64;
    }
    output.flush()?;
    debug!("unpacked {} bytes", total);
    Ok(total)
}
