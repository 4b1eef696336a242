//! Block decompression for compressed package bodies and fully compressed containers.
//!
//! Both forms share one container layout: the package tag, a block size, the total
//! compressed and uncompressed sizes, then one `(compressed, uncompressed)` pair per
//! block followed by the block payloads. Every block is compressed independently.

use std::io::{self, Cursor, Read, Seek};

use binrw::{BinRead, Endian};
use flate2::read::ZlibDecoder;
use lzxd::{Lzxd, WindowSize};
use rust_lzo::{LZOContext, LZOError};
use tracing::{debug, instrument};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    endian::EndianReader,
    error::{Error, Result},
    types::{ChunkDescriptor, PACKAGE_TAG},
};

/// Identifies the codec used to compress the blocks of a package
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CompressionMethod {
    /// Stores the data as it is
    #[default]
    None = 0,

    /// Zlib streams, used by PC builds
    Zlib = 1,

    /// LZO1X, used by PC builds
    Lzo = 2,

    /// LZX with Xbox memory framing, used by Xbox 360 builds
    Lzx = 4,

    /// LZMA without the size field, used by PS3 and Wii U builds
    Lzma = 8,
}

impl TryFrom<u32> for CompressionMethod {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        Ok(match value {
            0 => CompressionMethod::None,
            1 => CompressionMethod::Zlib,
            2 => CompressionMethod::Lzo,
            4 => CompressionMethod::Lzx,
            8 => CompressionMethod::Lzma,
            other => return Err(Error::UnsupportedCompression(other)),
        })
    }
}

impl From<CompressionMethod> for u32 {
    fn from(value: CompressionMethod) -> Self {
        value as u32
    }
}

/// Upper bound on buffers reserved from sizes declared in the file
const MAX_PREALLOCATION: usize = 0x0100_0000;

/// Sizes of a single block in a compressed container
#[derive(BinRead, Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct BlockSizes {
    pub compressed_size: i32,
    pub uncompressed_size: i32,
}

/// The block table that follows the tag and block size of a compressed container
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BlockTable {
    pub block_size: u32,
    pub compressed_size: i32,
    pub uncompressed_size: i32,
    pub blocks: Vec<BlockSizes>,
}

impl BlockTable {
    /// Read the totals and block sizes. The block count is derived from the
    /// uncompressed total and the block size.
    pub fn read<R: Read + Seek>(reader: &mut EndianReader<R>, block_size: u32) -> Result<Self> {
        if block_size == 0 {
            return Err(Error::MalformedCompression(
                "compressed container has a block size of zero".to_string(),
            ));
        }

        let compressed_size: i32 = reader.read()?;
        let uncompressed_size: i32 = reader.read()?;
        if compressed_size < 0 || uncompressed_size < 0 {
            return Err(Error::MalformedCompression(format!(
                "compressed container has negative sizes ({compressed_size}, {uncompressed_size})"
            )));
        }

        let block_count = (uncompressed_size as u32).div_ceil(block_size);
        let mut blocks = Vec::with_capacity(block_count.min(1024) as usize);
        for _ in 0..block_count {
            blocks.push(reader.read::<BlockSizes>()?);
        }

        Ok(Self {
            block_size,
            compressed_size,
            uncompressed_size,
            blocks,
        })
    }
}

/// Decompress a single block, checking that it expands to exactly `expected` bytes
#[instrument(skip(input), fields(input_len = input.len()), err)]
pub fn decompress(method: CompressionMethod, input: &[u8], expected: usize) -> Result<Vec<u8>> {
    let output = match method {
        CompressionMethod::None => input.to_vec(),
        CompressionMethod::Zlib => {
            let mut output = Vec::with_capacity(expected.min(MAX_PREALLOCATION));
            ZlibDecoder::new(input)
                .take(expected as u64 + 1)
                .read_to_end(&mut output)
                .map_err(|e| Error::MalformedCompression(format!("zlib: {e}")))?;
            output
        }
        CompressionMethod::Lzo => {
            let mut output = vec![0u8; expected];
            let (decoded, err) = LZOContext::decompress_to_slice(input, &mut output);
            let decoded_len = decoded.len();
            if !matches!(err, LZOError::OK) {
                return Err(Error::MalformedCompression(
                    "lzo: block could not be decoded".to_string(),
                ));
            }
            output.truncate(decoded_len);
            output
        }
        CompressionMethod::Lzx => decompress_lzx(input, expected)?,
        CompressionMethod::Lzma => {
            let options = lzma_rs::decompress::Options {
                unpacked_size: lzma_rs::decompress::UnpackedSize::UseProvided(Some(
                    expected as u64,
                )),
                ..Default::default()
            };
            let mut output = Vec::with_capacity(expected.min(MAX_PREALLOCATION));
            lzma_rs::lzma_decompress_with_options(&mut &input[..], &mut output, &options)
                .map_err(|e| Error::MalformedCompression(format!("lzma: {e}")))?;
            output
        }
    };

    if output.len() != expected {
        return Err(Error::MalformedCompression(format!(
            "{method:?} block expanded to {} bytes, expected {expected}",
            output.len()
        )));
    }

    Ok(output)
}

/// Size of an LZX frame when the frame header doesn't state one
const LZX_FRAME_SIZE: usize = 0x8000;

/// Decode an LZX block with Xbox memory framing.
///
/// Each frame starts with its compressed size as a big endian u16. A leading `0xFF`
/// byte marks a frame with an explicit uncompressed size, which comes before the
/// compressed size.
fn decompress_lzx(input: &[u8], expected: usize) -> Result<Vec<u8>> {
    let malformed = |what: &str| Error::MalformedCompression(format!("lzx: {what}"));

    let mut decoder = Lzxd::new(WindowSize::KB128);
    let mut output = Vec::with_capacity(expected.min(MAX_PREALLOCATION));
    let mut position = 0usize;

    while output.len() < expected {
        let header = input
            .get(position..position + 2)
            .ok_or_else(|| malformed("frame header runs past the end of the block"))?;

        let (frame_size, chunk_size) = if header[0] == 0xFF {
            let sizes = input
                .get(position + 1..position + 5)
                .ok_or_else(|| malformed("frame header runs past the end of the block"))?;
            position += 5;
            (
                usize::from(u16::from_be_bytes([sizes[0], sizes[1]])),
                usize::from(u16::from_be_bytes([sizes[2], sizes[3]])),
            )
        } else {
            position += 2;
            (
                LZX_FRAME_SIZE,
                usize::from(u16::from_be_bytes([header[0], header[1]])),
            )
        };

        if frame_size == 0 || chunk_size == 0 {
            break;
        }

        let chunk = input
            .get(position..position + chunk_size)
            .ok_or_else(|| malformed("frame runs past the end of the block"))?;
        position += chunk_size;

        let frame_size = frame_size.min(expected - output.len());
        let frame = decoder
            .decompress_next(chunk, frame_size)
            .map_err(|e| malformed(&e.to_string()))?;
        output.extend_from_slice(frame);
    }

    Ok(output)
}

/// Read and decode every block described by `table`, starting at the current position
fn decompress_blocks<R: Read + Seek>(
    reader: &mut EndianReader<R>,
    table: &BlockTable,
    method: CompressionMethod,
) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity((table.uncompressed_size as usize).min(MAX_PREALLOCATION));

    for block in &table.blocks {
        let input = reader.read_bytes(i64::from(block.compressed_size))?;
        let expected = usize::try_from(block.uncompressed_size).map_err(|_| {
            Error::MalformedCompression(format!(
                "block has a negative size ({})",
                block.uncompressed_size
            ))
        })?;
        if expected > table.block_size as usize {
            return Err(Error::MalformedCompression(format!(
                "block expands to {expected} bytes, more than the block size {}",
                table.block_size
            )));
        }
        output.extend(decompress(method, &input, expected)?);
    }

    if output.len() != table.uncompressed_size as usize {
        return Err(Error::MalformedCompression(format!(
            "blocks expanded to {} bytes, container declares {}",
            output.len(),
            table.uncompressed_size
        )));
    }

    Ok(output)
}

/// Rebuild the uncompressed package from its compressed chunks.
///
/// The bytes before the first chunk are the summary and are copied as they are. Each
/// chunk is then decoded and placed at its uncompressed offset. Chunks must follow each
/// other without gaps or overlaps in table order.
#[instrument(skip(reader, chunks), fields(chunk_count = chunks.len()), err)]
pub fn decompress_chunks<R: Read + Seek>(
    reader: &mut EndianReader<R>,
    chunks: &[ChunkDescriptor],
    method: CompressionMethod,
) -> Result<Vec<u8>> {
    let Some(first) = chunks.first() else {
        return Err(Error::MalformedCompression(
            "compressed package has no chunks".to_string(),
        ));
    };

    reader.seek_to(0)?;
    let mut output = reader.read_bytes(i64::from(first.uncompressed_offset))?;

    for (index, chunk) in chunks.iter().enumerate() {
        if i64::from(chunk.uncompressed_offset) != output.len() as i64 {
            return Err(Error::MalformedCompression(format!(
                "chunk {index} starts at {:#x}, previous data ends at {:#x}",
                chunk.uncompressed_offset,
                output.len()
            )));
        }

        reader.seek_to(i64::from(chunk.compressed_offset))?;
        let tag: u32 = reader.read()?;
        if tag != PACKAGE_TAG {
            return Err(Error::MalformedCompression(format!(
                "chunk {index} has tag {tag:#010x}"
            )));
        }

        let block_size: u32 = reader.read()?;
        let table = BlockTable::read(reader, block_size)?;
        if table.uncompressed_size != chunk.uncompressed_size {
            return Err(Error::MalformedCompression(format!(
                "chunk {index} declares {} bytes, its header {}",
                chunk.uncompressed_size, table.uncompressed_size
            )));
        }

        output.extend(decompress_blocks(reader, &table, method)?);
        debug!(index, size = chunk.uncompressed_size, "decompressed chunk");
    }

    Ok(output)
}

/// Work out whether a fully compressed container uses LZMA or LZX.
///
/// LZMA blocks start with the properties byte `0x5D` followed by a plausible dictionary
/// size. Anything else is taken to be LZX. The reader is left where it was.
pub fn detect_fully_compressed_method<R: Read + Seek>(
    reader: &mut EndianReader<R>,
) -> Result<CompressionMethod> {
    let position = reader.position()? as i64;
    let header = reader.read_bytes(5);
    reader.seek_to(position)?;

    let method = match header {
        Ok(bytes) => {
            let dictionary_size = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
            if bytes[0] == 0x5D && (0x1000..=0x4000_0000).contains(&dictionary_size) {
                CompressionMethod::Lzma
            } else {
                CompressionMethod::Lzx
            }
        }
        Err(Error::Truncated { .. }) => CompressionMethod::Lzx,
        Err(e) => return Err(e),
    };

    Ok(method)
}

/// Decompress a fully compressed container.
///
/// The reader must be positioned just after the block size that replaced the version
/// word. When `method` is `None` the codec is detected from the first block. Returns the
/// whole inner file and the codec that was used.
#[instrument(skip(reader), err)]
pub fn decompress_fully_compressed<R: Read + Seek>(
    reader: &mut EndianReader<R>,
    block_size: u32,
    method: Option<CompressionMethod>,
) -> Result<(Vec<u8>, CompressionMethod)> {
    let endian = reader.endian();
    reader.set_endian(Endian::Little);
    let result = read_container(reader, block_size, method);
    reader.set_endian(endian);
    result
}

fn read_container<R: Read + Seek>(
    reader: &mut EndianReader<R>,
    block_size: u32,
    method: Option<CompressionMethod>,
) -> Result<(Vec<u8>, CompressionMethod)> {
    let table = BlockTable::read(reader, block_size)?;
    let method = match method {
        Some(method) => method,
        None => detect_fully_compressed_method(reader)?,
    };
    debug!(?method, blocks = table.blocks.len(), "decompressing container");
    Ok((decompress_blocks(reader, &table, method)?, method))
}

/// The stream a package is read from: the source itself, or the decompressed copy of it
#[derive(Debug)]
pub enum PackageStream<R> {
    Source(R),
    Decompressed(Cursor<Vec<u8>>),
}

impl<R: Read + Seek> Seek for PackageStream<R> {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        match self {
            PackageStream::Source(r) => r.seek(pos),
            PackageStream::Decompressed(r) => r.seek(pos),
        }
    }
}

impl<R: Read + Seek> Read for PackageStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            PackageStream::Source(r) => r.read(buf),
            PackageStream::Decompressed(r) => r.read(buf),
        }
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        match self {
            PackageStream::Source(r) => r.read_exact(buf),
            PackageStream::Decompressed(r) => r.read_exact(buf),
        }
    }
}
