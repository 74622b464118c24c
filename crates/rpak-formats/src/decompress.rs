//! Whole-container decompression
//!
//! Produces the container as it would look stored uncompressed: the header
//! with its compression flags cleared and its on-disk size set to the
//! decompressed size, followed by the decoded payload.

use crate::decode::{self, DecodeError};
use crate::header::{HeaderError, PakHeader};
use std::io::Write;
use thiserror::Error;
use tracing::debug;

/// Output chunk size used while streaming a payload out
const CHUNK_SIZE: usize = 1 << 20;

/// Errors raised while decompressing a whole container
#[derive(Error, Debug)]
pub enum DecompressError {
    /// The container header is unusable
    #[error("Header error: {0}")]
    Header(#[from] HeaderError),

    /// The payload failed to decode
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Writing the output failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for whole-container decompression
pub type DecompressResult<T> = Result<T, DecompressError>;

/// Decompress a container held in memory
pub fn decompress_to_vec(file: &[u8]) -> DecompressResult<Vec<u8>> {
    let mut out = Vec::new();
    decompress_to_writer(file, &mut out)?;
    Ok(out)
}

/// Decompress a container into `writer`, returning the bytes written
pub fn decompress_to_writer<W: Write>(file: &[u8], mut writer: W) -> DecompressResult<u64> {
    let (header, _) = PakHeader::parse(file, 0)?;
    if !header.is_compressed() {
        return Err(HeaderError::NotCompressed.into());
    }

    let (mut context, expected) = decode::init(file, &header)?;
    debug!(
        compressed = header.compressed_size,
        decompressed = header.decompressed_size,
        "decompressing container"
    );

    let header_bytes = header.decompressed().build()?;
    writer.write_all(&header_bytes)?;

    let mut buffer = vec![0u8; CHUNK_SIZE.min(expected as usize).max(1)];
    let mut remaining = expected;
    while remaining > 0 {
        let want = remaining.min(buffer.len() as u64) as usize;
        let written = context.decompress_chunk(file, &mut buffer[..want])?;
        if written == 0 {
            return Err(DecodeError::SizeMismatch {
                expected,
                actual: context.total_out(),
            }
            .into());
        }
        writer.write_all(&buffer[..written])?;
        remaining -= written as u64;
    }

    writer.flush()?;
    Ok(header_bytes.len() as u64 + expected)
}
