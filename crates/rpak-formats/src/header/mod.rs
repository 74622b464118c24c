//! RPak container header
//!
//! Every container starts with a fixed 0x80-byte little-endian header. It
//! names the format version, whether the rest of the file is compressed, the
//! on-disk and decompressed sizes, and the counts of every table that follows
//! in the decompressed body.
//!
//! # Header Layout
//!
//! ```text
//! Container header (0x80 bytes, little-endian):
//! ├── 0x00 magic 'RPak' / version / flags
//! ├── 0x08 file time (FILETIME) / checksum
//! ├── 0x18 compressed size / embedded starpak offset / reserved
//! ├── 0x30 decompressed size (header included) / embedded starpak size / reserved
//! ├── 0x48 starpak block sizes / virtual segment count / memory page count
//! ├── 0x50 patch index
//! ├── 0x54 descriptor, asset, guid descriptor and relation counts
//! └── 0x64 reserved / memory page offset / reserved
//! ```
//!
//! Reserved bytes are kept verbatim so that [`PakHeader::build`] reproduces
//! the parsed header exactly.

mod error;

pub use error::{HeaderError, HeaderResult};

use binrw::{BinRead, BinWrite};
use std::fmt;
use std::io::{Cursor, Read, Seek};

/// Container magic: "RPak" read as a little-endian u32
pub const RPAK_MAGIC: u32 = u32::from_le_bytes(*b"RPak");

/// The only container version this crate reads
pub const RPAK_VERSION: u16 = 8;

/// Size of the fixed container header
pub const HEADER_SIZE: usize = 0x80;

/// Payload is LZ-compressed
pub const FLAG_COMPRESSED: u16 = 0x0100;

/// Payload is a zstd stream
pub const FLAG_ZSTD: u16 = 0x0200;

/// Fixed container header
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct PakHeader {
    /// Magic tag, must be [`RPAK_MAGIC`]
    pub magic: u32,
    /// Format version
    pub version: u16,
    /// Compression flags
    pub flags: u16,
    /// Build time as a Windows FILETIME
    pub file_time: u64,
    /// Content checksum
    pub checksum: u64,
    /// Size of the file on disk
    pub compressed_size: u64,
    /// Offset of starpak data embedded in this file
    pub embedded_starpak_offset: u64,
    reserved_0: [u8; 8],
    /// Size of the decompressed container, header included
    pub decompressed_size: u64,
    /// Size of starpak data embedded in this file
    pub embedded_starpak_size: u64,
    reserved_1: [u8; 8],
    /// Byte size of the starpak reference block
    pub starpak_ref_size: u16,
    /// Byte size of the optional starpak reference block
    pub opt_starpak_ref_size: u16,
    /// Number of virtual segment headers
    pub virtual_segment_count: u16,
    /// Number of memory page headers
    pub mem_page_count: u16,
    /// Number of patch sources; zero for a base container
    pub patch_index: u32,
    /// Number of pointer descriptors
    pub descriptor_count: u32,
    /// Number of asset entries
    pub asset_count: u32,
    /// Number of guid descriptors
    pub guid_descriptor_count: u32,
    /// Number of relation entries
    pub relation_count: u32,
    reserved_2: [u8; 16],
    /// Offset of the first memory page
    pub mem_page_offset: u32,
    reserved_3: [u8; 8],
}

impl PakHeader {
    /// Create an uncompressed version 8 header with all counts zero
    pub fn new() -> Self {
        Self {
            magic: RPAK_MAGIC,
            version: RPAK_VERSION,
            flags: 0,
            file_time: 0,
            checksum: 0,
            compressed_size: HEADER_SIZE as u64,
            embedded_starpak_offset: 0,
            reserved_0: [0; 8],
            decompressed_size: HEADER_SIZE as u64,
            embedded_starpak_size: 0,
            reserved_1: [0; 8],
            starpak_ref_size: 0,
            opt_starpak_ref_size: 0,
            virtual_segment_count: 0,
            mem_page_count: 0,
            patch_index: 0,
            descriptor_count: 0,
            asset_count: 0,
            guid_descriptor_count: 0,
            relation_count: 0,
            reserved_2: [0; 16],
            mem_page_offset: 0,
            reserved_3: [0; 8],
        }
    }

    /// Parse and validate the header at `offset`
    ///
    /// Returns the header and the offset at which the payload begins.
    pub fn parse(data: &[u8], offset: usize) -> HeaderResult<(Self, usize)> {
        let available = data.get(offset..).unwrap_or_default();
        if available.len() < HEADER_SIZE {
            return Err(HeaderError::TooShort {
                needed: HEADER_SIZE,
                available: available.len(),
            });
        }

        let header = Self::read(&mut Cursor::new(&available[..HEADER_SIZE]))?;
        header.validate(available.len() as u64)?;
        Ok((header, offset + HEADER_SIZE))
    }

    /// Read and validate the header at the current position of `reader`
    ///
    /// `available` is the number of bytes of the file the caller will read;
    /// the stated compressed size must fit inside it.
    pub fn read_from<R: Read + Seek>(reader: &mut R, available: u64) -> HeaderResult<Self> {
        if available < HEADER_SIZE as u64 {
            return Err(HeaderError::TooShort {
                needed: HEADER_SIZE,
                available: available as usize,
            });
        }

        let header = Self::read(reader)?;
        header.validate(available)?;
        Ok(header)
    }

    /// Validate the header against the number of bytes that hold the file
    pub fn validate(&self, available: u64) -> HeaderResult<()> {
        if self.magic != RPAK_MAGIC {
            return Err(HeaderError::InvalidMagic {
                expected: RPAK_MAGIC,
                actual: self.magic,
            });
        }

        if self.version != RPAK_VERSION {
            return Err(HeaderError::UnsupportedVersion(self.version));
        }

        if self.is_zstd() {
            return Err(HeaderError::UnsupportedCompression("zstd stream"));
        }

        if self.decompressed_size < HEADER_SIZE as u64 {
            return Err(HeaderError::InvalidSize {
                field: "decompressed_size",
                value: self.decompressed_size,
            });
        }

        if self.compressed_size > available {
            return Err(HeaderError::SizeOverflow {
                field: "compressed_size",
                value: self.compressed_size,
                available,
            });
        }

        if !self.is_compressed() && self.compressed_size != self.decompressed_size {
            return Err(HeaderError::InvalidSize {
                field: "compressed_size",
                value: self.compressed_size,
            });
        }

        if self.embedded_starpak_size > 0 {
            let end = self
                .embedded_starpak_offset
                .checked_add(self.embedded_starpak_size)
                .unwrap_or(u64::MAX);
            if end > available {
                return Err(HeaderError::SizeOverflow {
                    field: "embedded_starpak",
                    value: end,
                    available,
                });
            }
        }

        Ok(())
    }

    /// Serialize the header to its 0x80-byte form
    pub fn build(&self) -> HeaderResult<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::with_capacity(HEADER_SIZE));
        self.write(&mut buffer)?;
        Ok(buffer.into_inner())
    }

    /// Size of the header in bytes
    pub fn header_size(&self) -> u64 {
        HEADER_SIZE as u64
    }

    /// Number of bytes that follow the header once decompressed
    pub fn payload_size(&self) -> u64 {
        self.decompressed_size.saturating_sub(HEADER_SIZE as u64)
    }

    /// Whether the payload is LZ-compressed
    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }

    /// Whether the payload is a zstd stream
    pub fn is_zstd(&self) -> bool {
        self.flags & FLAG_ZSTD != 0
    }

    /// Whether this container patches earlier ones
    pub fn is_patch(&self) -> bool {
        self.patch_index > 0
    }

    /// Header as it appears once the payload has been decompressed
    pub fn decompressed(&self) -> Self {
        let mut header = self.clone();
        header.flags &= !(FLAG_COMPRESSED | FLAG_ZSTD);
        header.compressed_size = header.decompressed_size;
        header
    }

    /// Human readable summary of the header
    pub fn details(&self) -> HeaderDetails<'_> {
        HeaderDetails { header: self }
    }
}

impl Default for PakHeader {
    fn default() -> Self {
        Self::new()
    }
}

impl crate::PakFormat for PakHeader {
    fn parse(data: &[u8]) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::parse(data, 0)?.0)
    }

    fn build(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        Ok(Self::build(self)?)
    }
}

/// Seconds between 1601-01-01 and 1970-01-01
const FILETIME_UNIX_OFFSET: u64 = 11_644_473_600;

/// Report produced by [`PakHeader::details`]
#[derive(Debug, Clone, Copy)]
pub struct HeaderDetails<'a> {
    header: &'a PakHeader,
}

impl fmt::Display for HeaderDetails<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = self.header;
        let magic = header.magic.to_le_bytes();

        writeln!(f, "magic:             {}", String::from_utf8_lossy(&magic))?;
        writeln!(f, "version:           {}", header.version)?;
        writeln!(
            f,
            "flags:             {:#06x}{}",
            header.flags,
            if header.is_compressed() { " (compressed)" } else { "" }
        )?;

        let seconds = header.file_time / 10_000_000;
        match seconds.checked_sub(FILETIME_UNIX_OFFSET) {
            Some(unix) => writeln!(f, "time:              {unix} (unix seconds)")?,
            None => writeln!(f, "time:              {:#018x}", header.file_time)?,
        }

        writeln!(f, "checksum:          {:#018x}", header.checksum)?;
        writeln!(f, "assets:            {}", header.asset_count)?;
        writeln!(f, "patch index:       {}", header.patch_index)?;
        writeln!(f, "compressed size:   {}", header.compressed_size)?;
        write!(f, "decompressed size: {}", header.decompressed_size)?;
        if header.compressed_size > 0 {
            let ratio = header.decompressed_size as f64 / header.compressed_size as f64;
            write!(f, " (ratio {ratio:.2})")?;
        }
        Ok(())
    }
}
