//! Error types for container header parsing

use thiserror::Error;

/// Errors raised while reading or validating a container header
#[derive(Error, Debug)]
pub enum HeaderError {
    /// Fewer bytes than a full header are available
    #[error("Header too short: need {needed} bytes, {available} available")]
    TooShort {
        /// Bytes required for the fixed header
        needed: usize,
        /// Bytes available from the requested offset
        available: usize,
    },

    /// The magic tag is not 'RPak'
    #[error("Invalid magic: expected {expected:#010x}, got {actual:#010x}")]
    InvalidMagic {
        /// Expected magic value
        expected: u32,
        /// Magic value found
        actual: u32,
    },

    /// The format version is not supported
    #[error("Unsupported version {0} (only version 8 is supported)")]
    UnsupportedVersion(u16),

    /// The payload uses a compression scheme this crate cannot decode
    #[error("Unsupported compression: {0}")]
    UnsupportedCompression(&'static str),

    /// A size field points past the end of the available data
    #[error("Size overflow in {field}: {value} exceeds {available} available bytes")]
    SizeOverflow {
        /// Header field name
        field: &'static str,
        /// Stated value
        value: u64,
        /// Bytes actually available
        available: u64,
    },

    /// A size field is inconsistent with the rest of the header
    #[error("Invalid size in {field}: {value}")]
    InvalidSize {
        /// Header field name
        field: &'static str,
        /// Rejected value
        value: u64,
    },

    /// The container is already stored uncompressed
    #[error("Container is not compressed")]
    NotCompressed,

    /// Binary format parsing error from binrw
    #[error("Binary format error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for header operations
pub type HeaderResult<T> = Result<T, HeaderError>;

impl HeaderError {
    /// Whether the error means the file is not an RPak container at all
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::TooShort { .. } | Self::InvalidMagic { .. } | Self::BinRw(_)
        )
    }
}
