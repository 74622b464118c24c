//! Error types for the streaming decoder

use thiserror::Error;

/// Errors raised while decoding an RPak LZ stream
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The bitstream ends before the current symbol or copy completes
    ///
    /// Positions are absolute offsets into the compressed file. The context is
    /// left untouched, so the call can be retried once more input is available.
    #[error("truncated input: need {needed} bytes, {available} available")]
    TruncatedInput {
        /// Input position that must be readable
        needed: u64,
        /// Input bytes currently available
        available: u64,
    },

    /// The stream produces more output than the frame declared
    #[error("size mismatch: expected {expected} bytes, stream produces {actual} bytes")]
    SizeMismatch {
        /// Declared payload size
        expected: u64,
        /// Payload size implied by the stream
        actual: u64,
    },

    /// A match refers to data before the start of the payload or outside the window
    #[error("invalid match distance {distance} with {available} bytes of history")]
    InvalidDistance {
        /// Decoded distance
        distance: u64,
        /// History available to copy from
        available: u64,
    },

    /// The stream frame header is not usable
    #[error("invalid stream frame: {0}")]
    InvalidFrame(&'static str),

    /// The bitstream violates a structural rule of the format
    #[error("corrupt stream: {0}")]
    CorruptStream(&'static str),

    /// A ring buffer or window size is not a power of two
    #[error("{what} size {size} is not a power of two")]
    NotPowerOfTwo {
        /// Which buffer was rejected
        what: &'static str,
        /// Rejected size
        size: u64,
    },
}

/// Result type for decode operations
pub type DecodeResult<T> = Result<T, DecodeError>;

impl DecodeError {
    /// Whether retrying with more input can succeed
    pub fn is_resumable(&self) -> bool {
        matches!(self, Self::TruncatedInput { .. })
    }

    /// Whether the error indicates damaged compressed data
    pub fn is_corruption_error(&self) -> bool {
        matches!(
            self,
            Self::SizeMismatch { .. }
                | Self::InvalidDistance { .. }
                | Self::InvalidFrame(_)
                | Self::CorruptStream(_)
        )
    }
}
