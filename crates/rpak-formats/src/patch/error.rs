//! Error types for edit stream operations

use thiserror::Error;

/// Errors raised while parsing or applying a patch edit stream
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// Unknown command byte
    #[error("Invalid edit command {opcode} at offset {offset}")]
    InvalidOpcode {
        /// Offset of the command in the stream
        offset: usize,
        /// Command byte found
        opcode: u8,
    },

    /// A command's operands run past the end of the stream
    #[error("Truncated edit command at offset {offset}: need {needed} bytes, {available} available")]
    TruncatedCommand {
        /// Offset of the command in the stream
        offset: usize,
        /// Operand bytes required
        needed: usize,
        /// Bytes left in the stream
        available: usize,
    },

    /// The source data ended before the stream consumed all it refers to
    #[error("Source exhausted: stream needs {needed} source bytes, {available} supplied")]
    SourceExhausted {
        /// Source bytes the stream consumes
        needed: u64,
        /// Source bytes supplied
        available: u64,
    },

    /// The patched output has the wrong length
    #[error("Output size mismatch: expected {expected} bytes, got {actual} bytes")]
    OutputSizeMismatch {
        /// Expected output size
        expected: u64,
        /// Output size produced
        actual: u64,
    },
}

/// Result type for edit stream operations
pub type PatchResult<T> = Result<T, PatchError>;

impl PatchError {
    /// Whether the edit stream itself is malformed (as opposed to its inputs)
    pub fn is_stream_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidOpcode { .. } | Self::TruncatedCommand { .. }
        )
    }
}
