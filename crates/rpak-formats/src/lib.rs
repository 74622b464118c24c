//! Parsers, builders and the streaming decoder for RPak asset containers
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_possible_wrap)] // Intentional for binary operations
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::cast_precision_loss)] // Compression ratios
#![allow(clippy::doc_markdown)] // Format terms don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Domain-specific naming patterns
#![allow(clippy::return_self_not_must_use)] // Builder patterns
#![allow(clippy::use_self)] // Type clarity
//! RPak containers bundle the assets of a game level (textures, materials,
//! models, scripts) into one file whose body is usually LZ-compressed. This
//! crate reads and writes every part of the format and carries the resumable
//! decoder the loading pipeline streams containers through.
//!
//! # Modules
//!
//! - **header**: the fixed 0x80-byte container header
//! - **decode**: resumable, chunked LZ decoding over linear or ring inputs
//! - **body**: segment, page, asset and relation tables plus page resolution
//! - **patch**: edit streams that rebuild pages of a patched container
//! - **builder**: symmetric writer for uncompressed containers
//! - **guid**: asset name hashing
//! - **naming**: patch file names
//!
//! # Design Principles
//!
//! - **Symmetric Operations**: every table that is parsed can be built
//! - **Bounded Decoding**: the decoder never writes past the caller's buffer
//!   and never reads history it was not given
//! - **Round-Trip Guarantee**: parse(build(data)) == data

#![warn(missing_docs)]

pub mod body;
pub mod builder;
pub mod decode;
pub mod decompress;
pub mod guid;
pub mod header;
pub mod naming;
pub mod patch;

pub use builder::PakBuilder;
pub use decode::{DecodeContext, DecodeError};
pub use decompress::{DecompressError, decompress_to_vec, decompress_to_writer};
pub use guid::pak_guid;
pub use header::{HeaderError, PakHeader};

/// Common trait for records that can be parsed from and built back to bytes
pub trait PakFormat: Sized {
    /// Parse from bytes
    fn parse(data: &[u8]) -> Result<Self, Box<dyn std::error::Error>>;

    /// Build to bytes
    fn build(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>>;

    /// Verify round-trip correctness
    fn verify_round_trip(data: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
        let parsed = Self::parse(data)?;
        let rebuilt = parsed.build()?;
        if data != rebuilt.as_slice() {
            return Err("Round-trip verification failed".into());
        }
        Ok(())
    }
}
