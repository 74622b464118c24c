//! Error types for the loading pipeline.
//!
//! Format-level failures from `rpak-formats` are wrapped by [`RuntimeError`];
//! binding and per-asset failures have their own types because they are
//! handled locally (a skipped asset never fails its container).

use crate::status::PakStatus;
use rpak_formats::body::{AssetTag, BodyError};
use rpak_formats::decode::DecodeError;
use rpak_formats::decompress::DecompressError;
use rpak_formats::header::HeaderError;
use rpak_formats::patch::PatchError;
use std::path::PathBuf;
use thiserror::Error;

pub use crate::status::QueryError;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read configuration from {path}: {source}")]
    Read {
        /// Path of the configuration file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Invalid JSON in the configuration file
    #[error("Invalid JSON in configuration file: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A value is out of range
    #[error("Invalid {field}: {reason}")]
    InvalidValue {
        /// Field name that failed validation
        field: &'static str,
        /// Reason for the failure
        reason: String,
    },
}

/// Asset binding registration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    /// A binding for the tag already exists
    #[error("Asset type '{0}' is already registered")]
    DuplicateTag(AssetTag),

    /// The table holds the maximum number of bindings
    #[error("Binding table is full ({max} types)")]
    TableFull {
        /// Table capacity
        max: usize,
    },
}

/// Per-asset load errors.
///
/// These are recorded as skips in the load summary; they never fail the
/// container.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// No binding is registered for the asset's tag
    #[error("No binding registered for asset type '{0}'")]
    UnregisteredTag(AssetTag),

    /// The binding refused the asset
    #[error("Asset {guid:#018x} rejected: {reason}")]
    Rejected {
        /// GUID of the rejected asset
        guid: u64,
        /// Reason given by the binding
        reason: String,
    },
}

impl LoadError {
    /// Rejection raised by a binding
    pub fn rejected(guid: u64, reason: impl Into<String>) -> Self {
        Self::Rejected {
            guid,
            reason: reason.into(),
        }
    }
}

/// Errors raised by the loading pipeline.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The container header is malformed
    #[error("Malformed header: {0}")]
    Header(#[from] HeaderError),

    /// The compressed payload failed to decode
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The container tables are inconsistent
    #[error("Body error: {0}")]
    Body(#[from] BodyError),

    /// The patch edit stream failed to apply
    #[error("Patch error: {0}")]
    Patch(#[from] PatchError),

    /// Whole-container decompression failed
    #[error("Decompression failed: {0}")]
    Decompress(#[from] DecompressError),

    /// Configuration is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Status query failed
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Binding registration failed
    #[error("Binding error: {0}")]
    Binding(#[from] BindingError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Opening a container file failed
    #[error("Failed to open {path}: {source}")]
    Open {
        /// Path that failed to open
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// No container with that name exists in either search directory
    #[error("Pak not found: {0}")]
    NotFound(String),

    /// A record was asked to take an edge outside the lifecycle graph
    #[error("Invalid status transition {from} -> {to}")]
    InvalidTransition {
        /// Current status
        from: PakStatus,
        /// Requested status
        to: PakStatus,
    },

    /// Every registry slot is occupied
    #[error("Pak registry is full ({0} slots)")]
    RegistryFull(usize),

    /// The load was canceled
    #[error("Load canceled")]
    Canceled,

    /// A patch source is shorter than its declared on-disk size
    #[error("Patch source {name} is {actual} bytes, declared {declared}")]
    PatchSourceSize {
        /// Patch source file name
        name: String,
        /// Size declared by the patch header
        declared: u64,
        /// Size of the file
        actual: u64,
    },

    /// A patch source does not decompress to its declared size
    #[error("Patch source {name} decompresses to {actual} bytes, declared {declared}")]
    PatchSourceMemory {
        /// Patch source file name
        name: String,
        /// Size declared by the patch header
        declared: u64,
        /// Decompressed size stated by the source header
        actual: u64,
    },

    /// A loader step ran without the output of the step before it
    #[error("Loader state {0} is missing")]
    StageMissing(&'static str),

    /// A blocking worker task failed
    #[error("Worker failed: {0}")]
    Worker(String),
}

impl RuntimeError {
    /// Whether the error indicates corrupt container data
    pub fn is_corruption_error(&self) -> bool {
        match self {
            Self::Header(e) => e.is_format_error(),
            Self::Decode(e) | Self::Decompress(DecompressError::Decode(e)) => e.is_corruption_error(),
            Self::Body(_)
            | Self::Patch(_)
            | Self::PatchSourceSize { .. }
            | Self::PatchSourceMemory { .. } => true,
            _ => false,
        }
    }
}

/// Result type for pipeline operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;
