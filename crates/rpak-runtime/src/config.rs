//! Runtime configuration
//!
//! Containers are looked up in two directories: the override directory wins
//! over the base directory, and decompress-to-disk writes from the base
//! directory into the override directory.

use crate::error::ConfigError;
use rpak_formats::decode::DEFAULT_MAX_WINDOW;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default base directory for containers
pub const DEFAULT_BASE_PATH: &str = "paks/Win64";

/// Default override directory for containers
pub const DEFAULT_OVERRIDE_PATH: &str = "paks/Win32";

/// Configuration for the loading pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Directory holding the shipped containers
    pub base_path: PathBuf,

    /// Directory searched before `base_path`, and the repak output directory
    pub override_path: PathBuf,

    /// Registry capacity, a power of two
    pub max_loaded_paks: usize,

    /// Number of container files that may be open at once
    pub max_open_files: usize,

    /// Output chunk size for each decoder call
    pub decode_chunk_size: usize,

    /// Input ring size for streamed decoding, a power of two
    pub input_buffer_size: usize,

    /// Upper bound on the decoder's history window, a power of two
    pub max_window: u64,

    /// Number of loads that may run concurrently
    pub worker_threads: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from(DEFAULT_BASE_PATH),
            override_path: PathBuf::from(DEFAULT_OVERRIDE_PATH),
            max_loaded_paks: 512,
            max_open_files: 16,
            decode_chunk_size: 1024 * 1024,     // 1 MiB
            input_buffer_size: 4 * 1024 * 1024, // 4 MiB
            max_window: DEFAULT_MAX_WINDOW,
            worker_threads: 4,
        }
    }
}

impl RuntimeConfig {
    /// Create a configuration rooted at `base_path`
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Load a configuration from a JSON file
    ///
    /// Missing fields take their default values.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the base directory
    #[must_use]
    pub fn with_base_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.base_path = path.as_ref().to_path_buf();
        self
    }

    /// Set the override directory
    #[must_use]
    pub fn with_override_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.override_path = path.as_ref().to_path_buf();
        self
    }

    /// Set the registry capacity
    #[must_use]
    pub const fn with_max_loaded_paks(mut self, count: usize) -> Self {
        self.max_loaded_paks = count;
        self
    }

    /// Set the number of file slots
    #[must_use]
    pub const fn with_max_open_files(mut self, count: usize) -> Self {
        self.max_open_files = count;
        self
    }

    /// Set the decoder output chunk size
    #[must_use]
    pub const fn with_decode_chunk_size(mut self, size: usize) -> Self {
        self.decode_chunk_size = size;
        self
    }

    /// Set the input ring size
    #[must_use]
    pub const fn with_input_buffer_size(mut self, size: usize) -> Self {
        self.input_buffer_size = size;
        self
    }

    /// Set the history window bound
    #[must_use]
    pub const fn with_max_window(mut self, size: u64) -> Self {
        self.max_window = size;
        self
    }

    /// Set the number of concurrent loads
    #[must_use]
    pub const fn with_worker_threads(mut self, count: usize) -> Self {
        self.worker_threads = count;
        self
    }

    /// Check that every value is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::InvalidValue {
                field,
                reason: reason.into(),
            }
        }

        if !self.max_loaded_paks.is_power_of_two() || self.max_loaded_paks < 2 {
            return Err(invalid(
                "max_loaded_paks",
                format!("{} is not a power of two >= 2", self.max_loaded_paks),
            ));
        }
        if self.max_loaded_paks > 1 << 16 {
            return Err(invalid("max_loaded_paks", "must not exceed 65536"));
        }
        if self.max_open_files == 0 {
            return Err(invalid("max_open_files", "must be at least 1"));
        }
        if self.decode_chunk_size == 0 {
            return Err(invalid("decode_chunk_size", "must be at least 1"));
        }
        if !self.input_buffer_size.is_power_of_two() {
            return Err(invalid(
                "input_buffer_size",
                format!("{} is not a power of two", self.input_buffer_size),
            ));
        }
        if !self.max_window.is_power_of_two() {
            return Err(invalid(
                "max_window",
                format!("{} is not a power of two", self.max_window),
            ));
        }
        if self.worker_threads == 0 {
            return Err(invalid("worker_threads", "must be at least 1"));
        }
        Ok(())
    }
}
