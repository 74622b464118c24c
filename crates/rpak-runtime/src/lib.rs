//! Concurrent loading pipeline for RPak asset containers
//!
//! Containers move through a fixed lifecycle, one state per loader step:
//! the file is opened, its header read, its body streamed through the
//! resumable decoder, patch pages rebuilt from earlier containers, and each
//! asset handed to the binding registered for its type. A shared registry
//! tracks every container by integer handle so any thread can poll status
//! while loads run on worker threads.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use rpak_formats::body::AssetTag;
//! use rpak_runtime::{AssetHandle, BindingTable, FnBinding, PakManager, PakStatus, RuntimeConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut bindings = BindingTable::new();
//! bindings.register(FnBinding::new(AssetTag::new(*b"txtr"), 8, "Texture", |asset| {
//!     Ok(AssetHandle(asset.guid()))
//! }))?;
//!
//! let manager = PakManager::new(RuntimeConfig::new("paks/Win64"), bindings)?;
//! let handle = manager.request_load("common.rpak")?;
//! assert_eq!(manager.wait_for(handle).await?, PakStatus::Loaded);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod assets;
pub mod binding;
pub mod config;
pub mod error;
pub mod files;
pub mod loader;
pub mod manager;
pub mod registry;
pub mod status;

pub use binding::{AssetBinding, AssetHandle, BindingTable, FnBinding, TypeInfo};
pub use config::RuntimeConfig;
pub use error::{BindingError, ConfigError, LoadError, RuntimeError, RuntimeResult};
pub use loader::{PakLoader, PakRuntime};
pub use manager::{PakManager, RepakReport};
pub use registry::{INVALID_PAK_HANDLE, LoadSummary, PakHandle, PakInfo};
pub use status::{PakStatus, QueryError};
