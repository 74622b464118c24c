//! Async front-end for the loading pipeline
//!
//! [`PakManager`] queues loads on tokio's blocking pool, at most
//! `worker_threads` at a time, and exposes the registry queries callers poll.
//! Loads are tracked entirely through the registry: a request returns a
//! handle immediately and [`PakManager::wait_for`] resolves once the record
//! settles.

use crate::binding::{BindingTable, TypeInfo};
use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::loader::{PakLoader, PakRuntime};
use crate::registry::{PakHandle, PakInfo};
use crate::status::{PakStatus, QueryError};
use memmap2::MmapOptions;
use rpak_formats::decompress_to_writer;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Result of a decompress-to-disk request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepakReport {
    /// Handle the request was tracked under
    pub handle: PakHandle,
    /// Container that was read
    pub input: PathBuf,
    /// Decompressed container that was written
    pub output: PathBuf,
    /// Bytes written
    pub size: u64,
}

/// Pak loading service
#[derive(Debug, Clone)]
pub struct PakManager {
    runtime: Arc<PakRuntime>,
    workers: Arc<Semaphore>,
}

impl PakManager {
    /// Create a manager for a configuration and a set of bindings
    pub fn new(config: RuntimeConfig, bindings: BindingTable) -> RuntimeResult<Self> {
        let workers = Arc::new(Semaphore::new(config.worker_threads));
        let runtime = Arc::new(PakRuntime::new(config, bindings)?);
        Ok(Self { runtime, workers })
    }

    /// Shared pipeline services
    pub fn runtime(&self) -> &Arc<PakRuntime> {
        &self.runtime
    }

    /// Queue a load and return its handle
    ///
    /// Must be called from within a tokio runtime.
    pub fn request_load(&self, name: &str) -> RuntimeResult<PakHandle> {
        let mut loader = PakLoader::create(Arc::clone(&self.runtime), name)?;
        let handle = loader.handle();
        let runtime = Arc::clone(&self.runtime);
        let workers = Arc::clone(&self.workers);
        debug!(handle, name, "load queued");

        tokio::spawn(async move {
            let Ok(_permit) = workers.acquire_owned().await else {
                if let Err(e) = runtime.registry.fail(handle, "Worker pool closed".to_string()) {
                    warn!(handle, error = %e, "failed to mark pak as errored");
                }
                return;
            };
            match tokio::task::spawn_blocking(move || loader.run()).await {
                Ok(status) => debug!(handle, status = %status, "load worker finished"),
                Err(e) => {
                    warn!(handle, error = %e, "load worker failed");
                    let message = RuntimeError::Worker(e.to_string()).to_string();
                    if let Err(e) = runtime.registry.fail(handle, message) {
                        warn!(handle, error = %e, "failed to mark pak as errored");
                    }
                }
            }
        });

        Ok(handle)
    }

    /// Load a container on the calling thread
    ///
    /// Returns the record snapshot once the load settles. A load canceled
    /// from another thread reports [`RuntimeError::Canceled`].
    pub fn load_blocking(&self, name: &str) -> RuntimeResult<PakInfo> {
        let mut loader = PakLoader::create(Arc::clone(&self.runtime), name)?;
        match loader.run() {
            PakStatus::Freed => Err(RuntimeError::Canceled),
            _ => loader.info(),
        }
    }

    /// Wait until a record settles
    ///
    /// A record released while waiting reports `FREED`.
    pub async fn wait_for(&self, handle: PakHandle) -> Result<PakStatus, QueryError> {
        self.runtime.registry.wait_settled(handle).await
    }

    /// Unload a loaded container, release a failed one, or cancel a load in flight
    pub fn request_unload(&self, handle: PakHandle) -> RuntimeResult<()> {
        self.runtime.unload(handle)
    }

    /// Unload the most recent record with the given name
    pub fn unload_by_name(&self, name: &str) -> RuntimeResult<PakHandle> {
        let info = self
            .runtime
            .registry
            .find_by_name(name)
            .ok_or_else(|| RuntimeError::NotFound(name.to_string()))?;
        self.request_unload(info.handle)?;
        Ok(info.handle)
    }

    /// Unload a container and load it again from disk
    ///
    /// Waits until the old record is released before queuing the new load.
    pub async fn swap(&self, handle: PakHandle) -> RuntimeResult<PakHandle> {
        let name = self.runtime.registry.info(handle)?.name;
        self.request_unload(handle)?;

        loop {
            match self.wait_for(handle).await {
                Ok(PakStatus::Freed) | Err(QueryError::InvalidHandle) => break,
                // The load failed before it saw the cancel request
                Ok(_) => self.request_unload(handle)?,
                Err(e) => return Err(e.into()),
            }
        }

        info!(old = handle, name = %name, "swapping pak");
        self.request_load(&name)
    }

    /// Decompress a container from the base directory into the override
    /// directory
    ///
    /// The request holds a registry record in `REPAK_RUNNING` while it works
    /// and releases it afterwards, whether or not it succeeded.
    pub async fn request_repak(&self, name: &str) -> RuntimeResult<RepakReport> {
        let config = &self.runtime.config;
        let input = if Path::new(name).is_absolute() {
            PathBuf::from(name)
        } else {
            config.base_path.join(name)
        };
        let file_name = input
            .file_name()
            .ok_or_else(|| RuntimeError::NotFound(name.to_string()))?;
        let output = config.override_path.join(file_name);

        let registry = &self.runtime.registry;
        let (handle, _) = registry.allocate(name)?;
        registry.transition(handle, PakStatus::RepakRunning)?;

        let paths = (input.clone(), output.clone());
        let result = match tokio::task::spawn_blocking(move || repak_file(&paths.0, &paths.1)).await {
            Ok(result) => result,
            Err(e) => Err(RuntimeError::Worker(e.to_string())),
        };

        match result {
            Ok(size) => {
                registry.transition(handle, PakStatus::RepakDone)?;
                info!(handle, input = %input.display(), output = %output.display(), size, "pak decompressed to disk");
                self.request_unload(handle)?;
                Ok(RepakReport {
                    handle,
                    input,
                    output,
                    size,
                })
            }
            Err(error) => {
                warn!(handle, input = %input.display(), %error, "repak failed");
                registry.fail(handle, error.to_string())?;
                self.request_unload(handle)?;
                Err(error)
            }
        }
    }

    /// Current status, without blocking on a writer
    pub fn status(&self, handle: PakHandle) -> Result<PakStatus, QueryError> {
        self.runtime.registry.status(handle)
    }

    /// Snapshot of a record
    pub fn info(&self, handle: PakHandle) -> Result<PakInfo, QueryError> {
        self.runtime.registry.info(handle)
    }

    /// Snapshots of every live record
    pub fn list_paks(&self) -> Vec<PakInfo> {
        self.runtime.registry.list()
    }

    /// Registered asset types
    pub fn list_types(&self) -> Vec<TypeInfo> {
        self.runtime.bindings.list()
    }

    /// Run every binding's maintenance callback
    pub fn run_maintenance(&self) {
        self.runtime.bindings.maintain_all();
    }
}

/// Write the decompressed form of `input` to `output`
///
/// The output is written next to its final path and renamed into place, so
/// `input` and `output` may name the same file.
fn repak_file(input: &Path, output: &Path) -> RuntimeResult<u64> {
    let file = File::open(input).map_err(|source| RuntimeError::Open {
        path: input.to_path_buf(),
        source,
    })?;

    #[allow(unsafe_code)]
    let mmap = unsafe { MmapOptions::new().map(&file)? };

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let staging = output.with_extension("rpak.tmp");
    let mut writer = BufWriter::new(File::create(&staging)?);
    let size = decompress_to_writer(&mmap, &mut writer)?;
    writer.flush()?;
    drop(writer);
    drop(mmap);

    std::fs::rename(&staging, output)?;
    Ok(size)
}
