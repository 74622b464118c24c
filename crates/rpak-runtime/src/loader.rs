//! Per-container load state machine
//!
//! A [`PakLoader`] drives one registry record from `LOAD_PENDING` to
//! `LOADED`, one state per [`step`](PakLoader::step):
//!
//! ```text
//! LOAD_PENDING          resolve the file, take a file slot
//! LOAD_STARTING         enter LOAD_PAKHDR, read and validate the header
//! LOAD_PAKHDR           stream the file through the decoder, parse the tables
//! LOAD_PATCH_INIT       check every patch source against its size overrides
//! LOAD_PATCH_EDIT_STREAM decode the sources into the edit stream patcher
//! LOAD_ASSETS           bind each asset through the dispatch table
//! ```
//!
//! Cancellation is cooperative: the flag is read before every step and
//! between decoder chunks. A canceled loader unbinds whatever it bound and
//! releases its record.

use crate::assets::{AssetIndex, BoundAsset};
use crate::binding::BindingTable;
use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::files::{FileSlot, FileSlots};
use crate::registry::{LoadSummary, PakHandle, PakInfo, PakRegistry};
use crate::status::PakStatus;
use rpak_formats::body::{PageTable, PakBody};
use rpak_formats::decode::{self, DecodeContext, DecodeError, InputRing};
use rpak_formats::header::{HEADER_SIZE, PakHeader};
use rpak_formats::naming::patch_file_name;
use rpak_formats::patch::{EditStream, EditStreamPatcher};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Most buffer space reserved up front from a header's declared sizes
const MAX_PREALLOCATION: u64 = 1 << 24;

/// Services shared by every loader
#[derive(Debug)]
pub struct PakRuntime {
    /// Pipeline configuration
    pub config: RuntimeConfig,
    /// Record table
    pub registry: PakRegistry,
    /// Open file slots
    pub files: Arc<FileSlots>,
    /// Bound assets
    pub assets: AssetIndex,
    /// Asset type bindings
    pub bindings: BindingTable,
}

impl PakRuntime {
    /// Runtime for a validated configuration
    pub fn new(config: RuntimeConfig, bindings: BindingTable) -> RuntimeResult<Self> {
        config.validate()?;
        Ok(Self {
            registry: PakRegistry::new(config.max_loaded_paks),
            files: Arc::new(FileSlots::new(config.max_open_files)),
            assets: AssetIndex::new(),
            bindings,
            config,
        })
    }

    /// Locate a container, preferring the override directory
    pub fn resolve(&self, name: &str) -> RuntimeResult<PathBuf> {
        let direct = Path::new(name);
        if direct.is_absolute() {
            return if direct.is_file() {
                Ok(direct.to_path_buf())
            } else {
                Err(RuntimeError::NotFound(name.to_string()))
            };
        }

        [&self.config.override_path, &self.config.base_path]
            .into_iter()
            .map(|dir| dir.join(name))
            .find(|path| path.is_file())
            .ok_or_else(|| RuntimeError::NotFound(name.to_string()))
    }

    /// Release a settled record
    ///
    /// `LOADED` records run their unload hooks first. Records still loading
    /// are asked to cancel and release themselves.
    pub fn unload(&self, handle: PakHandle) -> RuntimeResult<()> {
        loop {
            let status = self.registry.status_blocking(handle)?;
            if status.is_loading() {
                // The load may settle between the query and the request
                if self.registry.request_cancel(handle)? {
                    debug!(handle, status = %status, "cancel requested");
                    return Ok(());
                }
                continue;
            }
            return self.release(handle, status);
        }
    }

    fn release(&self, handle: PakHandle, status: PakStatus) -> RuntimeResult<()> {
        match status {
            PakStatus::Loaded => {
                self.registry.transition(handle, PakStatus::UnloadPending)?;
                let released = self.unbind_owned(handle);
                self.registry.transition(handle, PakStatus::FreePending)?;
                self.registry.transition(handle, PakStatus::Freed)?;
                info!(handle, released, "pak unloaded");
                Ok(())
            }
            PakStatus::Error | PakStatus::RepakDone => {
                self.registry.transition(handle, PakStatus::FreePending)?;
                self.unbind_owned(handle);
                self.registry.transition(handle, PakStatus::Freed)?;
                debug!(handle, from = %status, "pak record released");
                Ok(())
            }
            status => Err(RuntimeError::InvalidTransition {
                from: status,
                to: PakStatus::UnloadPending,
            }),
        }
    }

    /// Unload every asset `owner` still owns, returning how many there were
    fn unbind_owned(&self, owner: PakHandle) -> usize {
        let _stage = self.assets.stage();
        let owned = self.assets.remove_owned_by(owner);
        for (_, asset) in &owned {
            self.bindings.dispatch_unload(asset.tag, asset.handle);
        }
        owned.len()
    }
}

/// Header and on-disk size of a patch source
#[derive(Debug, Clone)]
struct PatchSource {
    name: String,
    path: PathBuf,
    header: PakHeader,
}

/// State machine for one container
#[derive(Debug)]
pub struct PakLoader {
    runtime: Arc<PakRuntime>,
    handle: PakHandle,
    name: String,
    cancel: Arc<AtomicBool>,
    status: PakStatus,
    file: Option<FileSlot>,
    header: Option<PakHeader>,
    data: Vec<u8>,
    body: Option<PakBody>,
    sources: Vec<PatchSource>,
    patched: Vec<u8>,
}

impl PakLoader {
    /// Allocate a record for `name` and a loader to drive it
    pub fn create(runtime: Arc<PakRuntime>, name: &str) -> RuntimeResult<Self> {
        let (handle, cancel) = runtime.registry.allocate(name)?;
        Ok(Self::attach(runtime, handle, name, cancel))
    }

    /// Loader for a record that is already `LOAD_PENDING`
    pub fn attach(
        runtime: Arc<PakRuntime>,
        handle: PakHandle,
        name: &str,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            runtime,
            handle,
            name: name.to_string(),
            cancel,
            status: PakStatus::LoadPending,
            file: None,
            header: None,
            data: Vec::new(),
            body: None,
            sources: Vec::new(),
            patched: Vec::new(),
        }
    }

    /// Handle of the record this loader drives
    pub fn handle(&self) -> PakHandle {
        self.handle
    }

    /// Status after the last step
    pub fn status(&self) -> PakStatus {
        self.status
    }

    /// Drive the record until it settles
    pub fn run(&mut self) -> PakStatus {
        while !self.status.is_settled() {
            let before = self.status;
            if let Err(error) = self.step() {
                self.abort(&error);
            } else if self.status == before {
                break;
            }
        }
        self.status
    }

    /// Perform the work of the current state and advance to the next one
    pub fn step(&mut self) -> RuntimeResult<PakStatus> {
        if self.status.is_loading() && self.cancel.load(Ordering::Acquire) {
            return Err(RuntimeError::Canceled);
        }

        let result = match self.status {
            PakStatus::LoadPending => self.start(),
            PakStatus::LoadStarting => self.read_header(),
            PakStatus::LoadPakHdr => self.decompress(),
            PakStatus::LoadPatchInit => self.init_patch(),
            PakStatus::LoadPatchEditStream => self.apply_patch(),
            PakStatus::LoadAssets => self.bind_assets(),
            _ => Ok(()),
        };
        result.map(|()| self.status)
    }

    fn advance(&mut self, to: PakStatus) -> RuntimeResult<()> {
        self.runtime.registry.transition(self.handle, to)?;
        self.status = to;
        Ok(())
    }

    fn check_cancel(&self) -> RuntimeResult<()> {
        if self.cancel.load(Ordering::Acquire) {
            return Err(RuntimeError::Canceled);
        }
        Ok(())
    }

    fn start(&mut self) -> RuntimeResult<()> {
        let path = self.runtime.resolve(&self.name)?;
        debug!(handle = self.handle, path = %path.display(), "opening pak");
        self.file = Some(self.runtime.files.open(&path)?);
        self.advance(PakStatus::LoadStarting)
    }

    fn read_header(&mut self) -> RuntimeResult<()> {
        self.advance(PakStatus::LoadPakHdr)?;
        let file = self.file.as_ref().ok_or(RuntimeError::StageMissing("file"))?;
        let header = read_header(file, file.len())?;
        debug!(
            handle = self.handle,
            compressed = header.compressed_size,
            decompressed = header.decompressed_size,
            assets = header.asset_count,
            patch_index = header.patch_index,
            "pak header read"
        );
        self.header = Some(header);
        Ok(())
    }

    fn decompress(&mut self) -> RuntimeResult<()> {
        let header = self.header.clone().ok_or(RuntimeError::StageMissing("header"))?;
        let file = self.file.take().ok_or(RuntimeError::StageMissing("file"))?;

        let mut data = Vec::with_capacity(header.decompressed_size.min(MAX_PREALLOCATION) as usize);
        data.extend_from_slice(&header.decompressed().build()?);
        stream_payload(&self.runtime.config, &file, &header, &self.cancel, |chunk| {
            data.extend_from_slice(chunk);
            true
        })?;
        drop(file);

        let layout = header.decompressed();
        let body = PakBody::parse(&data, &layout)?;
        self.runtime
            .registry
            .set_assets(self.handle, body.assets.iter().map(|a| a.guid).collect())?;
        debug!(
            handle = self.handle,
            bytes = data.len(),
            pages = body.pages.len(),
            "pak decompressed"
        );

        self.data = data;
        let patched = body.patch.is_some();
        self.body = Some(body);
        self.advance(if patched {
            PakStatus::LoadPatchInit
        } else {
            PakStatus::LoadAssets
        })
    }

    fn init_patch(&mut self) -> RuntimeResult<()> {
        let body = self.body.as_ref().ok_or(RuntimeError::StageMissing("body"))?;
        let patch = body.patch.as_ref().ok_or(RuntimeError::StageMissing("patch"))?;

        let mut sources = Vec::with_capacity(patch.files.len());
        for (file_header, &number) in patch.files.iter().zip(&patch.numbers) {
            self.check_cancel()?;
            let name = patch_file_name(&self.name, number);
            let path = self.runtime.resolve(&name)?;
            let file = self.runtime.files.open(&path)?;

            if file.len() < file_header.size_disk {
                return Err(RuntimeError::PatchSourceSize {
                    name,
                    declared: file_header.size_disk,
                    actual: file.len(),
                });
            }
            let mut header = read_header(&file, file_header.size_disk)?;
            if header.decompressed_size != file_header.size_memory {
                return Err(RuntimeError::PatchSourceMemory {
                    name,
                    declared: file_header.size_memory,
                    actual: header.decompressed_size,
                });
            }
            header.compressed_size = file_header.size_disk;

            debug!(handle = self.handle, source = %name, "patch source ready");
            sources.push(PatchSource { name, path, header });
        }

        self.sources = sources;
        self.advance(PakStatus::LoadPatchEditStream)
    }

    fn apply_patch(&mut self) -> RuntimeResult<()> {
        let body = self.body.as_ref().ok_or(RuntimeError::StageMissing("body"))?;
        let stream = EditStream::parse(&body.edit_stream)?;
        let mut patcher = EditStreamPatcher::new(&stream);

        for source in &self.sources {
            if patcher.is_complete() {
                break;
            }
            self.check_cancel()?;
            let file = self.runtime.files.open(&source.path)?;
            stream_payload(&self.runtime.config, &file, &source.header, &self.cancel, |chunk| {
                patcher.feed(chunk);
                !patcher.is_complete()
            })?;
            debug!(
                handle = self.handle,
                source = %source.name,
                consumed = patcher.source_consumed(),
                "patch source applied"
            );
        }

        self.patched = patcher.finish(body.patched_size())?;
        self.advance(PakStatus::LoadAssets)
    }

    fn bind_assets(&mut self) -> RuntimeResult<()> {
        let body = self.body.take().ok_or(RuntimeError::StageMissing("body"))?;
        let pages: PageTable = body.page_table(&self.data, std::mem::take(&mut self.patched))?;
        let runtime = Arc::clone(&self.runtime);
        let mut summary = LoadSummary::default();

        for index in 0..body.assets.len() {
            let asset = body.asset_data(index, &pages)?;
            let (guid, tag) = (asset.guid(), asset.tag());

            let _stage = runtime.assets.stage();
            let result = match runtime.assets.get(guid) {
                Some(previous) if previous.owner != self.handle && previous.tag == tag => runtime
                    .bindings
                    .dispatch_replace(tag, previous.handle, &asset)
                    .map(|h| (h, true)),
                Some(previous) if previous.owner != self.handle => {
                    runtime.assets.remove(guid);
                    runtime.bindings.dispatch_unload(previous.tag, previous.handle);
                    runtime.bindings.dispatch_load(tag, &asset).map(|h| (h, true))
                }
                _ => runtime.bindings.dispatch_load(tag, &asset).map(|h| (h, false)),
            };

            match result {
                Ok((handle, replaced)) => {
                    runtime.assets.insert(
                        guid,
                        BoundAsset {
                            owner: self.handle,
                            tag,
                            handle,
                        },
                    );
                    if replaced {
                        summary.replaced += 1;
                    } else {
                        summary.bound += 1;
                    }
                }
                Err(error) => {
                    warn!(
                        handle = self.handle,
                        guid = format_args!("{guid:#018x}"),
                        tag = %tag,
                        %error,
                        "asset skipped"
                    );
                    summary.skip(guid, tag, error.to_string());
                }
            }
        }

        let (bound, replaced, skipped) = (summary.bound, summary.replaced, summary.skipped);
        runtime.registry.set_summary(self.handle, summary)?;
        self.data = Vec::new();
        self.check_cancel()?;
        self.advance(PakStatus::Loaded)?;
        info!(handle = self.handle, name = %self.name, bound, replaced, skipped, "pak loaded");
        Ok(())
    }

    /// Move the record out of a failed or canceled load
    fn abort(&mut self, error: &RuntimeError) {
        self.file = None;
        self.data = Vec::new();
        self.body = None;

        let result = if matches!(error, RuntimeError::Canceled) {
            self.cancel_load()
        } else {
            warn!(handle = self.handle, name = %self.name, %error, "pak load failed");
            self.runtime
                .registry
                .fail(self.handle, error.to_string())
                .map(|_| PakStatus::Error)
        };

        self.status = match result {
            Ok(status) => status,
            Err(e) => {
                warn!(handle = self.handle, error = %e, "pak record lost during abort");
                PakStatus::Freed
            }
        };
    }

    fn cancel_load(&self) -> RuntimeResult<PakStatus> {
        let registry = &self.runtime.registry;
        registry.transition(self.handle, PakStatus::Canceling)?;
        let released = self.runtime.unbind_owned(self.handle);
        registry.transition(self.handle, PakStatus::FreePending)?;
        registry.transition(self.handle, PakStatus::Freed)?;
        info!(handle = self.handle, name = %self.name, released, "pak load canceled");
        Ok(PakStatus::Freed)
    }

    /// Snapshot of the record
    pub fn info(&self) -> RuntimeResult<PakInfo> {
        Ok(self.runtime.registry.info(self.handle)?)
    }
}

/// Read and validate the header of a file whose usable length is `available`
fn read_header(file: &FileSlot, available: u64) -> RuntimeResult<PakHeader> {
    let mut bytes = [0u8; HEADER_SIZE];
    let want = available.min(HEADER_SIZE as u64) as usize;
    file.read_exact_at(0, &mut bytes[..want])?;
    Ok(PakHeader::read_from(&mut Cursor::new(&bytes[..want]), available)?)
}

/// Stream the decompressed payload of a container (everything after its
/// header) into `sink` in chunks
///
/// Compressed files pass through an input ring of `input_buffer_size` bytes
/// that is refilled as the decoder releases history; `sink` returning false
/// stops early.
fn stream_payload<F>(
    config: &RuntimeConfig,
    file: &FileSlot,
    header: &PakHeader,
    cancel: &AtomicBool,
    mut sink: F,
) -> RuntimeResult<()>
where
    F: FnMut(&[u8]) -> bool,
{
    let header_size = header.header_size();
    let mut buffer = vec![0u8; config.decode_chunk_size];

    if !header.is_compressed() {
        let mut position = header_size;
        while position < header.decompressed_size {
            if cancel.load(Ordering::Acquire) {
                return Err(RuntimeError::Canceled);
            }
            let len = (header.decompressed_size - position).min(buffer.len() as u64) as usize;
            file.read_exact_at(position, &mut buffer[..len])?;
            position += len as u64;
            if !sink(&buffer[..len]) {
                break;
            }
        }
        return Ok(());
    }

    let end = header.compressed_size;
    let mut ring = vec![0u8; config.input_buffer_size];
    let ring_len = ring.len() as u64;
    let mask = ring_len - 1;
    let mut streamed = 0u64;

    let fill = |ring: &mut [u8], streamed: &mut u64, upto: u64| -> std::io::Result<()> {
        let target = upto.min(end);
        while *streamed < target {
            let at = (*streamed & mask) as usize;
            let len = (target - *streamed).min(ring_len - at as u64) as usize;
            file.read_exact_at(*streamed, &mut ring[at..at + len])?;
            *streamed += len as u64;
        }
        Ok(())
    };

    fill(&mut ring, &mut streamed, ring_len)?;
    let view = InputRing::ring(&ring, streamed)?;
    let (mut context, _) = DecodeContext::with_window(&view, header_size, end, config.max_window)?;
    decode::check_declared_size(&context, header)?;

    let mut stalled_at = None;
    while !context.is_finished() {
        if cancel.load(Ordering::Acquire) {
            return Err(RuntimeError::Canceled);
        }
        fill(&mut ring, &mut streamed, context.retain_from() + ring_len)?;
        let view = InputRing::ring(&ring, streamed)?;

        let before = context.total_out();
        match context.decompress_chunk_ring(&view, &mut buffer) {
            Ok(written) => {
                stalled_at = None;
                if !sink(&buffer[..written]) {
                    return Ok(());
                }
            }
            Err(error @ DecodeError::TruncatedInput { .. }) => {
                let delivered = (context.total_out() - before) as usize;
                if streamed >= end || (delivered == 0 && stalled_at == Some(streamed)) {
                    return Err(error.into());
                }
                stalled_at = Some(streamed);
                if delivered > 0 && !sink(&buffer[..delivered]) {
                    return Ok(());
                }
            }
            Err(error) => return Err(error.into()),
        }
    }

    Ok(())
}
