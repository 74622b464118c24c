//! Loaded-pak registry
//!
//! Every container known to the runtime has one record here, addressed by an
//! integer handle. The record table sits behind a single reader/writer lock:
//! status queries take the shared side, and the loader takes the exclusive
//! side only to move a record along the lifecycle graph or to store its
//! results. No decoding ever happens under the lock.
//!
//! # Handles
//!
//! Handles grow monotonically and map onto slots with `handle & mask`, so a
//! slot can be reused by a later handle. A handle whose slot now holds a
//! different record is stale and reports [`QueryError::InvalidHandle`].

use crate::error::{RuntimeError, RuntimeResult};
use crate::status::{PakStatus, QueryError};
use parking_lot::RwLock;
use rpak_formats::body::AssetTag;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tracing::debug;

/// Integer pak handle
pub type PakHandle = i32;

/// Handle value that never names a record
pub const INVALID_PAK_HANDLE: PakHandle = -1;

/// An asset the loader could not bind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedAsset {
    /// Asset GUID
    pub guid: u64,
    /// Asset type as text
    pub tag: String,
    /// Why it was skipped
    pub reason: String,
}

/// Outcome of the asset stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    /// Assets loaded fresh
    pub bound: usize,
    /// Assets that took over a GUID bound by another container
    pub replaced: usize,
    /// Assets that were not bound
    pub skipped: usize,
    /// Details of every skip
    pub skips: Vec<SkippedAsset>,
}

impl LoadSummary {
    /// Record a skipped asset
    pub fn skip(&mut self, guid: u64, tag: AssetTag, reason: impl Into<String>) {
        self.skipped += 1;
        self.skips.push(SkippedAsset {
            guid,
            tag: tag.to_string(),
            reason: reason.into(),
        });
    }
}

/// Snapshot of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PakInfo {
    /// Record handle
    pub handle: PakHandle,
    /// Container name as requested
    pub name: String,
    /// Current status
    pub status: PakStatus,
    /// Number of asset entries in the container
    pub asset_count: usize,
    /// GUIDs of the assets the container carries
    pub asset_guids: Vec<u64>,
    /// Asset stage outcome
    pub summary: LoadSummary,
    /// Failure message when the status is `ERROR`
    pub error: Option<String>,
}

#[derive(Debug)]
struct PakRecord {
    info: PakInfo,
    cancel: Arc<AtomicBool>,
}

#[derive(Debug)]
struct RecordTable {
    slots: Vec<Option<PakRecord>>,
    next_handle: PakHandle,
}

impl RecordTable {
    fn record(&self, handle: PakHandle, mask: usize) -> Option<&PakRecord> {
        if handle < 0 {
            return None;
        }
        self.slots
            .get(handle as usize & mask)
            .and_then(Option::as_ref)
            .filter(|r| r.info.handle == handle)
    }

    fn record_mut(&mut self, handle: PakHandle, mask: usize) -> Option<&mut PakRecord> {
        if handle < 0 {
            return None;
        }
        self.slots
            .get_mut(handle as usize & mask)
            .and_then(Option::as_mut)
            .filter(|r| r.info.handle == handle)
    }
}

/// Handle-addressed table of pak records
#[derive(Debug)]
pub struct PakRegistry {
    table: RwLock<RecordTable>,
    mask: usize,
    changed: Notify,
}

impl PakRegistry {
    /// Registry with `capacity` slots, rounded up to a power of two
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        Self {
            table: RwLock::new(RecordTable {
                slots: (0..capacity).map(|_| None).collect(),
                next_handle: 0,
            }),
            mask: capacity - 1,
            changed: Notify::new(),
        }
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Create a `LOAD_PENDING` record for `name`
    ///
    /// Returns the new handle and the cancel flag the loader polls.
    pub fn allocate(&self, name: &str) -> RuntimeResult<(PakHandle, Arc<AtomicBool>)> {
        let mut table = self.table.write();
        let capacity = self.capacity();

        for _ in 0..capacity {
            let handle = table.next_handle;
            table.next_handle = handle.wrapping_add(1) & PakHandle::MAX;

            let slot = &mut table.slots[handle as usize & self.mask];
            if slot.is_some() {
                continue;
            }

            let cancel = Arc::new(AtomicBool::new(false));
            *slot = Some(PakRecord {
                info: PakInfo {
                    handle,
                    name: name.to_string(),
                    status: PakStatus::LoadPending,
                    asset_count: 0,
                    asset_guids: Vec::new(),
                    summary: LoadSummary::default(),
                    error: None,
                },
                cancel: Arc::clone(&cancel),
            });
            debug!(handle, name, "allocated pak record");
            drop(table);
            self.changed.notify_waiters();
            return Ok((handle, cancel));
        }

        Err(RuntimeError::RegistryFull(capacity))
    }

    /// Current status, without blocking on a writer
    pub fn status(&self, handle: PakHandle) -> Result<PakStatus, QueryError> {
        let table = self.table.try_read().ok_or(QueryError::Busy)?;
        table
            .record(handle, self.mask)
            .map(|r| r.info.status)
            .ok_or(QueryError::InvalidHandle)
    }

    /// Current status, waiting for a writer to finish
    pub fn status_blocking(&self, handle: PakHandle) -> Result<PakStatus, QueryError> {
        self.table
            .read()
            .record(handle, self.mask)
            .map(|r| r.info.status)
            .ok_or(QueryError::InvalidHandle)
    }

    /// Snapshot of a record
    pub fn info(&self, handle: PakHandle) -> Result<PakInfo, QueryError> {
        self.table
            .read()
            .record(handle, self.mask)
            .map(|r| r.info.clone())
            .ok_or(QueryError::InvalidHandle)
    }

    /// Most recent live record with the given name
    pub fn find_by_name(&self, name: &str) -> Option<PakInfo> {
        self.table
            .read()
            .slots
            .iter()
            .flatten()
            .filter(|r| r.info.name == name)
            .max_by_key(|r| r.info.handle)
            .map(|r| r.info.clone())
    }

    /// Snapshots of every live record, ordered by handle
    pub fn list(&self) -> Vec<PakInfo> {
        let mut records: Vec<PakInfo> = self
            .table
            .read()
            .slots
            .iter()
            .flatten()
            .map(|r| r.info.clone())
            .collect();
        records.sort_by_key(|r| r.handle);
        records
    }

    /// Move a record along the lifecycle graph
    ///
    /// Reaching `FREED` releases the record's slot. Returns the previous status.
    pub fn transition(&self, handle: PakHandle, to: PakStatus) -> RuntimeResult<PakStatus> {
        self.transition_with(handle, to, |_| {})
    }

    /// Move a record to `ERROR` and store the failure message
    pub fn fail(&self, handle: PakHandle, message: String) -> RuntimeResult<PakStatus> {
        self.transition_with(handle, PakStatus::Error, |info| info.error = Some(message))
    }

    fn transition_with(
        &self,
        handle: PakHandle,
        to: PakStatus,
        update: impl FnOnce(&mut PakInfo),
    ) -> RuntimeResult<PakStatus> {
        let mut table = self.table.write();
        let record = table
            .record_mut(handle, self.mask)
            .ok_or(QueryError::InvalidHandle)?;

        let from = record.info.status;
        if !from.can_transition_to(to) {
            return Err(RuntimeError::InvalidTransition { from, to });
        }
        // A canceled load may only leave the load path through CANCELING or ERROR
        if (to.is_loading() || to == PakStatus::Loaded) && record.cancel.load(Ordering::Acquire) {
            return Err(RuntimeError::Canceled);
        }
        record.info.status = to;
        update(&mut record.info);
        debug!(handle, from = %from, to = %to, "pak status changed");

        if to == PakStatus::Freed {
            table.slots[handle as usize & self.mask] = None;
        }
        drop(table);
        self.changed.notify_waiters();
        Ok(from)
    }

    /// Store the asset table of a parsed container
    pub fn set_assets(&self, handle: PakHandle, guids: Vec<u64>) -> Result<(), QueryError> {
        let mut table = self.table.write();
        let record = table
            .record_mut(handle, self.mask)
            .ok_or(QueryError::InvalidHandle)?;
        record.info.asset_count = guids.len();
        record.info.asset_guids = guids;
        Ok(())
    }

    /// Store the asset stage outcome
    pub fn set_summary(&self, handle: PakHandle, summary: LoadSummary) -> Result<(), QueryError> {
        let mut table = self.table.write();
        let record = table
            .record_mut(handle, self.mask)
            .ok_or(QueryError::InvalidHandle)?;
        record.info.summary = summary;
        Ok(())
    }

    /// Ask the loader driving `handle` to stop
    ///
    /// Returns false without setting the flag when the record has already
    /// left the load path.
    pub fn request_cancel(&self, handle: PakHandle) -> Result<bool, QueryError> {
        let table = self.table.read();
        let record = table
            .record(handle, self.mask)
            .ok_or(QueryError::InvalidHandle)?;
        if !record.info.status.is_loading() {
            return Ok(false);
        }
        record.cancel.store(true, Ordering::Release);
        Ok(true)
    }

    /// Wait until the record settles or disappears
    ///
    /// A record that is released while waiting reports `FREED`.
    pub async fn wait_settled(&self, handle: PakHandle) -> Result<PakStatus, QueryError> {
        let mut seen = false;
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.status_blocking(handle) {
                Ok(status) if status.is_settled() => return Ok(status),
                Ok(_) => seen = true,
                Err(QueryError::InvalidHandle) if seen => return Ok(PakStatus::Freed),
                Err(e) => return Err(e),
            }

            notified.await;
        }
    }
}
