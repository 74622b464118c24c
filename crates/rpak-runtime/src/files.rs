//! Bounded table of open container files
//!
//! A loader holds at most one slot at a time. Claiming a slot takes the write
//! lock only long enough to mark it used; opening and reading the file happen
//! outside the lock. When every slot is taken, [`FileSlots::open`] blocks
//! until one is released.

use crate::error::{RuntimeError, RuntimeResult};
use parking_lot::{Condvar, Mutex, RwLock};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
struct SlotEntry {
    path: PathBuf,
    file: Option<Arc<File>>,
}

/// File slot table
#[derive(Debug)]
pub struct FileSlots {
    slots: RwLock<Vec<Option<SlotEntry>>>,
    gate: Mutex<()>,
    released: Condvar,
}

impl FileSlots {
    /// Table with `capacity` slots
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: RwLock::new((0..capacity.max(1)).map(|_| None).collect()),
            gate: Mutex::new(()),
            released: Condvar::new(),
        }
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.slots.read().len()
    }

    /// Number of slots in use
    pub fn in_use(&self) -> usize {
        self.slots.read().iter().filter(|s| s.is_some()).count()
    }

    /// Paths of the files currently held
    pub fn open_paths(&self) -> Vec<PathBuf> {
        self.slots
            .read()
            .iter()
            .flatten()
            .map(|entry| entry.path.clone())
            .collect()
    }

    fn try_claim(&self, path: &Path) -> Option<usize> {
        let mut slots = self.slots.write();
        let index = slots.iter().position(Option::is_none)?;
        slots[index] = Some(SlotEntry {
            path: path.to_path_buf(),
            file: None,
        });
        Some(index)
    }

    fn release(&self, index: usize) {
        if let Some(slot) = self.slots.write().get_mut(index) {
            *slot = None;
        }
        let _gate = self.gate.lock();
        self.released.notify_one();
    }

    /// Open `path` in a free slot, waiting for one if necessary
    pub fn open(self: &Arc<Self>, path: &Path) -> RuntimeResult<FileSlot> {
        let index = {
            let mut gate = self.gate.lock();
            loop {
                if let Some(index) = self.try_claim(path) {
                    break index;
                }
                debug!(path = %path.display(), "waiting for a free file slot");
                self.released.wait(&mut gate);
            }
        };

        let opened = File::open(path).and_then(|file| {
            let len = file.metadata()?.len();
            Ok((file, len))
        });
        let (file, len) = match opened {
            Ok(opened) => opened,
            Err(source) => {
                self.release(index);
                return Err(RuntimeError::Open {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let file = Arc::new(file);
        if let Some(Some(entry)) = self.slots.write().get_mut(index) {
            entry.file = Some(Arc::clone(&file));
        }

        Ok(FileSlot {
            table: Arc::clone(self),
            index,
            file,
            path: path.to_path_buf(),
            len,
        })
    }
}

/// An open file holding a slot; the slot is released on drop
#[derive(Debug)]
pub struct FileSlot {
    table: Arc<FileSlots>,
    index: usize,
    file: Arc<File>,
    path: PathBuf,
    len: u64,
}

impl FileSlot {
    /// Slot index
    pub fn index(&self) -> usize {
        self.index
    }

    /// Path the file was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File size
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the file is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fill `buf` from `offset`
    pub fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
        let mut file: &File = &self.file;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)
    }
}

impl Drop for FileSlot {
    fn drop(&mut self) {
        self.table.release(self.index);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    fn temp_file(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("Temp file should be created");
        file.write_all(content).expect("Content should be written");
        file
    }

    #[test]
    fn test_open_and_read() {
        let file = temp_file(b"0123456789");
        let slots = Arc::new(FileSlots::new(2));

        let slot = slots.open(file.path()).expect("File should open");
        assert_eq!(slot.len(), 10);
        assert_eq!(slots.in_use(), 1);
        assert_eq!(slots.open_paths(), vec![file.path().to_path_buf()]);

        let mut buf = [0u8; 4];
        slot.read_exact_at(3, &mut buf).expect("Read should succeed");
        assert_eq!(&buf, b"3456");

        drop(slot);
        assert_eq!(slots.in_use(), 0);
    }

    #[test]
    fn test_missing_file_releases_slot() {
        let slots = Arc::new(FileSlots::new(1));
        let result = slots.open(Path::new("/nonexistent/pak.rpak"));
        assert!(matches!(result, Err(RuntimeError::Open { .. })));
        assert_eq!(slots.in_use(), 0);
    }

    #[test]
    fn test_open_blocks_until_release() {
        let file = temp_file(b"data");
        let slots = Arc::new(FileSlots::new(1));
        let first = slots.open(file.path()).expect("File should open");

        let path = file.path().to_path_buf();
        let waiter_slots = Arc::clone(&slots);
        let waiter = std::thread::spawn(move || {
            let slot = waiter_slots.open(&path).expect("File should open");
            slot.index()
        });

        std::thread::sleep(Duration::from_millis(50));
        assert!(!waiter.is_finished());
        drop(first);

        assert_eq!(waiter.join().expect("Waiter should finish"), 0);
        assert_eq!(slots.in_use(), 0);
    }
}
