//! Memory pages of a loaded container

use super::error::{BodyError, BodyResult};
use super::records::{PageHeader, PagePtr};

/// Owns the page bytes of one container and resolves page pointers
///
/// All pages live in a single buffer; the table records where each begins.
#[derive(Debug, Clone, Default)]
pub struct PageTable {
    data: Vec<u8>,
    starts: Vec<usize>,
    sizes: Vec<u32>,
}

impl PageTable {
    /// Build a table from page headers and their bytes stored back to back
    pub fn new(headers: &[PageHeader], data: Vec<u8>) -> BodyResult<Self> {
        let mut starts = Vec::with_capacity(headers.len());
        let mut sizes = Vec::with_capacity(headers.len());
        let mut position = 0usize;

        for header in headers {
            starts.push(position);
            sizes.push(header.data_size);
            position += header.data_size as usize;
        }

        if position > data.len() {
            return Err(BodyError::Truncated {
                section: "page data",
                needed: position as u64,
                available: data.len() as u64,
            });
        }
        if position < data.len() {
            return Err(BodyError::TrailingBytes((data.len() - position) as u64));
        }

        Ok(Self {
            data,
            starts,
            sizes,
        })
    }

    /// Number of pages
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    /// Whether the table holds no pages
    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    /// Bytes of page `index`
    pub fn page(&self, index: usize) -> Option<&[u8]> {
        let start = *self.starts.get(index)?;
        let size = *self.sizes.get(index)? as usize;
        self.data.get(start..start + size)
    }

    /// Bytes from `ptr` to the end of its page
    pub fn resolve(&self, ptr: PagePtr) -> Option<&[u8]> {
        if !ptr.is_some() {
            return None;
        }
        self.page(ptr.page as usize)?.get(ptr.offset as usize..)
    }

    /// `len` bytes starting at `ptr`
    pub fn slice(&self, ptr: PagePtr, len: usize) -> Option<&[u8]> {
        self.resolve(ptr)?.get(..len)
    }

    /// Total size of all pages
    pub fn total_size(&self) -> usize {
        self.data.len()
    }
}
