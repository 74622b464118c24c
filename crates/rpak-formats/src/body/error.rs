//! Error types for container body parsing

use thiserror::Error;

/// Errors raised while parsing the tables that follow the container header
#[derive(Error, Debug)]
pub enum BodyError {
    /// A section extends past the end of the decompressed data
    #[error("Truncated {section}: need {needed} bytes, {available} available")]
    Truncated {
        /// Section being read
        section: &'static str,
        /// Bytes the section requires
        needed: u64,
        /// Bytes left in the container
        available: u64,
    },

    /// Bytes remain after the last page
    #[error("{0} trailing bytes after page data")]
    TrailingBytes(u64),

    /// The patch data header holds an impossible value
    #[error("Invalid patch header: {0}")]
    InvalidPatchHeader(&'static str),

    /// A page refers to a segment that does not exist
    #[error("Page {page} refers to segment {segment}, only {count} segments exist")]
    InvalidSegmentIndex {
        /// Page index
        page: usize,
        /// Referenced segment
        segment: u32,
        /// Number of segments
        count: usize,
    },

    /// A page pointer refers to a page that does not exist
    #[error("{what} {index} refers to page {page}, only {count} pages exist")]
    InvalidPageIndex {
        /// Kind of pointer
        what: &'static str,
        /// Index of the pointer in its table
        index: usize,
        /// Referenced page
        page: u32,
        /// Number of pages
        count: usize,
    },

    /// A page pointer lies outside its page
    #[error("{what} {index} at page {page} offset {offset} overruns the {size}-byte page")]
    OffsetOutOfRange {
        /// Kind of pointer
        what: &'static str,
        /// Index of the pointer in its table
        index: usize,
        /// Referenced page
        page: u32,
        /// Offset within the page
        offset: u64,
        /// Page size
        size: u32,
    },

    /// An asset's relation or uses range lies outside its table
    #[error("Asset {asset} {what} range {start}+{count} exceeds {available} entries")]
    InvalidRange {
        /// Asset index
        asset: usize,
        /// Range kind
        what: &'static str,
        /// First entry
        start: u32,
        /// Entry count
        count: u32,
        /// Entries in the table
        available: usize,
    },

    /// Binary format parsing error from binrw
    #[error("Binary format error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for body operations
pub type BodyResult<T> = Result<T, BodyError>;
