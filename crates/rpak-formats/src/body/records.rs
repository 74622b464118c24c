//! Fixed-size records stored in the container body

use super::asset::AssetTag;
use binrw::{BinRead, BinWrite};

/// Page index marking an absent page pointer
pub const NO_PAGE: u32 = u32::MAX;

/// Size of one serialized [`AssetEntry`]
pub const ASSET_ENTRY_SIZE: usize = 0x50;

/// Leading record of a patch container
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct PatchDataHeader {
    /// Byte length of the edit stream
    pub edit_stream_size: i32,
    /// Number of leading pages produced by the edit stream
    pub page_count: i32,
}

/// Size overrides for one patch source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct PatchFileHeader {
    /// Bytes to read from disk
    pub size_disk: u64,
    /// Decompressed size, header included
    pub size_memory: u64,
}

/// Virtual segment header
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct SegmentHeader {
    /// Segment type flags
    pub flags: i32,
    /// Required alignment
    pub alignment: i32,
    /// Segment size in bytes
    pub size: u64,
}

/// Memory page header
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct PageHeader {
    /// Owning virtual segment
    pub segment_index: u32,
    /// Required alignment
    pub alignment: u32,
    /// Page size in bytes
    pub data_size: u32,
}

/// Location inside a memory page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct PagePtr {
    /// Page index, or [`NO_PAGE`]
    pub page: u32,
    /// Byte offset within the page
    pub offset: u32,
}

impl PagePtr {
    /// Pointer to `offset` within `page`
    pub const fn new(page: u32, offset: u32) -> Self {
        Self { page, offset }
    }

    /// Pointer that refers to nothing
    pub const fn none() -> Self {
        Self {
            page: NO_PAGE,
            offset: 0,
        }
    }

    /// Whether the pointer refers to a page
    pub const fn is_some(&self) -> bool {
        self.page != NO_PAGE
    }
}

/// Asset table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct AssetEntry {
    /// Asset GUID
    pub guid: u64,
    padding: u64,
    /// Location of the asset header
    pub head: PagePtr,
    /// Location of the asset's cpu data, if any
    pub cpu: PagePtr,
    /// Offset into the mandatory starpak, or -1
    pub starpak_offset: u64,
    /// Offset into the optional starpak, or -1
    pub opt_starpak_offset: u64,
    /// Last page this asset needs before it can load
    pub page_end: u16,
    /// Remaining dependency count
    pub unk: u16,
    /// First entry in the relation table
    pub relations_start: u32,
    /// First entry in the guid descriptor table
    pub uses_start: u32,
    /// Number of relation entries
    pub relations_count: u32,
    /// Number of guid descriptors
    pub uses_count: u32,
    /// Size of the asset header
    pub header_size: u32,
    /// Asset type version
    pub version: u32,
    /// Asset type tag
    pub tag: AssetTag,
}

impl AssetEntry {
    /// Entry with header data at `head` and no cpu data, starpak data or dependencies
    pub fn new(guid: u64, tag: AssetTag, version: u32, head: PagePtr, header_size: u32) -> Self {
        Self {
            guid,
            padding: 0,
            head,
            cpu: PagePtr::none(),
            starpak_offset: 0,
            opt_starpak_offset: 0,
            page_end: 0,
            unk: 0,
            relations_start: 0,
            uses_start: 0,
            relations_count: 0,
            uses_count: 0,
            header_size,
            version,
            tag,
        }
    }

    /// Set the cpu data pointer
    pub fn with_cpu(mut self, cpu: PagePtr) -> Self {
        self.cpu = cpu;
        self
    }

    /// Set the relation range
    pub fn with_relations(mut self, start: u32, count: u32) -> Self {
        self.relations_start = start;
        self.relations_count = count;
        self
    }

    /// Set the guid descriptor range
    pub fn with_uses(mut self, start: u32, count: u32) -> Self {
        self.uses_start = start;
        self.uses_count = count;
        self
    }

    /// Set the starpak offsets
    pub fn with_starpak_offsets(mut self, starpak: u64, opt_starpak: u64) -> Self {
        self.starpak_offset = starpak;
        self.opt_starpak_offset = opt_starpak;
        self
    }
}
