//! Uncompressed container builder
//!
//! [`PakBuilder`] assembles a container from its tables and page bytes and
//! writes it in exactly the layout [`PakBody::parse`](crate::body::PakBody::parse)
//! reads. The output is stored uncompressed; there is no LZ encoder.

use crate::body::{
    AssetEntry, BodyResult, PageHeader, PagePtr, PakBody, PatchDataHeader, PatchFileHeader,
    PatchInfo, SegmentHeader,
};
use crate::header::{HEADER_SIZE, PakHeader};
use binrw::BinWrite;
use std::io::Cursor;

/// Builds an uncompressed container
#[derive(Debug, Clone, Default)]
pub struct PakBuilder {
    header: PakHeader,
    body: PakBody,
    page_data: Vec<u8>,
}

impl PakBuilder {
    /// Start an empty base container
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a patch container
    ///
    /// `patched_pages` are the leading pages the edit stream produces; they
    /// take page indices `0..patched_pages.len()`.
    pub fn new_patch(
        files: Vec<PatchFileHeader>,
        numbers: Vec<u16>,
        edit_stream: Vec<u8>,
        patched_pages: Vec<PageHeader>,
    ) -> Self {
        let mut builder = Self::new();
        builder.body.patch = Some(PatchInfo {
            header: PatchDataHeader {
                edit_stream_size: edit_stream.len() as i32,
                page_count: patched_pages.len() as i32,
            },
            files,
            numbers,
        });
        builder.body.edit_stream = edit_stream;
        builder.body.pages = patched_pages;
        builder
    }

    /// Set the FILETIME stamp
    pub fn with_file_time(mut self, file_time: u64) -> Self {
        self.header.file_time = file_time;
        self
    }

    /// Set the checksum field
    pub fn with_checksum(mut self, checksum: u64) -> Self {
        self.header.checksum = checksum;
        self
    }

    /// Reference a mandatory starpak
    pub fn starpak(&mut self, path: &str) -> &mut Self {
        self.body.starpaks.push(path.to_string());
        self
    }

    /// Reference an optional starpak
    pub fn opt_starpak(&mut self, path: &str) -> &mut Self {
        self.body.opt_starpaks.push(path.to_string());
        self
    }

    /// Add a virtual segment and return its index
    pub fn segment(&mut self, flags: i32, alignment: i32, size: u64) -> u32 {
        self.body.segments.push(SegmentHeader {
            flags,
            alignment,
            size,
        });
        self.body.segments.len() as u32 - 1
    }

    /// Add a stored page and return its index
    pub fn page(&mut self, segment_index: u32, alignment: u32, data: &[u8]) -> u32 {
        self.body.pages.push(PageHeader {
            segment_index,
            alignment,
            data_size: data.len() as u32,
        });
        self.page_data.extend_from_slice(data);
        self.body.pages.len() as u32 - 1
    }

    /// Add a pointer descriptor
    pub fn descriptor(&mut self, ptr: PagePtr) -> &mut Self {
        self.body.descriptors.push(ptr);
        self
    }

    /// Add a guid descriptor
    pub fn guid_descriptor(&mut self, ptr: PagePtr) -> &mut Self {
        self.body.guid_descriptors.push(ptr);
        self
    }

    /// Add a relation entry
    pub fn relation(&mut self, asset_index: u32) -> &mut Self {
        self.body.relations.push(asset_index);
        self
    }

    /// Add an asset entry and return its index
    pub fn asset(&mut self, entry: AssetEntry) -> usize {
        self.body.assets.push(entry);
        self.body.assets.len() - 1
    }

    /// Header the built container will carry
    pub fn header(&self) -> PakHeader {
        let mut header = self.header.clone();
        let (starpak_size, opt_starpak_size) = self.body.starpak_block_sizes();

        header.starpak_ref_size = starpak_size as u16;
        header.opt_starpak_ref_size = opt_starpak_size as u16;
        header.virtual_segment_count = self.body.segments.len() as u16;
        header.mem_page_count = self.body.pages.len() as u16;
        header.patch_index = self.body.patch.as_ref().map_or(0, |p| p.files.len() as u32);
        header.descriptor_count = self.body.descriptors.len() as u32;
        header.asset_count = self.body.assets.len() as u32;
        header.guid_descriptor_count = self.body.guid_descriptors.len() as u32;
        header.relation_count = self.body.relations.len() as u32;
        header
    }

    /// Write the container
    pub fn build(&self) -> BodyResult<Vec<u8>> {
        let tables = self.body.build()?;
        let total = (HEADER_SIZE + tables.len() + self.page_data.len()) as u64;

        let mut header = self.header();
        header.flags = 0;
        header.compressed_size = total;
        header.decompressed_size = total;

        let mut out = Cursor::new(Vec::with_capacity(total as usize));
        header.write(&mut out)?;

        let mut bytes = out.into_inner();
        bytes.extend_from_slice(&tables);
        bytes.extend_from_slice(&self.page_data);
        Ok(bytes)
    }
}
