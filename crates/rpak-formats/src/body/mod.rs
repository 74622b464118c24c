//! Container body: the tables and pages that follow the header
//!
//! Once decompressed, a container is the header followed by a sequence of
//! tables whose counts the header declares, then the page data.
//!
//! # Body Layout
//!
//! ```text
//! Decompressed container:
//! ├── Header (0x80 bytes)
//! ├── Patch data (patch containers only)
//! │   ├── Patch data header: edit stream size, patched page count
//! │   ├── Patch file headers: size on disk, size in memory (patch_index entries)
//! │   └── Patch numbers: u16 per source file
//! ├── Starpak reference block (NUL-separated paths, 4-byte padded)
//! ├── Optional starpak reference block
//! ├── Segment headers (16 bytes each)
//! ├── Page headers (12 bytes each)
//! ├── Descriptors (8 bytes each)
//! ├── Asset entries (0x50 bytes each)
//! ├── Guid descriptors (8 bytes each)
//! ├── Relations (u32 each)
//! ├── Edit stream (patch containers only)
//! └── Page data, stored back to back
//!     (a patch stores only the pages its edit stream does not produce)
//! ```
//!
//! [`PakBody::parse`] checks every count against the bytes present and every
//! page pointer against its page, so later lookups through a [`PageTable`]
//! built from the same body cannot miss.

mod asset;
mod error;
mod page;
mod records;

pub use asset::{AssetData, AssetTag};
pub use error::{BodyError, BodyResult};
pub use page::PageTable;
pub use records::{
    ASSET_ENTRY_SIZE, AssetEntry, NO_PAGE, PageHeader, PagePtr, PatchDataHeader, PatchFileHeader,
    SegmentHeader,
};

use crate::header::{HEADER_SIZE, PakHeader};
use binrw::{BinRead, BinWrite};
use std::io::{Cursor, Write};

/// Patch section of a patch container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchInfo {
    /// Edit stream size and patched page count
    pub header: PatchDataHeader,
    /// Size overrides, one per source file
    pub files: Vec<PatchFileHeader>,
    /// Patch number of each source file (0 is the base container)
    pub numbers: Vec<u16>,
}

impl PatchInfo {
    /// Number of leading pages produced by the edit stream
    pub fn page_count(&self) -> usize {
        self.header.page_count.max(0) as usize
    }

    /// Byte length of the edit stream
    pub fn edit_stream_size(&self) -> usize {
        self.header.edit_stream_size.max(0) as usize
    }
}

/// Parsed tables of a decompressed container
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PakBody {
    /// Patch section, present when the header's patch index is non-zero
    pub patch: Option<PatchInfo>,
    /// Mandatory starpak paths
    pub starpaks: Vec<String>,
    /// Optional starpak paths
    pub opt_starpaks: Vec<String>,
    /// Virtual segments
    pub segments: Vec<SegmentHeader>,
    /// Memory pages
    pub pages: Vec<PageHeader>,
    /// Pointer descriptors
    pub descriptors: Vec<PagePtr>,
    /// Asset table
    pub assets: Vec<AssetEntry>,
    /// Guid descriptors
    pub guid_descriptors: Vec<PagePtr>,
    /// Relation table
    pub relations: Vec<u32>,
    /// Edit stream of a patch container
    pub edit_stream: Vec<u8>,
    /// Offset of the stored page data within the decompressed container
    pub page_data_offset: usize,
}

/// Sequential reader over the decompressed container
struct SectionReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> SectionReader<'a> {
    fn take(&mut self, section: &'static str, len: usize) -> BodyResult<&'a [u8]> {
        let end = self.position.checked_add(len);
        match end.and_then(|end| self.data.get(self.position..end)) {
            Some(bytes) => {
                self.position += len;
                Ok(bytes)
            }
            None => Err(BodyError::Truncated {
                section,
                needed: (self.position as u64).saturating_add(len as u64),
                available: self.data.len() as u64,
            }),
        }
    }

    fn records<T>(&mut self, section: &'static str, count: usize, size: usize) -> BodyResult<Vec<T>>
    where
        T: for<'b> BinRead<Args<'b> = ()>,
    {
        let bytes = self.take(section, count.saturating_mul(size))?;
        let mut cursor = Cursor::new(bytes);
        (0..count)
            .map(|_| T::read_le(&mut cursor).map_err(BodyError::from))
            .collect()
    }
}

fn parse_paths(block: &[u8]) -> Vec<String> {
    block
        .split(|&byte| byte == 0)
        .filter(|path| !path.is_empty())
        .map(|path| String::from_utf8_lossy(path).into_owned())
        .collect()
}

fn build_paths(paths: &[String]) -> Vec<u8> {
    let mut block = Vec::new();
    for path in paths {
        block.extend_from_slice(path.as_bytes());
        block.push(0);
    }
    while block.len() % 4 != 0 {
        block.push(0);
    }
    block
}

impl PakBody {
    /// Parse the tables of a decompressed container (header included in `data`)
    pub fn parse(data: &[u8], header: &PakHeader) -> BodyResult<Self> {
        let mut reader = SectionReader {
            data,
            position: HEADER_SIZE,
        };
        if data.len() < HEADER_SIZE {
            return Err(BodyError::Truncated {
                section: "header",
                needed: HEADER_SIZE as u64,
                available: data.len() as u64,
            });
        }

        let patch = if header.patch_index > 0 {
            let count = header.patch_index as usize;
            let patch_header: PatchDataHeader = reader
                .records("patch data header", 1, 8)?
                .pop()
                .ok_or(BodyError::InvalidPatchHeader("missing patch data header"))?;
            let files = reader.records("patch file headers", count, 16)?;
            let numbers = reader.records("patch numbers", count, 2)?;

            if patch_header.edit_stream_size < 0 {
                return Err(BodyError::InvalidPatchHeader("negative edit stream size"));
            }
            if patch_header.page_count < 0
                || patch_header.page_count as usize > usize::from(header.mem_page_count)
            {
                return Err(BodyError::InvalidPatchHeader("patched page count out of range"));
            }

            Some(PatchInfo {
                header: patch_header,
                files,
                numbers,
            })
        } else {
            None
        };

        let starpaks = parse_paths(reader.take("starpak block", usize::from(header.starpak_ref_size))?);
        let opt_starpaks = parse_paths(
            reader.take("optional starpak block", usize::from(header.opt_starpak_ref_size))?,
        );

        let segments = reader.records("segment headers", usize::from(header.virtual_segment_count), 16)?;
        let pages = reader.records("page headers", usize::from(header.mem_page_count), 12)?;
        let descriptors = reader.records("descriptors", header.descriptor_count as usize, 8)?;
        let assets = reader.records("asset entries", header.asset_count as usize, ASSET_ENTRY_SIZE)?;
        let guid_descriptors =
            reader.records("guid descriptors", header.guid_descriptor_count as usize, 8)?;
        let relations = reader.records("relations", header.relation_count as usize, 4)?;

        let edit_stream_size = patch.as_ref().map_or(0, PatchInfo::edit_stream_size);
        let edit_stream = reader.take("edit stream", edit_stream_size)?.to_vec();

        let body = Self {
            patch,
            starpaks,
            opt_starpaks,
            segments,
            pages,
            descriptors,
            assets,
            guid_descriptors,
            relations,
            edit_stream,
            page_data_offset: reader.position,
        };
        body.validate(data.len())?;
        Ok(body)
    }

    fn validate(&self, container_size: usize) -> BodyResult<()> {
        for (page, header) in self.pages.iter().enumerate() {
            if header.segment_index as usize >= self.segments.len() {
                return Err(BodyError::InvalidSegmentIndex {
                    page,
                    segment: header.segment_index,
                    count: self.segments.len(),
                });
            }
        }

        for (index, ptr) in self.descriptors.iter().enumerate() {
            self.check_ptr("descriptor", index, *ptr, 8)?;
        }
        for (index, ptr) in self.guid_descriptors.iter().enumerate() {
            self.check_ptr("guid descriptor", index, *ptr, 8)?;
        }

        for (index, entry) in self.assets.iter().enumerate() {
            self.check_ptr("asset header", index, entry.head, u64::from(entry.header_size))?;
            if entry.cpu.is_some() {
                self.check_ptr("asset cpu data", index, entry.cpu, 0)?;
            }
            check_range(index, "relations", entry.relations_start, entry.relations_count, self.relations.len())?;
            check_range(index, "uses", entry.uses_start, entry.uses_count, self.guid_descriptors.len())?;
        }

        let stored: u64 = self.stored_pages().iter().map(|p| u64::from(p.data_size)).sum();
        let needed = self.page_data_offset as u64 + stored;
        let size = container_size as u64;
        if needed > size {
            return Err(BodyError::Truncated {
                section: "page data",
                needed,
                available: size,
            });
        }
        if needed < size {
            return Err(BodyError::TrailingBytes(size - needed));
        }
        Ok(())
    }

    fn check_ptr(&self, what: &'static str, index: usize, ptr: PagePtr, len: u64) -> BodyResult<()> {
        let Some(page) = self.pages.get(ptr.page as usize) else {
            return Err(BodyError::InvalidPageIndex {
                what,
                index,
                page: ptr.page,
                count: self.pages.len(),
            });
        };
        if u64::from(ptr.offset) + len > u64::from(page.data_size) {
            return Err(BodyError::OffsetOutOfRange {
                what,
                index,
                page: ptr.page,
                offset: u64::from(ptr.offset),
                size: page.data_size,
            });
        }
        Ok(())
    }

    /// Pages produced by the edit stream
    pub fn patched_pages(&self) -> &[PageHeader] {
        let count = self.patch.as_ref().map_or(0, PatchInfo::page_count);
        &self.pages[..count.min(self.pages.len())]
    }

    /// Pages stored in this container
    pub fn stored_pages(&self) -> &[PageHeader] {
        &self.pages[self.patched_pages().len()..]
    }

    /// Total size of the pages the edit stream must produce
    pub fn patched_size(&self) -> u64 {
        self.patched_pages().iter().map(|p| u64::from(p.data_size)).sum()
    }

    /// Assemble the page table from patched page bytes and the stored pages in `data`
    pub fn page_table(&self, data: &[u8], patched: Vec<u8>) -> BodyResult<PageTable> {
        let stored = data.get(self.page_data_offset..).unwrap_or_default();
        let mut bytes = patched;
        bytes.extend_from_slice(stored);
        PageTable::new(&self.pages, bytes)
    }

    /// Resolve asset `index` against `pages`
    pub fn asset_data<'a>(&'a self, index: usize, pages: &'a PageTable) -> BodyResult<AssetData<'a>> {
        let entry = self.assets.get(index).ok_or(BodyError::InvalidPageIndex {
            what: "asset",
            index,
            page: NO_PAGE,
            count: self.assets.len(),
        })?;

        let out_of_range = |what, ptr: PagePtr| BodyError::OffsetOutOfRange {
            what,
            index,
            page: ptr.page,
            offset: u64::from(ptr.offset),
            size: pages.page(ptr.page as usize).map_or(0, |p| p.len() as u32),
        };

        let raw_bytes = pages
            .slice(entry.head, entry.header_size as usize)
            .ok_or_else(|| out_of_range("asset header", entry.head))?;
        let cpu_bytes = if entry.cpu.is_some() {
            Some(pages.resolve(entry.cpu).ok_or_else(|| out_of_range("asset cpu data", entry.cpu))?)
        } else {
            None
        };

        let relations = slice_range(&self.relations, entry.relations_start, entry.relations_count)
            .ok_or(BodyError::InvalidRange {
                asset: index,
                what: "relations",
                start: entry.relations_start,
                count: entry.relations_count,
                available: self.relations.len(),
            })?;
        let uses = slice_range(&self.guid_descriptors, entry.uses_start, entry.uses_count).ok_or(
            BodyError::InvalidRange {
                asset: index,
                what: "uses",
                start: entry.uses_start,
                count: entry.uses_count,
                available: self.guid_descriptors.len(),
            },
        )?;

        Ok(AssetData {
            index,
            entry,
            raw_bytes,
            cpu_bytes,
            relations,
            uses,
        })
    }

    /// Serialize everything between the header and the page data
    pub fn build(&self) -> BodyResult<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());

        if let Some(patch) = &self.patch {
            patch.header.write(&mut out)?;
            for file in &patch.files {
                file.write(&mut out)?;
            }
            for number in &patch.numbers {
                number.write_le(&mut out)?;
            }
        }

        out.write_all(&build_paths(&self.starpaks))
            .map_err(binrw::Error::Io)?;
        out.write_all(&build_paths(&self.opt_starpaks))
            .map_err(binrw::Error::Io)?;

        for segment in &self.segments {
            segment.write(&mut out)?;
        }
        for page in &self.pages {
            page.write(&mut out)?;
        }
        for ptr in &self.descriptors {
            ptr.write(&mut out)?;
        }
        for entry in &self.assets {
            entry.write(&mut out)?;
        }
        for ptr in &self.guid_descriptors {
            ptr.write(&mut out)?;
        }
        for relation in &self.relations {
            relation.write_le(&mut out)?;
        }

        out.write_all(&self.edit_stream).map_err(binrw::Error::Io)?;
        Ok(out.into_inner())
    }

    /// Byte sizes of the starpak blocks as they will be written
    pub fn starpak_block_sizes(&self) -> (usize, usize) {
        (
            build_paths(&self.starpaks).len(),
            build_paths(&self.opt_starpaks).len(),
        )
    }
}

fn check_range(asset: usize, what: &'static str, start: u32, count: u32, available: usize) -> BodyResult<()> {
    if u64::from(start) + u64::from(count) > available as u64 {
        return Err(BodyError::InvalidRange {
            asset,
            what,
            start,
            count,
            available,
        });
    }
    Ok(())
}

fn slice_range<T>(items: &[T], start: u32, count: u32) -> Option<&[T]> {
    let start = start as usize;
    items.get(start..start.checked_add(count as usize)?)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE_RAW: &[u8] = include_bytes!("../../test_fixtures/decode/sample_raw.rpak");

    fn sample() -> (PakHeader, PakBody) {
        let (header, _) = PakHeader::parse(SAMPLE_RAW, 0).expect("Header should parse");
        let body = PakBody::parse(SAMPLE_RAW, &header).expect("Body should parse");
        (header, body)
    }

    #[test]
    fn test_parse_sample_tables() {
        let (_, body) = sample();

        assert!(body.patch.is_none());
        assert_eq!(body.starpaks, vec!["paks/Win64/sample.starpak".to_string()]);
        assert_eq!(body.opt_starpaks, vec!["paks/Win64/sample.opt.starpak".to_string()]);
        assert_eq!(body.segments.len(), 2);
        assert_eq!(body.segments[1].size, 512);
        assert_eq!(body.pages[1].data_size, 300);
        assert_eq!(body.descriptors, vec![PagePtr::new(0, 8), PagePtr::new(1, 16)]);
        assert_eq!(body.guid_descriptors, vec![PagePtr::new(0, 72)]);
        assert_eq!(body.relations, vec![0]);
        assert_eq!(body.page_data_offset, SAMPLE_RAW.len() - 492);

        let tags: Vec<String> = body.assets.iter().map(|a| a.tag.to_string()).collect();
        assert_eq!(tags, vec!["txtr", "matl", "zzzz"]);
        assert_eq!(body.assets[0].guid, 0xA11C_E000_0000_0001);
        assert_eq!(body.assets[2].cpu, PagePtr::none());
    }

    #[test]
    fn test_asset_data_resolution() {
        let (_, body) = sample();
        let pages = body
            .page_table(SAMPLE_RAW, Vec::new())
            .expect("Pages should fit");

        let matl = body.asset_data(1, &pages).expect("Asset should resolve");
        assert_eq!(matl.tag(), AssetTag::new(*b"matl"));
        assert_eq!(matl.version(), 3);
        assert_eq!(matl.header_size(), 64);
        assert_eq!(matl.raw_bytes[0], b'm');
        assert_eq!(matl.raw_bytes[1], b'a' + 1);
        assert_eq!(matl.cpu_bytes.map(<[u8]>::len), Some(200));
        assert_eq!(matl.relations, &[0]);
        assert_eq!(matl.uses, &[PagePtr::new(0, 72)]);

        let unknown = body.asset_data(2, &pages).expect("Asset should resolve");
        assert!(unknown.cpu_bytes.is_none());
        assert!(unknown.relations.is_empty());
    }

    #[test]
    fn test_build_round_trip() {
        let (_, body) = sample();
        let built = body.build().expect("Body should build");
        assert_eq!(built.as_slice(), &SAMPLE_RAW[HEADER_SIZE..body.page_data_offset]);
        assert_eq!(body.starpak_block_sizes(), (28, 32));
    }

    #[test]
    fn test_rejects_truncated_page_data() {
        let (header, _) = sample();
        let truncated = &SAMPLE_RAW[..SAMPLE_RAW.len() - 1];
        assert!(matches!(
            PakBody::parse(truncated, &header),
            Err(BodyError::Truncated {
                section: "page data",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_bad_asset_pointer() {
        let (header, body) = sample();
        let mut data = SAMPLE_RAW.to_vec();
        let assets_offset = body.page_data_offset
            - 4 * body.relations.len()
            - 8 * body.guid_descriptors.len()
            - ASSET_ENTRY_SIZE * body.assets.len();
        // Point the first asset's header at a page that does not exist.
        data[assets_offset + 0x10] = 9;

        assert!(matches!(
            PakBody::parse(&data, &header),
            Err(BodyError::InvalidPageIndex {
                what: "asset header",
                index: 0,
                page: 9,
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_bad_segment_index() {
        let (header, body) = sample();
        let mut data = SAMPLE_RAW.to_vec();
        let pages_offset = body.page_data_offset
            - 4 * body.relations.len()
            - 8 * body.guid_descriptors.len()
            - ASSET_ENTRY_SIZE * body.assets.len()
            - 8 * body.descriptors.len()
            - 12 * body.pages.len();
        data[pages_offset] = 5;

        assert!(matches!(
            PakBody::parse(&data, &header),
            Err(BodyError::InvalidSegmentIndex {
                page: 0,
                segment: 5,
                count: 2
            })
        ));
    }
}
