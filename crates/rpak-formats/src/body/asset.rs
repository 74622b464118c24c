//! Asset type tags and resolved asset views

use super::records::{AssetEntry, PagePtr};
use binrw::{BinRead, BinWrite};
use std::fmt;

/// Four-character asset type tag such as `txtr` or `matl`
///
/// Stored as the little-endian u32 of its four bytes, so `"txtr"` in the file
/// reads back as the characters in order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, BinRead, BinWrite)]
pub struct AssetTag(pub u32);

impl AssetTag {
    /// Tag from its four characters
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(bytes))
    }

    /// The tag's four characters
    pub const fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

impl fmt::Display for AssetTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.to_bytes() {
            let c = if byte.is_ascii_graphic() || byte == b' ' {
                byte as char
            } else {
                '?'
            };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for AssetTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetTag({self})")
    }
}

impl From<[u8; 4]> for AssetTag {
    fn from(bytes: [u8; 4]) -> Self {
        Self::new(bytes)
    }
}

/// One asset resolved against the container's pages
///
/// This is what asset loaders receive: the raw header bytes plus every
/// piece of the entry a loader may need to follow.
#[derive(Debug, Clone, Copy)]
pub struct AssetData<'a> {
    /// Index of the entry in the asset table
    pub index: usize,
    /// The entry itself
    pub entry: &'a AssetEntry,
    /// Asset header bytes (`header_size` long)
    pub raw_bytes: &'a [u8],
    /// Cpu data from its offset to the end of its page
    pub cpu_bytes: Option<&'a [u8]>,
    /// Indices of assets this one depends on
    pub relations: &'a [u32],
    /// Guid descriptors this asset uses
    pub uses: &'a [PagePtr],
}

impl AssetData<'_> {
    /// Asset GUID
    pub fn guid(&self) -> u64 {
        self.entry.guid
    }

    /// Asset type tag
    pub fn tag(&self) -> AssetTag {
        self.entry.tag
    }

    /// Asset type version recorded in the container
    pub fn version(&self) -> u32 {
        self.entry.version
    }

    /// Size of the asset header
    pub fn header_size(&self) -> usize {
        self.raw_bytes.len()
    }

    /// Offset into the mandatory starpak
    pub fn starpak_offset(&self) -> u64 {
        self.entry.starpak_offset
    }

    /// Offset into the optional starpak
    pub fn opt_starpak_offset(&self) -> u64 {
        self.entry.opt_starpak_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_display() {
        assert_eq!(AssetTag::new(*b"txtr").to_string(), "txtr");
        assert_eq!(AssetTag(0x6C74_616D).to_string(), "matl");
        assert_eq!(AssetTag::new([b'u', b'i', 0, 0xFF]).to_string(), "ui??");
        assert_eq!(format!("{:?}", AssetTag::new(*b"dtbl")), "AssetTag(dtbl)");
    }
}
