//! Process-wide index of bound assets
//!
//! Maps an asset GUID to the container that currently owns it. When a later
//! container carries the same GUID it takes ownership through the binding's
//! replace hook; unloading the older container then leaves the asset alone.
//!
//! Deciding an asset's owner, running the binding hook and storing the
//! result happen under [`AssetIndex::stage`], as does unbinding a container.

use crate::binding::AssetHandle;
use crate::registry::PakHandle;
use dashmap::DashMap;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use rpak_formats::body::AssetTag;

/// An asset a binding has accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundAsset {
    /// Container that owns the asset
    pub owner: PakHandle,
    /// Asset type
    pub tag: AssetTag,
    /// Value returned by the binding
    pub handle: AssetHandle,
}

/// GUID-keyed map of bound assets
#[derive(Debug, Default)]
pub struct AssetIndex {
    assets: DashMap<u64, BoundAsset>,
    stage: ReentrantMutex<()>,
}

impl AssetIndex {
    /// Empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the bind and unbind stage
    ///
    /// Re-entrant, so a binding hook may unload a container while it is held.
    pub fn stage(&self) -> ReentrantMutexGuard<'_, ()> {
        self.stage.lock()
    }

    /// Asset bound under `guid`
    pub fn get(&self, guid: u64) -> Option<BoundAsset> {
        self.assets.get(&guid).map(|entry| *entry.value())
    }

    /// Bind `guid`, returning the asset it displaced
    pub fn insert(&self, guid: u64, asset: BoundAsset) -> Option<BoundAsset> {
        self.assets.insert(guid, asset)
    }

    /// Unbind `guid`, returning the asset it held
    pub fn remove(&self, guid: u64) -> Option<BoundAsset> {
        self.assets.remove(&guid).map(|(_, asset)| asset)
    }

    /// Remove every asset owned by `owner`
    pub fn remove_owned_by(&self, owner: PakHandle) -> Vec<(u64, BoundAsset)> {
        let mut removed = Vec::new();
        self.assets.retain(|guid, asset| {
            if asset.owner == owner {
                removed.push((*guid, *asset));
                false
            } else {
                true
            }
        });
        removed
    }

    /// Number of assets owned by `owner`
    pub fn count_owned_by(&self, owner: PakHandle) -> usize {
        self.assets.iter().filter(|e| e.value().owner == owner).count()
    }

    /// Number of bound assets
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Whether nothing is bound
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn bound(owner: PakHandle, handle: u64) -> BoundAsset {
        BoundAsset {
            owner,
            tag: AssetTag::new(*b"txtr"),
            handle: AssetHandle(handle),
        }
    }

    #[test]
    fn test_ownership_moves_on_insert() {
        let index = AssetIndex::new();
        assert_eq!(index.insert(10, bound(1, 100)), None);
        assert_eq!(index.insert(10, bound(2, 200)), Some(bound(1, 100)));
        assert_eq!(index.get(10), Some(bound(2, 200)));

        assert!(index.remove_owned_by(1).is_empty());
        assert_eq!(index.len(), 1);
        assert_eq!(index.remove_owned_by(2), vec![(10, bound(2, 200))]);
        assert!(index.is_empty());
    }

    #[test]
    fn test_stage_is_reentrant() {
        let index = AssetIndex::new();
        let outer = index.stage();
        let inner = index.stage();
        index.insert(1, bound(5, 1));
        drop(inner);
        drop(outer);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_count_owned_by() {
        let index = AssetIndex::new();
        index.insert(1, bound(5, 1));
        index.insert(2, bound(5, 2));
        index.insert(3, bound(6, 3));
        assert_eq!(index.count_owned_by(5), 2);
        assert_eq!(index.count_owned_by(6), 1);
        assert_eq!(index.count_owned_by(7), 0);
        assert_eq!(index.remove(3), Some(bound(6, 3)));
        assert_eq!(index.count_owned_by(6), 0);
    }
}
