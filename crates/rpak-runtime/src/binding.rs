//! Asset type bindings and the dispatch table
//!
//! Every asset type a consumer understands is described by an
//! [`AssetBinding`]: its four-character tag, the version it expects, the
//! sizes of its in-memory records and the hooks that load, unload and
//! hot-replace an asset. The [`BindingTable`] is filled once at startup and
//! is read-only while containers load.
//!
//! # Usage Examples
//!
//! ```rust
//! use rpak_formats::body::AssetTag;
//! use rpak_runtime::binding::{AssetHandle, BindingTable, FnBinding};
//!
//! let mut table = BindingTable::new();
//! table
//!     .register(
//!         FnBinding::new(AssetTag::new(*b"txtr"), 8, "Texture", |asset| {
//!             Ok(AssetHandle(asset.guid()))
//!         })
//!         .with_unloader(|_handle| {}),
//!     )
//!     .expect("first registration succeeds");
//!
//! assert_eq!(table.len(), 1);
//! ```

use crate::error::{BindingError, LoadError};
use rpak_formats::body::{AssetData, AssetTag};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// Maximum number of asset types a table can hold
pub const MAX_BINDINGS: usize = 64;

/// Opaque value a binding hands back for a loaded asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct AssetHandle(pub u64);

/// Load, unload and replace hooks for one asset type
pub trait AssetBinding: Send + Sync {
    /// Tag of the asset type
    fn tag(&self) -> AssetTag;

    /// Version the binding understands
    fn version(&self) -> u32;

    /// Human readable type name
    fn description(&self) -> &str;

    /// Size of the asset header in the container
    fn sub_header_size(&self) -> usize {
        0
    }

    /// Size of the in-memory record built from the header
    fn native_class_size(&self) -> usize {
        0
    }

    /// Alignment of the in-memory record
    fn header_alignment(&self) -> usize {
        8
    }

    /// Load an asset
    fn load(&self, asset: &AssetData<'_>) -> Result<AssetHandle, LoadError>;

    /// Release an asset returned by [`load`](Self::load) or [`replace`](Self::replace)
    fn unload(&self, handle: AssetHandle);

    /// Swap a resident asset for a new version of it
    fn replace(&self, old: AssetHandle, asset: &AssetData<'_>) -> Result<AssetHandle, LoadError> {
        self.unload(old);
        self.load(asset)
    }

    /// Periodic maintenance
    fn maintain(&self) {}
}

type LoadFn = dyn Fn(&AssetData<'_>) -> Result<AssetHandle, LoadError> + Send + Sync;
type UnloadFn = dyn Fn(AssetHandle) + Send + Sync;
type ReplaceFn = dyn Fn(AssetHandle, &AssetData<'_>) -> Result<AssetHandle, LoadError> + Send + Sync;
type MaintainFn = dyn Fn() + Send + Sync;

/// Binding assembled from closures
pub struct FnBinding {
    tag: AssetTag,
    version: u32,
    description: String,
    sub_header_size: usize,
    native_class_size: usize,
    header_alignment: usize,
    loader: Box<LoadFn>,
    unloader: Option<Box<UnloadFn>>,
    replacer: Option<Box<ReplaceFn>>,
    maintainer: Option<Box<MaintainFn>>,
}

impl FnBinding {
    /// Binding with a loader and no other hooks
    pub fn new<L>(tag: AssetTag, version: u32, description: impl Into<String>, loader: L) -> Self
    where
        L: Fn(&AssetData<'_>) -> Result<AssetHandle, LoadError> + Send + Sync + 'static,
    {
        Self {
            tag,
            version,
            description: description.into(),
            sub_header_size: 0,
            native_class_size: 0,
            header_alignment: 8,
            loader: Box::new(loader),
            unloader: None,
            replacer: None,
            maintainer: None,
        }
    }

    /// Set the unload hook
    #[must_use]
    pub fn with_unloader<U>(mut self, unloader: U) -> Self
    where
        U: Fn(AssetHandle) + Send + Sync + 'static,
    {
        self.unloader = Some(Box::new(unloader));
        self
    }

    /// Set the replace hook
    #[must_use]
    pub fn with_replacer<R>(mut self, replacer: R) -> Self
    where
        R: Fn(AssetHandle, &AssetData<'_>) -> Result<AssetHandle, LoadError> + Send + Sync + 'static,
    {
        self.replacer = Some(Box::new(replacer));
        self
    }

    /// Set the maintenance hook
    #[must_use]
    pub fn with_maintainer<M>(mut self, maintainer: M) -> Self
    where
        M: Fn() + Send + Sync + 'static,
    {
        self.maintainer = Some(Box::new(maintainer));
        self
    }

    /// Set the record sizes reported by the type list
    #[must_use]
    pub const fn with_sizes(mut self, sub_header: usize, native_class: usize, alignment: usize) -> Self {
        self.sub_header_size = sub_header;
        self.native_class_size = native_class;
        self.header_alignment = alignment;
        self
    }
}

impl std::fmt::Debug for FnBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnBinding")
            .field("tag", &self.tag)
            .field("version", &self.version)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl AssetBinding for FnBinding {
    fn tag(&self) -> AssetTag {
        self.tag
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn sub_header_size(&self) -> usize {
        self.sub_header_size
    }

    fn native_class_size(&self) -> usize {
        self.native_class_size
    }

    fn header_alignment(&self) -> usize {
        self.header_alignment
    }

    fn load(&self, asset: &AssetData<'_>) -> Result<AssetHandle, LoadError> {
        (self.loader)(asset)
    }

    fn unload(&self, handle: AssetHandle) {
        if let Some(unloader) = &self.unloader {
            unloader(handle);
        }
    }

    fn replace(&self, old: AssetHandle, asset: &AssetData<'_>) -> Result<AssetHandle, LoadError> {
        match &self.replacer {
            Some(replacer) => replacer(old, asset),
            None => {
                self.unload(old);
                self.load(asset)
            }
        }
    }

    fn maintain(&self) {
        if let Some(maintainer) = &self.maintainer {
            maintainer();
        }
    }
}

/// Row of the registered type list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeInfo {
    /// Type tag as text
    pub tag: String,
    /// Human readable type name
    pub description: String,
    /// Version the binding understands
    pub version: u32,
    /// Asset header size
    pub sub_header_size: usize,
    /// In-memory record size
    pub native_class_size: usize,
    /// In-memory record alignment
    pub header_alignment: usize,
}

/// Tag-keyed table of asset bindings
#[derive(Default, Clone)]
pub struct BindingTable {
    bindings: Vec<Arc<dyn AssetBinding>>,
}

impl BindingTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a binding
    pub fn register<B: AssetBinding + 'static>(&mut self, binding: B) -> Result<(), BindingError> {
        self.register_arc(Arc::new(binding))
    }

    /// Register a shared binding
    pub fn register_arc(&mut self, binding: Arc<dyn AssetBinding>) -> Result<(), BindingError> {
        let tag = binding.tag();
        if self.get(tag).is_some() {
            return Err(BindingError::DuplicateTag(tag));
        }
        if self.bindings.len() >= MAX_BINDINGS {
            return Err(BindingError::TableFull { max: MAX_BINDINGS });
        }
        self.bindings.push(binding);
        Ok(())
    }

    /// Binding for a tag
    pub fn get(&self, tag: AssetTag) -> Option<&Arc<dyn AssetBinding>> {
        self.bindings.iter().find(|b| b.tag() == tag)
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether no type is registered
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    fn lookup(&self, tag: AssetTag, asset: &AssetData<'_>) -> Result<&Arc<dyn AssetBinding>, LoadError> {
        let binding = self.get(tag).ok_or(LoadError::UnregisteredTag(tag))?;
        if binding.version() != asset.version() {
            warn!(
                guid = format_args!("{:#018x}", asset.guid()),
                tag = %tag,
                expected = binding.version(),
                found = asset.version(),
                "asset version differs from its binding"
            );
        }
        Ok(binding)
    }

    /// Load an asset through the binding for `tag`
    pub fn dispatch_load(&self, tag: AssetTag, asset: &AssetData<'_>) -> Result<AssetHandle, LoadError> {
        self.lookup(tag, asset)?.load(asset)
    }

    /// Replace a resident asset through the binding for `tag`
    pub fn dispatch_replace(
        &self,
        tag: AssetTag,
        old: AssetHandle,
        asset: &AssetData<'_>,
    ) -> Result<AssetHandle, LoadError> {
        self.lookup(tag, asset)?.replace(old, asset)
    }

    /// Unload an asset through the binding for `tag`
    ///
    /// Returns false when no binding exists for the tag.
    pub fn dispatch_unload(&self, tag: AssetTag, handle: AssetHandle) -> bool {
        match self.get(tag) {
            Some(binding) => {
                binding.unload(handle);
                true
            }
            None => false,
        }
    }

    /// Registered types in registration order
    pub fn list(&self) -> Vec<TypeInfo> {
        self.bindings
            .iter()
            .map(|b| TypeInfo {
                tag: b.tag().to_string(),
                description: b.description().to_string(),
                version: b.version(),
                sub_header_size: b.sub_header_size(),
                native_class_size: b.native_class_size(),
                header_alignment: b.header_alignment(),
            })
            .collect()
    }

    /// Run every binding's maintenance hook
    pub fn maintain_all(&self) {
        for binding in &self.bindings {
            binding.maintain();
        }
    }
}

impl std::fmt::Debug for BindingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.bindings.iter().map(|b| b.tag()))
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rpak_formats::body::{AssetEntry, PagePtr};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TXTR: AssetTag = AssetTag::new(*b"txtr");
    const MATL: AssetTag = AssetTag::new(*b"matl");

    fn with_asset<R>(tag: AssetTag, version: u32, f: impl FnOnce(&AssetData<'_>) -> R) -> R {
        let entry = AssetEntry::new(0x1234, tag, version, PagePtr::new(0, 0), 4);
        let asset = AssetData {
            index: 0,
            entry: &entry,
            raw_bytes: &[1, 2, 3, 4],
            cpu_bytes: None,
            relations: &[],
            uses: &[],
        };
        f(&asset)
    }

    fn guid_binding(tag: AssetTag) -> FnBinding {
        FnBinding::new(tag, 8, "Test", |asset| Ok(AssetHandle(asset.guid())))
    }

    #[test]
    fn test_register_and_dispatch() {
        let mut table = BindingTable::new();
        table.register(guid_binding(TXTR)).expect("Registration should succeed");

        let handle = with_asset(TXTR, 8, |asset| table.dispatch_load(TXTR, asset));
        assert_eq!(handle, Ok(AssetHandle(0x1234)));
    }

    #[test]
    fn test_duplicate_tag_rejected() {
        let mut table = BindingTable::new();
        table.register(guid_binding(TXTR)).expect("Registration should succeed");
        assert_eq!(
            table.register(guid_binding(TXTR)),
            Err(BindingError::DuplicateTag(TXTR))
        );
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_table_full() {
        let mut table = BindingTable::new();
        for i in 0..MAX_BINDINGS as u32 {
            table
                .register(guid_binding(AssetTag(i)))
                .expect("Registration should succeed");
        }
        assert_eq!(
            table.register(guid_binding(TXTR)),
            Err(BindingError::TableFull { max: MAX_BINDINGS })
        );
    }

    #[test]
    fn test_unregistered_tag() {
        let table = BindingTable::new();
        let result = with_asset(MATL, 1, |asset| table.dispatch_load(MATL, asset));
        assert_eq!(result, Err(LoadError::UnregisteredTag(MATL)));
        assert!(!table.dispatch_unload(MATL, AssetHandle(1)));
    }

    #[test]
    fn test_version_mismatch_still_loads() {
        let mut table = BindingTable::new();
        table.register(guid_binding(TXTR)).expect("Registration should succeed");
        let result = with_asset(TXTR, 9, |asset| table.dispatch_load(TXTR, asset));
        assert!(result.is_ok());
    }

    #[test]
    fn test_default_replace_unloads_then_loads() {
        let unloads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&unloads);

        let mut table = BindingTable::new();
        table
            .register(guid_binding(TXTR).with_unloader(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .expect("Registration should succeed");

        let handle = with_asset(TXTR, 8, |asset| table.dispatch_replace(TXTR, AssetHandle(7), asset));
        assert_eq!(handle, Ok(AssetHandle(0x1234)));
        assert_eq!(unloads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_custom_replacer() {
        let mut table = BindingTable::new();
        table
            .register(guid_binding(TXTR).with_replacer(|old, _| Ok(AssetHandle(old.0 + 1))))
            .expect("Registration should succeed");

        let handle = with_asset(TXTR, 8, |asset| table.dispatch_replace(TXTR, AssetHandle(41), asset));
        assert_eq!(handle, Ok(AssetHandle(42)));
    }

    #[test]
    fn test_list_and_maintain() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);

        let mut table = BindingTable::new();
        table
            .register(
                FnBinding::new(MATL, 3, "Material", |_| Ok(AssetHandle(0)))
                    .with_sizes(0x78, 0x1D0, 8)
                    .with_maintainer(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }),
            )
            .expect("Registration should succeed");
        table.register(guid_binding(TXTR)).expect("Registration should succeed");

        let types = table.list();
        assert_eq!(types.len(), 2);
        assert_eq!(types[0].tag, "matl");
        assert_eq!(types[0].description, "Material");
        assert_eq!(types[0].native_class_size, 0x1D0);
        assert_eq!(types[1].tag, "txtr");

        table.maintain_all();
        table.maintain_all();
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }
}
