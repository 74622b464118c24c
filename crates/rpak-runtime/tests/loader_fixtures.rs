//! End-to-end loads of the fixture containers
//!
//! `common(01).rpak` patches `common.rpak`: its first page is rebuilt from
//! the base container through an edit stream, its txtr asset (version 9)
//! replaces the base one and it adds a matl asset of its own.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use rpak_formats::body::{AssetData, AssetTag};
use rpak_runtime::{
    AssetBinding, AssetHandle, BindingTable, LoadError, PakLoader, PakManager, PakRuntime,
    PakStatus, QueryError, RuntimeConfig,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SAMPLE_TXTR: u64 = 0xA11C_E000_0000_0001;
const SAMPLE_MATL: u64 = 0xB0B0_0000_0000_0002;
const SAMPLE_UNKNOWN: u64 = 0xC0C0_0000_0000_0003;
const COMMON_TXTR: u64 = 0x00C0_FFEE_0000_0010;
const PATCH_MATL: u64 = 0x00C0_FFEE_0000_0020;

/// Page 0 of `common(01).rpak` after its edit stream has run
const PATCHED_PAGE: &str = "50544348787d7a797c817e7d8085828184898685888d8a898c918e8d9095929194999695989d9a999ca19e9da0a5a2a1a4a9a6a5a8adaaa9acb1aeadb0b5b2b1ee0102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f202122232425262728292a2b2c2d2e2f303132333435363738393a3b3c3d3e3f";

fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_fixtures/paks")
}

/// Header bytes the fixture generator writes for an asset of type `tag`
fn header_pattern(tag: &[u8; 4], len: usize) -> Vec<u8> {
    (0..len).map(|k| tag[k % 4].wrapping_add(k as u8)).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Load { guid: u64, version: u32 },
    Replace { old: u64, guid: u64 },
    Unload(u64),
}

#[derive(Debug, Clone)]
struct Seen {
    header: Vec<u8>,
    cpu: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct Log {
    events: Mutex<Vec<Event>>,
    seen: Mutex<HashMap<u64, Seen>>,
}

impl Log {
    fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    fn seen(&self, guid: u64) -> Seen {
        self.seen.lock().get(&guid).cloned().expect("Asset should have been seen")
    }

    fn record(&self, event: Event, asset: &AssetData<'_>) {
        self.events.lock().push(event);
        self.seen.lock().insert(
            asset.guid(),
            Seen {
                header: asset.raw_bytes.to_vec(),
                cpu: asset.cpu_bytes.map(<[u8]>::to_vec),
            },
        );
    }
}

struct Recording {
    tag: AssetTag,
    version: u32,
    log: Arc<Log>,
}

impl AssetBinding for Recording {
    fn tag(&self) -> AssetTag {
        self.tag
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn description(&self) -> &str {
        "Recording"
    }

    fn sub_header_size(&self) -> usize {
        64
    }

    fn load(&self, asset: &AssetData<'_>) -> Result<AssetHandle, LoadError> {
        self.log.record(
            Event::Load {
                guid: asset.guid(),
                version: asset.version(),
            },
            asset,
        );
        Ok(AssetHandle(asset.guid()))
    }

    fn unload(&self, handle: AssetHandle) {
        self.log.events.lock().push(Event::Unload(handle.0));
    }

    fn replace(&self, old: AssetHandle, asset: &AssetData<'_>) -> Result<AssetHandle, LoadError> {
        self.log.record(
            Event::Replace {
                old: old.0,
                guid: asset.guid(),
            },
            asset,
        );
        Ok(AssetHandle(asset.guid()))
    }
}

fn recording_bindings(log: &Arc<Log>) -> BindingTable {
    let mut table = BindingTable::new();
    for (tag, version) in [(*b"txtr", 8), (*b"matl", 3)] {
        table
            .register(Recording {
                tag: AssetTag::new(tag),
                version,
                log: Arc::clone(log),
            })
            .expect("Registration should succeed");
    }
    table
}

fn fixture_config(base: &Path) -> RuntimeConfig {
    RuntimeConfig::new(base).with_override_path(base.join("override"))
}

fn fixture_runtime(log: &Arc<Log>) -> Arc<PakRuntime> {
    Arc::new(
        PakRuntime::new(fixture_config(&fixture_dir()), recording_bindings(log))
            .expect("Config should be valid"),
    )
}

fn load(runtime: &Arc<PakRuntime>, name: &str) -> rpak_runtime::PakInfo {
    let mut loader = PakLoader::create(Arc::clone(runtime), name).expect("Slot should be free");
    loader.run();
    loader.info().expect("Record should exist")
}

/// Temp directory holding copies of the named fixtures
fn staged(files: &[&str]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("Temp dir should be created");
    for name in files {
        std::fs::copy(fixture_dir().join(name), dir.path().join(name)).expect("Fixture should copy");
    }
    dir
}

#[test]
fn test_sample_binds_known_types_and_skips_the_rest() {
    let log = Arc::new(Log::default());
    let runtime = fixture_runtime(&log);

    let info = load(&runtime, "sample.rpak");
    assert_eq!(info.status, PakStatus::Loaded);
    assert_eq!(info.asset_count, 3);
    assert_eq!(info.asset_guids, vec![SAMPLE_TXTR, SAMPLE_MATL, SAMPLE_UNKNOWN]);
    assert_eq!(info.summary.bound, 2);
    assert_eq!(info.summary.replaced, 0);
    assert_eq!(info.summary.skipped, 1);
    assert_eq!(info.summary.skips[0].guid, SAMPLE_UNKNOWN);
    assert_eq!(info.summary.skips[0].tag, "zzzz");

    assert_eq!(
        log.events(),
        vec![
            Event::Load {
                guid: SAMPLE_TXTR,
                version: 8
            },
            Event::Load {
                guid: SAMPLE_MATL,
                version: 3
            },
        ]
    );

    let txtr = log.seen(SAMPLE_TXTR);
    assert_eq!(txtr.header, header_pattern(b"txtr", 64));
    let matl = log.seen(SAMPLE_MATL);
    assert_eq!(matl.header, header_pattern(b"matl", 64));
    let cpu = matl.cpu.expect("Material should carry cpu data");
    assert_eq!(cpu.len(), 200);
    assert!(cpu.starts_with(b"pu-data:"));
}

#[test]
fn test_patch_replaces_base_assets() {
    let log = Arc::new(Log::default());
    let runtime = fixture_runtime(&log);

    let base = load(&runtime, "common.rpak");
    assert_eq!(base.status, PakStatus::Loaded);
    assert_eq!(base.summary.bound, 1);
    assert_eq!(
        log.seen(COMMON_TXTR).cpu,
        Some((0u8..64).collect::<Vec<_>>())
    );

    let patch = load(&runtime, "common(01).rpak");
    assert_eq!(patch.status, PakStatus::Loaded);
    assert_eq!(patch.asset_guids, vec![COMMON_TXTR, PATCH_MATL]);
    assert_eq!(patch.summary.replaced, 1);
    assert_eq!(patch.summary.bound, 1);
    assert_eq!(
        log.events()[1..].to_vec(),
        vec![
            Event::Replace {
                old: COMMON_TXTR,
                guid: COMMON_TXTR
            },
            Event::Load {
                guid: PATCH_MATL,
                version: 3
            },
        ]
    );

    let owner = runtime.assets.get(COMMON_TXTR).expect("Texture should be bound");
    assert_eq!(owner.owner, patch.handle);

    // The base no longer owns the texture, so unloading it runs no hooks
    runtime.unload(base.handle).expect("Base should unload");
    assert_eq!(log.events().len(), 3);
    assert_eq!(runtime.assets.len(), 2);

    runtime.unload(patch.handle).expect("Patch should unload");
    let mut unloaded: Vec<Event> = log.events()[3..].to_vec();
    unloaded.sort_by_key(|e| match e {
        Event::Unload(handle) => *handle,
        _ => 0,
    });
    assert_eq!(unloaded, vec![Event::Unload(COMMON_TXTR), Event::Unload(PATCH_MATL)]);
    assert!(runtime.assets.is_empty());
    assert!(runtime.registry.list().is_empty());
}

#[test]
fn test_patch_pages_are_rebuilt_from_base() {
    let log = Arc::new(Log::default());
    let runtime = fixture_runtime(&log);

    let info = load(&runtime, "common(01).rpak");
    assert_eq!(info.status, PakStatus::Loaded);
    assert_eq!(info.summary.bound, 2);
    assert_eq!(info.summary.replaced, 0);

    let page = hex::decode(PATCHED_PAGE).expect("Page hex should decode");
    let txtr = log.seen(COMMON_TXTR);
    assert_eq!(txtr.header, &page[..64]);
    assert_eq!(txtr.cpu.as_deref(), Some(&page[64..]));
    assert_eq!(log.seen(PATCH_MATL).header, header_pattern(b"matl", 64));

    // The binding expects version 8; the newer asset still loads
    assert!(log.events().contains(&Event::Load {
        guid: COMMON_TXTR,
        version: 9
    }));
    assert_eq!(runtime.files.in_use(), 0);
}

#[test]
fn test_missing_patch_source_fails_the_load() {
    let dir = staged(&["common(01).rpak"]);
    let log = Arc::new(Log::default());
    let runtime = Arc::new(
        PakRuntime::new(fixture_config(dir.path()), recording_bindings(&log))
            .expect("Config should be valid"),
    );

    let info = load(&runtime, "common(01).rpak");
    assert_eq!(info.status, PakStatus::Error);
    assert!(info.error.expect("Error should be recorded").contains("common.rpak"));
    assert!(log.events().is_empty());
    assert_eq!(runtime.files.in_use(), 0);

    runtime.unload(info.handle).expect("Failed record should release");
    assert_eq!(runtime.registry.status(info.handle), Err(QueryError::InvalidHandle));
}

#[test]
fn test_short_patch_source_fails_the_load() {
    let dir = staged(&["common(01).rpak"]);
    let base = std::fs::read(fixture_dir().join("common.rpak")).unwrap();
    std::fs::write(dir.path().join("common.rpak"), &base[..base.len() - 8]).unwrap();

    let log = Arc::new(Log::default());
    let runtime = Arc::new(
        PakRuntime::new(fixture_config(dir.path()), recording_bindings(&log))
            .expect("Config should be valid"),
    );

    let info = load(&runtime, "common(01).rpak");
    assert_eq!(info.status, PakStatus::Error);
    assert!(info.error.expect("Error should be recorded").contains("declared"));
}

#[test]
fn test_truncated_container_fails_the_load() {
    let dir = tempfile::tempdir().expect("Temp dir should be created");
    let sample = std::fs::read(fixture_dir().join("sample.rpak")).unwrap();
    std::fs::write(dir.path().join("sample.rpak"), &sample[..sample.len() - 10]).unwrap();

    let log = Arc::new(Log::default());
    let runtime = Arc::new(
        PakRuntime::new(fixture_config(dir.path()), recording_bindings(&log))
            .expect("Config should be valid"),
    );

    let info = load(&runtime, "sample.rpak");
    assert_eq!(info.status, PakStatus::Error);
    assert!(log.events().is_empty());
}

#[test]
fn test_concurrent_loads_share_one_file_slot() {
    let log = Arc::new(Log::default());
    let config = fixture_config(&fixture_dir())
        .with_max_open_files(1)
        .with_input_buffer_size(512)
        .with_decode_chunk_size(64);
    let runtime = Arc::new(PakRuntime::new(config, recording_bindings(&log)).expect("Config should be valid"));

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let runtime = Arc::clone(&runtime);
            std::thread::spawn(move || load(&runtime, "sample.rpak"))
        })
        .collect();

    for worker in workers {
        let info = worker.join().expect("Worker should finish");
        assert_eq!(info.status, PakStatus::Loaded);
        assert_eq!(info.summary.bound + info.summary.replaced, 2);
        assert_eq!(info.summary.skipped, 1);
    }
    assert_eq!(runtime.assets.len(), 2);
    assert_eq!(runtime.registry.list().len(), 4);
    assert_eq!(runtime.files.in_use(), 0);
}

#[tokio::test]
async fn test_manager_loads_patch_chain() {
    let dir = staged(&["common.rpak", "common(01).rpak"]);
    let log = Arc::new(Log::default());
    let manager = PakManager::new(fixture_config(dir.path()), recording_bindings(&log))
        .expect("Config should be valid");

    let base = manager.request_load("common.rpak").expect("Load should queue");
    assert_eq!(manager.wait_for(base).await, Ok(PakStatus::Loaded));
    let patch = manager.request_load("common(01).rpak").expect("Load should queue");
    assert_eq!(manager.wait_for(patch).await, Ok(PakStatus::Loaded));

    let listed: Vec<(String, PakStatus)> = manager
        .list_paks()
        .into_iter()
        .map(|p| (p.name, p.status))
        .collect();
    assert_eq!(
        listed,
        vec![
            ("common.rpak".to_string(), PakStatus::Loaded),
            ("common(01).rpak".to_string(), PakStatus::Loaded),
        ]
    );

    let swapped = manager.swap(patch).await.expect("Swap should succeed");
    assert_eq!(manager.wait_for(swapped).await, Ok(PakStatus::Loaded));
    let info = manager.info(swapped).expect("Record should exist");
    // The texture went back to nothing when the old patch unloaded
    assert_eq!(info.summary.bound, 2);
    assert_eq!(manager.runtime().assets.get(COMMON_TXTR).map(|a| a.owner), Some(swapped));
}
