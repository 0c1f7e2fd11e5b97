//! Integration tests for depot-cache
//!
//! Drives the full stack — config, provider factory, coordinator, push
//! worker — over real filesystem backends in temp directories.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use depot_cache::cache::BinaryCache;
use depot_cache::config::{build_providers, CacheConfig, ConfigManager, ProviderSource};
use depot_cache::diagnostics::DiagnosticSink;
use depot_cache::package::{BinaryPackageInfo, InstallAction, PackageAbi, PackageSpec};
use depot_cache::provider::{
    AccessMode, Availability, BinaryProvider, FilesystemProvider, ProviderRegistry, RestoreStatus,
};

fn action(name: &str, abi: &str, install_dir: &Path) -> InstallAction {
    InstallAction::new(
        PackageSpec::new(name, "x64-linux"),
        Some(PackageAbi::from(abi)),
        "1.0.0",
    )
    .with_install_dir(install_dir)
}

async fn seed_package(dir: &Path, marker: &str) {
    tokio::fs::create_dir_all(dir.join("lib")).await.unwrap();
    tokio::fs::write(dir.join("lib/marker"), marker.as_bytes())
        .await
        .unwrap();
}

fn files_registry(roots: &[(&Path, AccessMode)]) -> ProviderRegistry {
    let providers: Vec<Arc<dyn BinaryProvider>> = roots
        .iter()
        .map(|(root, mode)| {
            Arc::new(FilesystemProvider::new(*root, *mode)) as Arc<dyn BinaryProvider>
        })
        .collect();
    ProviderRegistry::new(providers)
}

#[tokio::test]
async fn build_push_restore_cycle() {
    let store = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();

    let registry = files_registry(&[(store.path(), AccessMode::ReadWrite)]);
    let mut cache = BinaryCache::new(registry, DiagnosticSink::default());

    let install_dir = work.path().join("installed/zlib");
    let act = action("zlib", "abi-zlib-1", &install_dir);

    // Cold cache: miss.
    assert_eq!(cache.try_restore(&act).await, RestoreStatus::Unavailable);

    // "Build" the package locally, then push on success.
    let built = work.path().join("packages/zlib");
    seed_package(&built, "zlib-bits").await;
    cache.push_success(&act, &built, false);
    let stats = cache.shutdown().await;
    assert_eq!(stats.jobs, 1);

    // A fresh run restores from cache without building.
    let registry = files_registry(&[(store.path(), AccessMode::ReadWrite)]);
    let mut cache = BinaryCache::new(registry, DiagnosticSink::default());
    assert_eq!(cache.try_restore(&act).await, RestoreStatus::Restored);
    let marker = tokio::fs::read_to_string(install_dir.join("lib/marker"))
        .await
        .unwrap();
    assert_eq!(marker, "zlib-bits");
    cache.shutdown().await;
}

#[tokio::test]
async fn push_backfills_every_writable_backend() {
    let primary = TempDir::new().unwrap();
    let secondary = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();

    // Package is only in the secondary backend.
    let seeded = FilesystemProvider::new(secondary.path(), AccessMode::ReadWrite);
    let built = work.path().join("built");
    seed_package(&built, "fmt-bits").await;
    let act = action("fmt", "abi-fmt-1", &work.path().join("installed/fmt"));
    let info = BinaryPackageInfo::from_action(&act).unwrap();
    seeded.push(&info, &built, &DiagnosticSink::default()).await;

    let registry = files_registry(&[
        (primary.path(), AccessMode::ReadWrite),
        (secondary.path(), AccessMode::ReadWrite),
    ]);
    let mut cache = BinaryCache::new(registry, DiagnosticSink::default());

    // Restored from the secondary; then pushing the (restored) tree heals
    // the primary backend too.
    assert_eq!(cache.try_restore(&act).await, RestoreStatus::Restored);
    cache.push_success(&act, &act.install_dir, false);
    cache.shutdown().await;

    assert!(primary
        .path()
        .join("ab/abi-fmt-1/manifest.json")
        .exists());
}

#[tokio::test]
async fn precheck_classifies_mixed_batch_without_files() {
    let store = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();

    let seeded = FilesystemProvider::new(store.path(), AccessMode::ReadWrite);
    let built = work.path().join("built");
    seed_package(&built, "cached-bits").await;
    let cached = action("cached", "abi-cached", &work.path().join("installed/cached"));
    seeded
        .push(
            &BinaryPackageInfo::from_action(&cached).unwrap(),
            &built,
            &DiagnosticSink::default(),
        )
        .await;

    let registry = files_registry(&[(store.path(), AccessMode::Read)]);
    let mut cache = BinaryCache::new(registry, DiagnosticSink::default());

    let missing = action("missing", "abi-missing", &work.path().join("installed/missing"));
    let results = cache.precheck(&[cached.clone(), missing.clone()]).await;

    assert_eq!(results, vec![Availability::Available, Availability::Unavailable]);
    assert!(!cached.install_dir.exists());
    assert!(!missing.install_dir.exists());
    assert!(cache.is_known_unavailable(&PackageAbi::from("abi-missing")));
    cache.shutdown().await;
}

#[tokio::test]
async fn prefetch_restores_a_dependency_batch() {
    let store = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();

    let seeded = FilesystemProvider::new(store.path(), AccessMode::ReadWrite);
    for (name, abi) in [("zlib", "abi-a1"), ("fmt", "abi-b2")] {
        let built = work.path().join("built").join(name);
        seed_package(&built, name).await;
        let act = action(name, abi, &work.path().join("installed").join(name));
        seeded
            .push(
                &BinaryPackageInfo::from_action(&act).unwrap(),
                &built,
                &DiagnosticSink::default(),
            )
            .await;
    }

    let registry = files_registry(&[(store.path(), AccessMode::ReadWrite)]);
    let mut cache = BinaryCache::new(registry, DiagnosticSink::default());

    let head = InstallAction::new(PackageSpec::new("app", "x64-linux"), None, "dev")
        .with_install_dir(work.path().join("installed/app"));
    let actions = vec![
        action("zlib", "abi-a1", &work.path().join("installed/zlib")),
        head,
        action("fmt", "abi-b2", &work.path().join("installed/fmt")),
        action("absent", "abi-c3", &work.path().join("installed/absent")),
    ];
    let mut slots = vec![None; 4];
    cache.prefetch(&actions, &mut slots).await;

    assert_eq!(slots[0], Some(RestoreStatus::Restored));
    assert_eq!(slots[1], None);
    assert_eq!(slots[2], Some(RestoreStatus::Restored));
    assert_eq!(slots[3], Some(RestoreStatus::Unavailable));

    assert!(work.path().join("installed/zlib/lib/marker").exists());
    assert!(work.path().join("installed/fmt/lib/marker").exists());
    assert!(!work.path().join("installed/app").exists());
    cache.shutdown().await;
}

#[tokio::test]
async fn config_file_drives_the_whole_stack() {
    let store = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();

    let config = CacheConfig {
        providers: vec![ProviderSource::Files {
            path: store.path().to_path_buf(),
            mode: AccessMode::ReadWrite,
        }],
        secrets: vec!["deploy-token".to_string()],
    };
    let manager = ConfigManager::with_path(work.path().join("cache.toml"));
    manager.save(&config).await.unwrap();

    let loaded = manager.load().await.unwrap();
    let registry = build_providers(&loaded).unwrap();
    let mut cache = BinaryCache::new(registry, DiagnosticSink::new(loaded.secrets));

    let act = action("zlib", "abi-via-config", &work.path().join("installed/zlib"));
    assert_eq!(cache.try_restore(&act).await, RestoreStatus::Unavailable);

    let built = work.path().join("built");
    seed_package(&built, "bits").await;
    cache.push_success(&act, &built, true);
    let stats = cache.shutdown().await;

    assert_eq!(stats.jobs, 1);
    // cleanup=true removed the build tree after the push.
    assert!(!built.exists());
    assert!(store.path().join("ab/abi-via-config/manifest.json").exists());
}

#[tokio::test]
async fn read_only_backend_is_healed_only_via_writable_ones() {
    let ro_store = TempDir::new().unwrap();
    let rw_store = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();

    let registry = files_registry(&[
        (ro_store.path(), AccessMode::Read),
        (rw_store.path(), AccessMode::ReadWrite),
    ]);
    let mut cache = BinaryCache::new(registry, DiagnosticSink::default());

    let act = action("zlib", "abi-ro", &work.path().join("installed/zlib"));
    let built = work.path().join("built");
    seed_package(&built, "bits").await;
    cache.push_success(&act, &built, false);
    cache.shutdown().await;

    assert!(!ro_store.path().join("ab").exists());
    assert!(rw_store.path().join("ab/abi-ro/manifest.json").exists());
}

#[tokio::test]
async fn missing_everywhere_falls_through_to_build() {
    let store_a = TempDir::new().unwrap();
    let store_b = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();

    let registry = files_registry(&[
        (store_a.path(), AccessMode::ReadWrite),
        (store_b.path(), AccessMode::ReadWrite),
    ]);
    let mut cache = BinaryCache::new(registry, DiagnosticSink::default());

    let act = action("rare", "abi-rare", &work.path().join("installed/rare"));
    assert_eq!(cache.try_restore(&act).await, RestoreStatus::Unavailable);
    assert!(cache.is_known_unavailable(&PackageAbi::from("abi-rare")));
    cache.shutdown().await;
}

#[tokio::test]
async fn install_dir_path_is_opaque_to_the_cache() {
    // Nested install prefixes are created as-is, never interpreted.
    let store = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();

    let registry = files_registry(&[(store.path(), AccessMode::ReadWrite)]);
    let mut cache = BinaryCache::new(registry, DiagnosticSink::default());

    let deep: PathBuf = work.path().join("a/b/c/installed/zlib");
    let act = action("zlib", "abi-deep", &deep);
    let built = work.path().join("built");
    seed_package(&built, "bits").await;
    cache.push_success(&act, &built, false);
    cache.shutdown().await;

    let registry = files_registry(&[(store.path(), AccessMode::ReadWrite)]);
    let mut cache = BinaryCache::new(registry, DiagnosticSink::default());
    assert_eq!(cache.try_restore(&act).await, RestoreStatus::Restored);
    assert!(deep.join("lib/marker").exists());
    cache.shutdown().await;
}
