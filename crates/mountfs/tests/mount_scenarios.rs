//! End-to-end routing scenarios across every store kind

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use mountfs::{
    ErrorCode, FileSystem, FlatFs, HandleFs, InMemoryFs, MemoryStorageArea, MemoryStorageManager,
    MountFs, ProjectLayout, SnapshotDependency, StaticFs, WatchEvent,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn lib_snapshot() -> StaticFs {
    StaticFs::from_value(json!({ "a.txt": STANDARD.encode("hi") })).unwrap()
}

#[tokio::test]
async fn static_lib_inside_mutable_root() {
    let router = MountFs::new();
    // First match wins, so the nested mount goes first
    router
        .mount("file:///root/lib/", Arc::new(lib_snapshot()))
        .mount("file:///root/", Arc::new(InMemoryFs::new()));

    assert_eq!(router.read_file("file:///root/lib/a.txt").await.unwrap(), b"hi");
    assert_eq!(
        router
            .write_file("file:///root/lib/a.txt", b"x")
            .await
            .unwrap_err()
            .code(),
        ErrorCode::PermissionDenied
    );

    router.write_file("file:///root/new.txt", b"new").await.unwrap();
    assert_eq!(router.read_file("file:///root/new.txt").await.unwrap(), b"new");
}

#[tokio::test]
async fn general_mount_first_shadows_lib() {
    let router = MountFs::new();
    router
        .mount("file:///root/", Arc::new(InMemoryFs::new()))
        .mount("file:///root/lib/", Arc::new(lib_snapshot()));

    assert_eq!(
        router
            .read_file("file:///root/lib/a.txt")
            .await
            .unwrap_err()
            .code(),
        ErrorCode::NotFound
    );
}

#[tokio::test]
async fn flat_store_overwrite_returns_latest() {
    let storage = Arc::new(MemoryStorageArea::new());
    let router = MountFs::new();
    router.mount("file:///", Arc::new(FlatFs::open("p", storage.clone()).await.unwrap()));

    router.write_file("file:///f", b"one").await.unwrap();
    router.write_file("file:///f", b"two").await.unwrap();
    assert_eq!(router.read_file("file:///f").await.unwrap(), b"two");

    let reopened = FlatFs::open("p", storage).await.unwrap();
    assert_eq!(reopened.read_file("file:///f").await.unwrap(), b"two");
}

#[tokio::test]
async fn unmounted_prefix_is_eacces() {
    let router = MountFs::new();
    router.mount("file:///a/", Arc::new(InMemoryFs::new()));
    router.write_file("file:///a/x", b"x").await.unwrap();

    assert_eq!(router.unmount("file:///zzz/"), 0);
    assert_eq!(
        router.read_file("file:///zzz/y").await.unwrap_err().code(),
        ErrorCode::AccessDenied
    );
    assert_eq!(router.read_file("file:///a/x").await.unwrap(), b"x");
    assert_eq!(router.unmount("file:///a/"), 1);
    assert_eq!(
        router.read_file("file:///a/x").await.unwrap_err().code(),
        ErrorCode::AccessDenied
    );
}

#[tokio::test]
async fn every_store_kind_behind_one_router() {
    let manager = MemoryStorageManager::default();
    let handle = HandleFs::create(&manager, "proj").await.unwrap();
    let flat = FlatFs::open("cache", Arc::new(MemoryStorageArea::new()))
        .await
        .unwrap();

    let layout = ProjectLayout::new(Arc::new(handle), Arc::new(flat))
        .dependency(SnapshotDependency::new("vanilla", lib_snapshot()));
    let fs = layout.build();

    fs.mkdir("file:///root/src", false).await.unwrap();
    fs.write_file("file:///root/src/main", b"m").await.unwrap();
    fs.write_file("file:///cache/index", b"i").await.unwrap();

    assert_eq!(fs.read_file("file:///root/src/main").await.unwrap(), b"m");
    assert_eq!(fs.read_file("file:///cache/index").await.unwrap(), b"i");
    assert_eq!(fs.read_file("file:///vanilla/a.txt").await.unwrap(), b"hi");
    assert_eq!(layout.dependency_names(), vec!["@vanilla"]);

    // Each store keeps its own error semantics through the router
    assert_eq!(
        fs.read_dir("file:///root/src/main").await.unwrap_err().code(),
        ErrorCode::NotADirectory
    );
    assert!(fs.read_dir("file:///cache/").await.unwrap().is_empty());
    assert_eq!(
        fs.remove("file:///vanilla/a.txt").await.unwrap_err().code(),
        ErrorCode::PermissionDenied
    );
}

#[tokio::test]
async fn watch_reports_ready_through_router() {
    let router = MountFs::new();
    router.mount("file:///", Arc::new(InMemoryFs::new()));

    let ready = Arc::new(AtomicBool::new(false));
    let flag = ready.clone();
    let watcher = router.watch(&["file:///a".to_string()]);
    watcher.on(
        WatchEvent::Ready,
        Box::new(move |_| flag.store(true, Ordering::SeqCst)),
    );
    watcher.on(WatchEvent::Change, Box::new(|_| panic!("never emitted")));
    assert!(ready.load(Ordering::SeqCst));
    watcher.close();
}
