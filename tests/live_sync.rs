//! Live sync against a real file-system watch and the in-memory runtime.
//!
//! The watcher runs on the OS notification thread, so these tests poll the
//! stub for the expected push with a deadline instead of asserting at once.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use brewctl::config::SyncConfig;
use brewctl::runtime::{ContainerRecord, ContainerStatus};
use brewctl::sync::{LiveSyncEngine, MANIFEST_FILE, PluginManifest};
use brewctl::testing::StubRuntime;

fn plugin_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(MANIFEST_FILE),
        "plugin:\n  name: tracker\n  version: 0.1.0\n",
    )
    .unwrap();
    std::fs::create_dir(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("src/app.py"), "print('v1')\n").unwrap();
    dir
}

fn stub_with_core() -> Arc<StubRuntime> {
    let stub = Arc::new(StubRuntime::new());
    stub.insert(ContainerRecord::new(
        "core-1",
        "brewctl-core",
        ContainerStatus::Running,
        "brewctl/core:dev",
    ));
    stub
}

async fn wait_for_push(stub: &StubRuntime, path: &str) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if stub.pushes().iter().any(|p| p.path == path) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}

fn config() -> SyncConfig {
    SyncConfig {
        debounce: Duration::from_millis(50),
        ..SyncConfig::default()
    }
}

#[tokio::test]
async fn mirror_then_watch_pushes_edits() {
    let stub = stub_with_core();
    let engine = LiveSyncEngine::new(stub.clone(), &config()).unwrap();
    let dir = plugin_dir();
    let manifest = PluginManifest::load(dir.path()).unwrap();

    assert_eq!(engine.mirror(&manifest, dir.path(), None).await.unwrap(), 1);
    assert!(wait_for_push(&stub, "/plugins/tracker/src/app.py").await);

    engine.start(dir.path(), None).await.unwrap();
    // Give the OS watch a moment to arm.
    tokio::time::sleep(Duration::from_millis(200)).await;

    std::fs::write(dir.path().join("src/new_module.py"), "x = 1\n").unwrap();
    assert!(
        wait_for_push(&stub, "/plugins/tracker/src/new_module.py").await,
        "edit should have been pushed into the container"
    );
    assert!(
        stub.execs()
            .iter()
            .any(|(_, argv)| argv[0] == "sh" && argv[2].contains(".reload/tracker")),
        "reload trigger should have run"
    );

    engine.stop_all().await;
    assert!(engine.active().await.is_empty());
}

#[tokio::test]
async fn ignored_files_are_not_pushed() {
    let stub = stub_with_core();
    let engine = LiveSyncEngine::new(stub.clone(), &config()).unwrap();
    let dir = plugin_dir();

    engine.start(dir.path(), None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    std::fs::create_dir(dir.path().join("node_modules")).unwrap();
    std::fs::write(dir.path().join("node_modules/dep.js"), "module.exports = 1").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "scratch").unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert!(stub.pushes().is_empty());
    engine.stop("tracker").await;
}

#[tokio::test]
async fn sync_survives_a_missing_target() {
    let stub = Arc::new(StubRuntime::new());
    let engine = LiveSyncEngine::new(stub.clone(), &config()).unwrap();
    let dir = plugin_dir();

    engine
        .start(dir.path(), Some("not-running"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    std::fs::write(dir.path().join("src/app.py"), "print('v2')\n").unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    // The push failed, but the registration is still active.
    let active = engine.active().await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].container, "not-running");
    assert!(Path::new(&active[0].plugin_dir).is_absolute());
    engine.stop_all().await;
}

#[cfg(unix)]
#[tokio::test]
async fn edits_through_a_symlinked_plugin_dir_are_pushed() {
    let stub = stub_with_core();
    let engine = LiveSyncEngine::new(stub.clone(), &config()).unwrap();
    let real = plugin_dir();
    let links = tempfile::tempdir().unwrap();
    let link = links.path().join("tracker");
    std::os::unix::fs::symlink(real.path(), &link).unwrap();

    engine.start(&link, None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    std::fs::write(link.join("src/linked.py"), "y = 2\n").unwrap();
    assert!(
        wait_for_push(&stub, "/plugins/tracker/src/linked.py").await,
        "edit through the symlink should have been pushed"
    );
    engine.stop_all().await;
}

