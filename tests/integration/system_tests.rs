//! System-mode runs end to end

use crate::idle_archiver;
use snapshot_archiver::config::parse_config;
use snapshot_archiver::load_system_snapshot;
use snapshot_archiver::storage::{lock_path_for, LockGuard, PlatformLock};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_archive_system_from_toml_config() {
    let config = parse_config(
        r#"
        [limits]
        max-file-size = 64
        max-depth = 1

        [scan]
        batch-size = 2

        [security]
        restricted-paths = []
        "#,
    )
    .unwrap();

    let source = TempDir::new().unwrap();
    let root = source.path();
    fs::write(root.join("notes.txt"), "plain notes\n").unwrap();
    fs::write(root.join("big.txt"), "x".repeat(200)).unwrap();
    fs::write(root.join("cache.pyc"), "ignored").unwrap();
    fs::create_dir_all(root.join("a/b")).unwrap();
    fs::write(root.join("a/conf.yaml"), "key: value\n").unwrap();
    fs::write(root.join("a/b/deep.txt"), "too deep").unwrap();
    fs::create_dir_all(root.join("node_modules")).unwrap();
    fs::write(root.join("node_modules/dep.js"), "x").unwrap();

    let out = TempDir::new().unwrap();
    let archiver = idle_archiver(config);
    let outcome = archiver
        .archive_system(root, out.path(), None)
        .await
        .unwrap();

    // notes.txt, big.txt and a/conf.yaml are within depth and not excluded
    let stats = outcome.statistics;
    assert_eq!(stats.total_files, 3);
    assert_eq!(stats.processed_files, 2);
    assert_eq!(stats.skipped_files, 1);

    let doc = load_system_snapshot(archiver.store(), &outcome.path).unwrap();
    let system = &doc["system"];
    assert_eq!(system["metadata"]["base_path"], root.display().to_string().as_str());
    assert_eq!(system["metadata"]["config"]["max_file_size"], 64);
    assert_eq!(system["metadata"]["config"]["max_depth"], 1);

    let contents = system["contents"].as_sequence().unwrap();
    let big = contents
        .iter()
        .find(|c| c["path"].as_str().unwrap().ends_with("big.txt"))
        .unwrap();
    assert_eq!(big["skipped"], "size_limit_exceeded");
    assert!(contents
        .iter()
        .all(|c| !c["path"].as_str().unwrap().contains("node_modules")));
}

#[tokio::test]
async fn test_lock_released_after_write() {
    let source = TempDir::new().unwrap();
    fs::write(source.path().join("one.md"), "# One\n").unwrap();
    let out = TempDir::new().unwrap();

    let outcome = idle_archiver(crate::test_config())
        .archive_system(source.path(), out.path(), None)
        .await
        .unwrap();
    assert!(outcome.path.is_file());

    let held = LockGuard::acquire(&outcome.path, Arc::new(PlatformLock)).unwrap();
    assert!(held.is_some());
    assert!(lock_path_for(&outcome.path).exists());
}
