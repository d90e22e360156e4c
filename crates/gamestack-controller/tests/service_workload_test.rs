// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Service-backed workload tests against in-memory control-plane doubles.

mod common;

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use common::{MemoryObjectStore, RecordingScheduler, SchedulerCall};
use gamestack_cloud::{ErrorKind, ObjectLocation};
use gamestack_controller::workload::{
    AdapterError, BackupCatalog, BackupRef, ServiceWorkload, ServiceWorkloadConfig, Workload,
    WorkloadType,
};
use gamestack_controller::{
    Error, MemoryStateStore, Orchestrator, WorkloadEntry, WorkloadRegistry,
};
use tempfile::TempDir;
use walkdir::WalkDir;

const BUCKET: &str = "game-backups";

fn config(data_dir: &Path) -> ServiceWorkloadConfig {
    let mut config = ServiceWorkloadConfig::new(WorkloadType::MINECRAFT, data_dir);
    config.cluster = Some("games".to_string());
    config.service = Some("minecraft".to_string());
    config.bucket = Some(BUCKET.to_string());
    config
}

fn adapter(
    data_dir: &Path,
    store: &Arc<MemoryObjectStore>,
    scheduler: &Arc<RecordingScheduler>,
) -> ServiceWorkload {
    ServiceWorkload::new(config(data_dir))
        .with_object_store(store.clone())
        .with_scheduler(scheduler.clone())
}

fn write_tree(root: &Path) {
    std::fs::create_dir_all(root.join("world/region")).unwrap();
    std::fs::create_dir_all(root.join("world/playerdata")).unwrap();
    std::fs::write(root.join("server.properties"), "level-name=world\nmotd=hi\n").unwrap();
    std::fs::write(root.join("world/level.dat"), vec![0xABu8; 1024]).unwrap();
    std::fs::write(
        root.join("world/region/r.0.0.mca"),
        (0..50_000u32).map(|i| (i % 251) as u8).collect::<Vec<_>>(),
    )
    .unwrap();
}

fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap().to_string_lossy().into_owned();
            (rel, std::fs::read(e.path()).unwrap())
        })
        .collect()
}

#[tokio::test]
async fn test_backup_then_restore_round_trips_byte_for_byte() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("data");
    write_tree(&data_dir);
    let original = snapshot(&data_dir);

    let store = Arc::new(MemoryObjectStore::new());
    let scheduler = Arc::new(RecordingScheduler::new());
    let mc = adapter(&data_dir, &store, &scheduler);

    let backup = mc.backup().await.unwrap();
    assert!(backup.as_str().starts_with("s3://game-backups/backups/minecraft/"));
    assert!(backup.as_str().ends_with(".zip"));

    // Marker holds the key of the new backup.
    let marker = ObjectLocation::new(BUCKET, "backups/minecraft/latest.txt").unwrap();
    let marker_value = String::from_utf8(store.get(&marker).await.unwrap()).unwrap();
    assert_eq!(format!("s3://{}/{}", BUCKET, marker_value), backup.as_str());

    // Drift the data directory, then restore.
    std::fs::remove_file(data_dir.join("world/level.dat")).unwrap();
    std::fs::write(data_dir.join("server.properties"), "corrupted").unwrap();
    std::fs::write(data_dir.join("stale.log"), "old").unwrap();

    mc.restore(&backup).await.unwrap();
    assert_eq!(snapshot(&data_dir), original);

    let status = mc.status().await.unwrap();
    assert_eq!(status["last_backup"], backup.as_str());
    assert_eq!(status["bucket"], BUCKET);
}

#[tokio::test]
async fn test_latest_backup_resolved_from_marker() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("data");
    write_tree(&data_dir);

    let store = Arc::new(MemoryObjectStore::new());
    let scheduler = Arc::new(RecordingScheduler::new());
    let backup = adapter(&data_dir, &store, &scheduler).backup().await.unwrap();

    // A fresh adapter has no cache and must read the marker.
    let fresh = adapter(&data_dir, &store, &scheduler);
    assert_eq!(fresh.latest_backup().await.unwrap(), backup);
}

#[tokio::test]
async fn test_latest_backup_missing_marker_is_not_found() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(MemoryObjectStore::new());
    let scheduler = Arc::new(RecordingScheduler::new());
    let mc = adapter(temp.path(), &store, &scheduler);

    let err = mc.latest_backup().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_blank_marker_means_no_backup() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(MemoryObjectStore::new());
    let marker = ObjectLocation::new(BUCKET, "backups/minecraft/latest.txt").unwrap();
    store.insert(&marker, b"  \n".to_vec()).await;
    let scheduler = Arc::new(RecordingScheduler::new());

    let err = adapter(temp.path(), &store, &scheduler)
        .latest_backup()
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::NoBackup(_)));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let orchestrator = Orchestrator::new(
        Arc::new(MemoryStateStore::new()),
        WorkloadRegistry::new().with(WorkloadEntry::full(Arc::new(adapter(
            temp.path(),
            &store,
            &scheduler,
        )))),
    );
    assert!(matches!(
        orchestrator.start("minecraft", None).await,
        Err(Error::NoBackup(_))
    ));
    assert!(scheduler.calls().await.is_empty());
}

#[tokio::test]
async fn test_marker_failure_does_not_fail_backup() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("data");
    write_tree(&data_dir);

    let store = Arc::new(MemoryObjectStore::failing_puts("latest.txt"));
    let scheduler = Arc::new(RecordingScheduler::new());
    let mc = adapter(&data_dir, &store, &scheduler);

    let backup = mc.backup().await.unwrap();
    let keys = store.keys().await;
    assert_eq!(keys, vec![backup.as_str().to_string()]);
}

#[tokio::test]
async fn test_restore_rejects_traversal_entry() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("srv/data");
    std::fs::create_dir_all(&data_dir).unwrap();
    std::fs::write(data_dir.join("keep.txt"), "keep").unwrap();

    let mut buffer = std::io::Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buffer);
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("ok.txt", options).unwrap();
        zip.write_all(b"fine").unwrap();
        zip.start_file("../../etc/passwd", options).unwrap();
        zip.write_all(b"root::0:0").unwrap();
        zip.finish().unwrap();
    }

    let store = Arc::new(MemoryObjectStore::new());
    let location = ObjectLocation::new(BUCKET, "backups/minecraft/evil.zip").unwrap();
    store.insert(&location, buffer.into_inner()).await;

    let scheduler = Arc::new(RecordingScheduler::new());
    let mc = adapter(&data_dir, &store, &scheduler);
    let err = mc
        .restore(&BackupRef::new("backups/minecraft/evil.zip").unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, AdapterError::UnsafeArchiveEntry(_)));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(std::fs::read_to_string(data_dir.join("keep.txt")).unwrap(), "keep");
    assert!(!data_dir.join("ok.txt").exists());
    assert!(!temp.path().join("etc/passwd").exists());
}

#[tokio::test]
async fn test_restore_of_missing_object_is_not_found() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(MemoryObjectStore::new());
    let scheduler = Arc::new(RecordingScheduler::new());
    let mc = adapter(temp.path(), &store, &scheduler);

    let err = mc
        .restore(&BackupRef::new("s3://game-backups/backups/minecraft/gone.zip").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_unconfigured_bucket_is_configuration_error() {
    let temp = TempDir::new().unwrap();
    let mut settings = config(temp.path());
    settings.bucket = None;
    let mc = ServiceWorkload::new(settings).with_object_store(Arc::new(MemoryObjectStore::new()));

    assert_eq!(mc.backup().await.unwrap_err().kind(), ErrorKind::Configuration);
    assert_eq!(
        mc.latest_backup().await.unwrap_err().kind(),
        ErrorKind::Configuration
    );
}

// ============================================================================
// Scaling
// ============================================================================

#[tokio::test]
async fn test_start_and_stop_scale_service() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(MemoryObjectStore::new());
    let scheduler = Arc::new(RecordingScheduler::new());
    let mc = adapter(temp.path(), &store, &scheduler);

    mc.start().await.unwrap();
    mc.stop().await.unwrap();

    assert_eq!(
        scheduler.calls().await,
        vec![
            SchedulerCall::Scale {
                cluster: "games".to_string(),
                service: "minecraft".to_string(),
                desired: 1,
                force: true,
            },
            SchedulerCall::WaitStable {
                service: "minecraft".to_string()
            },
            SchedulerCall::Scale {
                cluster: "games".to_string(),
                service: "minecraft".to_string(),
                desired: 0,
                force: false,
            },
            SchedulerCall::WaitStable {
                service: "minecraft".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn test_stabilization_timeout_surfaces_as_timeout() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(MemoryObjectStore::new());
    let scheduler = Arc::new(RecordingScheduler::never_stable());
    let mc = adapter(temp.path(), &store, &scheduler);

    let err = mc.start().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(mc.status().await.unwrap()["running"], false);
}

// ============================================================================
// Orchestrated
// ============================================================================

#[tokio::test]
async fn test_orchestrated_start_falls_back_to_latest_marker() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("data");
    write_tree(&data_dir);
    let original = snapshot(&data_dir);

    let store = Arc::new(MemoryObjectStore::new());
    let scheduler = Arc::new(RecordingScheduler::new());

    // Empty store: no backup anywhere.
    let empty_temp = TempDir::new().unwrap();
    let empty = Orchestrator::new(
        Arc::new(MemoryStateStore::new()),
        WorkloadRegistry::new().with(WorkloadEntry::full(Arc::new(adapter(
            empty_temp.path(),
            &Arc::new(MemoryObjectStore::new()),
            &scheduler,
        )))),
    );
    assert!(matches!(
        empty.start("minecraft", None).await,
        Err(Error::NoBackup(_))
    ));

    // Seed the store with a backup from a previous run.
    let backup = adapter(&data_dir, &store, &scheduler).backup().await.unwrap();
    std::fs::remove_dir_all(&data_dir).unwrap();

    let orchestrator = Orchestrator::new(
        Arc::new(MemoryStateStore::new()),
        WorkloadRegistry::new().with(WorkloadEntry::full(Arc::new(adapter(
            &data_dir, &store, &scheduler,
        )))),
    );
    let started = orchestrator.start("minecraft", None).await.unwrap();
    assert_eq!(started.backup, Some(backup));
    assert_eq!(snapshot(&data_dir), original);

    let status = orchestrator.status().await.unwrap();
    let live = status.workload_status.unwrap();
    assert_eq!(live["running"], true);
    assert_eq!(live["cluster"], "games");
}
