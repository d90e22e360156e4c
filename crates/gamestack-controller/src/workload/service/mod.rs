// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workload adapter backed by a scheduler service and an object store.
//!
//! - Start/stop scale the configured service to 1/0 and wait until stable
//! - Backup zips the local data directory, uploads it, then updates the
//!   `latest.txt` marker (best effort)
//! - Restore downloads a backup and replaces the data directory
//! - Source sync seeds from / publishes to git
//!
//! Scaling is skipped when no scheduler, cluster or service is configured.
//! Backup and restore fail with a configuration error when no object store
//! or bucket is configured.

pub mod archive;
mod fs;
mod git;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gamestack_cloud::{DEFAULT_STABLE_TIMEOUT, ObjectLocation, ObjectStore, ServiceScheduler};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub use git::{
    DEFAULT_AUTHOR_EMAIL, DEFAULT_AUTHOR_NAME, GitIdentity, SyncOutcome, TOKEN_USERNAME,
};

use super::traits::*;
use super::types::{BackupRef, SourceLocator, WorkloadType};
use git::GitPipeline;

/// Name of the marker object holding the key of the most recent backup.
pub const LATEST_MARKER: &str = "latest.txt";

/// Settings of a [`ServiceWorkload`].
#[derive(Debug, Clone)]
pub struct ServiceWorkloadConfig {
    /// Workload type this adapter owns
    pub workload: WorkloadType,
    /// Scheduler cluster
    pub cluster: Option<String>,
    /// Scheduler service
    pub service: Option<String>,
    /// Backup bucket
    pub bucket: Option<String>,
    /// Backup key prefix, without surrounding slashes
    pub backup_prefix: String,
    /// Local persistent data directory
    pub data_dir: PathBuf,
    /// Git author and token for source sync
    pub git: GitIdentity,
    /// Deadline for the service to stabilize after scaling
    pub stable_timeout: Duration,
}

impl ServiceWorkloadConfig {
    /// Settings with nothing external configured.
    pub fn new(workload: WorkloadType, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            workload,
            cluster: None,
            service: None,
            bucket: None,
            backup_prefix: "backups".to_string(),
            data_dir: data_dir.into(),
            git: GitIdentity::default(),
            stable_timeout: DEFAULT_STABLE_TIMEOUT,
        }
    }
}

#[derive(Debug, Default)]
struct AdapterState {
    running: bool,
    last_backup: Option<BackupRef>,
    last_source: Option<SourceLocator>,
}

/// Adapter for a game server running as a scheduler service.
pub struct ServiceWorkload {
    config: ServiceWorkloadConfig,
    scheduler: Option<Arc<dyn ServiceScheduler>>,
    store: Option<Arc<dyn ObjectStore>>,
    state: Mutex<AdapterState>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn optional(value: Option<&str>) -> Value {
    value.map_or(Value::Null, Value::from)
}

impl ServiceWorkload {
    /// Create an adapter with no scheduler or object store attached.
    pub fn new(config: ServiceWorkloadConfig) -> Self {
        Self {
            config,
            scheduler: None,
            store: None,
            state: Mutex::new(AdapterState::default()),
        }
    }

    /// Attach the scheduler used for scaling.
    pub fn with_scheduler(mut self, scheduler: Arc<dyn ServiceScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Attach the object store used for backups.
    pub fn with_object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    fn scaling(&self) -> Option<(&dyn ServiceScheduler, &str, &str)> {
        let scheduler = self.scheduler.as_deref()?;
        let cluster = non_empty(&self.config.cluster)?;
        let service = non_empty(&self.config.service)?;
        Some((scheduler, cluster, service))
    }

    fn storage(&self) -> Result<(&dyn ObjectStore, &str)> {
        match (self.store.as_deref(), non_empty(&self.config.bucket)) {
            (Some(store), Some(bucket)) => Ok((store, bucket)),
            _ => Err(AdapterError::NotConfigured(format!(
                "backup storage is not configured for {}",
                self.config.workload
            ))),
        }
    }

    fn key_prefix(&self) -> String {
        let prefix = self.config.backup_prefix.trim_matches('/');
        if prefix.is_empty() {
            self.config.workload.to_string()
        } else {
            format!("{}/{}", prefix, self.config.workload)
        }
    }

    /// Object key of a backup taken at `at`.
    pub fn backup_key(&self, at: DateTime<Utc>) -> String {
        format!("{}/{}.zip", self.key_prefix(), at.format("%Y%m%d-%H%M%S"))
    }

    /// Object key of the latest-backup marker.
    pub fn latest_marker_key(&self) -> String {
        format!("{}/{}", self.key_prefix(), LATEST_MARKER)
    }

    async fn scale(&self, desired: u32) -> Result<()> {
        let Some((scheduler, cluster, service)) = self.scaling() else {
            info!(
                workload = %self.config.workload,
                desired,
                "No scheduler service configured, skipping scale"
            );
            return Ok(());
        };

        info!(workload = %self.config.workload, cluster, service, desired, "Scaling service");
        scheduler
            .set_desired_count(cluster, service, desired, desired > 0)
            .await?;
        scheduler
            .wait_until_stable(cluster, service, self.config.stable_timeout)
            .await?;
        Ok(())
    }

    fn scratch_dir(&self, purpose: &str) -> Result<tempfile::TempDir> {
        tempfile::Builder::new()
            .prefix(&format!("gamestack-{}-{}-", self.config.workload, purpose))
            .tempdir()
            .map_err(|e| AdapterError::io(std::env::temp_dir(), e))
    }
}

#[async_trait]
impl Workload for ServiceWorkload {
    fn workload_type(&self) -> &WorkloadType {
        &self.config.workload
    }

    async fn start(&self) -> Result<()> {
        self.scale(1).await?;
        self.state.lock().await.running = true;
        info!(workload = %self.config.workload, "Workload started");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.scale(0).await?;
        self.state.lock().await.running = false;
        info!(workload = %self.config.workload, "Workload stopped");
        Ok(())
    }

    async fn backup(&self) -> Result<BackupRef> {
        let (store, bucket) = self.storage()?;
        let data_dir = self.config.data_dir.clone();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .map_err(|e| AdapterError::io(&data_dir, e))?;

        let scratch = self.scratch_dir("backup")?;
        let archive_path = scratch.path().join("backup.zip");
        let zip_path = archive_path.clone();
        let stats = tokio::task::spawn_blocking(move || {
            archive::zip_directory(&data_dir, &zip_path)
        })
        .await??;

        let location = ObjectLocation::new(bucket, &self.backup_key(Utc::now()))?;
        store.upload_file(&location, &archive_path).await?;

        let marker = ObjectLocation::new(bucket, &self.latest_marker_key())?;
        if let Err(e) = store.put_string(&marker, &location.key).await {
            warn!(
                workload = %self.config.workload,
                marker = %marker,
                error = %e,
                "Failed to update latest backup marker"
            );
        }

        let backup = BackupRef::from(&location);
        self.state.lock().await.last_backup = Some(backup.clone());
        info!(
            workload = %self.config.workload,
            backup = %backup,
            files = stats.files,
            skipped = stats.skipped,
            "Backup uploaded"
        );
        Ok(backup)
    }

    async fn restore(&self, backup: &BackupRef) -> Result<()> {
        let (store, bucket) = self.storage()?;
        let location = ObjectLocation::parse(backup.as_str(), Some(bucket))?;

        let scratch = self.scratch_dir("restore")?;
        let archive_path = scratch.path().join("backup.zip");
        store.download_file(&location, &archive_path).await?;

        let data_dir = self.config.data_dir.clone();
        let stats = tokio::task::spawn_blocking(move || {
            archive::restore_archive(&archive_path, &data_dir)
        })
        .await??;

        self.state.lock().await.last_backup = Some(BackupRef::from(&location));
        info!(
            workload = %self.config.workload,
            backup = %location,
            files = stats.files,
            "Backup restored"
        );
        Ok(())
    }

    async fn send_command(&self, command: &str) -> Result<()> {
        // No console transport yet; the command is accepted and logged.
        info!(workload = %self.config.workload, command, "Console command received");
        Ok(())
    }

    async fn status(&self) -> Result<WorkloadStatus> {
        let state = self.state.lock().await;

        let mut status = WorkloadStatus::new();
        status.insert(
            "adapter".to_string(),
            Value::from(self.config.workload.as_str()),
        );
        status.insert("ready".to_string(), Value::Bool(true));
        status.insert("running".to_string(), Value::Bool(state.running));
        status.insert(
            "last_backup".to_string(),
            optional(state.last_backup.as_ref().map(BackupRef::as_str)),
        );
        status.insert(
            "last_source".to_string(),
            optional(state.last_source.as_ref().map(SourceLocator::as_str)),
        );
        status.insert("cluster".to_string(), optional(non_empty(&self.config.cluster)));
        status.insert("service".to_string(), optional(non_empty(&self.config.service)));
        status.insert("bucket".to_string(), optional(non_empty(&self.config.bucket)));
        Ok(status)
    }
}

#[async_trait]
impl SourceSync for ServiceWorkload {
    async fn seed_from_source(&self, source: &SourceLocator) -> Result<()> {
        GitPipeline::new(&self.config.git, &self.config.workload)
            .seed(source, &self.config.data_dir)
            .await?;
        self.state.lock().await.last_source = Some(source.clone());
        Ok(())
    }

    async fn sync_to_source(&self, source: &SourceLocator) -> Result<()> {
        let outcome = GitPipeline::new(&self.config.git, &self.config.workload)
            .sync(source, &self.config.data_dir)
            .await?;
        self.state.lock().await.last_source = Some(source.clone());
        info!(workload = %self.config.workload, ?outcome, "Source sync finished");
        Ok(())
    }
}

#[async_trait]
impl BackupCatalog for ServiceWorkload {
    async fn latest_backup(&self) -> Result<BackupRef> {
        if let Some(backup) = self.state.lock().await.last_backup.clone() {
            return Ok(backup);
        }

        let (store, bucket) = self.storage()?;
        let marker = ObjectLocation::new(bucket, &self.latest_marker_key())?;
        let key = store.get_string(&marker).await?;
        let key = key.trim();
        if key.is_empty() {
            return Err(AdapterError::NoBackup(format!("marker {} is empty", marker)));
        }
        let location = ObjectLocation::parse(key, Some(bucket))?;

        let backup = BackupRef::from(&location);
        self.state.lock().await.last_backup = Some(backup.clone());
        Ok(backup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn adapter(prefix: &str, bucket: Option<&str>) -> ServiceWorkload {
        let mut config = ServiceWorkloadConfig::new(WorkloadType::MINECRAFT, "/tmp/unused");
        config.backup_prefix = prefix.to_string();
        config.bucket = bucket.map(str::to_string);
        ServiceWorkload::new(config)
    }

    #[test]
    fn test_backup_keys() {
        let mc = adapter("backups", Some("b"));
        let at = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(mc.backup_key(at), "backups/minecraft/20250304-050607.zip");
        assert_eq!(mc.latest_marker_key(), "backups/minecraft/latest.txt");

        let bare = adapter("", Some("b"));
        assert_eq!(bare.latest_marker_key(), "minecraft/latest.txt");
    }

    #[tokio::test]
    async fn test_backup_without_storage_is_configuration_error() {
        let mc = adapter("backups", None);
        let err = mc.backup().await.unwrap_err();
        assert_eq!(err.kind(), gamestack_cloud::ErrorKind::Configuration);

        let err = mc
            .restore(&BackupRef::new("s3://b/k.zip").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), gamestack_cloud::ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_start_without_scheduler_only_flips_state() {
        let mc = adapter("backups", None);
        mc.start().await.unwrap();
        let status = mc.status().await.unwrap();
        assert_eq!(status["running"], true);
        assert_eq!(status["cluster"], Value::Null);
        mc.stop().await.unwrap();
        assert_eq!(mc.status().await.unwrap()["running"], false);
    }
}
