// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stub workload adapter.
//!
//! Records lifecycle calls in memory without touching any infrastructure.
//! Used for workloads that have no real tooling yet, and in tests.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::info;

use super::traits::*;
use super::types::{BackupRef, SourceLocator, WorkloadType};

/// Status note reported by stub workloads.
pub const STUB_NOTE: &str = "stub until official tooling exists";

#[derive(Debug, Default)]
struct StubState {
    running: bool,
    last_backup: Option<BackupRef>,
    last_source: Option<SourceLocator>,
    calls: Vec<String>,
}

/// In-memory workload adapter.
pub struct StubWorkload {
    workload_type: WorkloadType,
    state: Mutex<StubState>,
    /// Simulated duration of each operation
    pub delay: Duration,
    /// If true, `start` fails
    pub fail_start: bool,
}

impl StubWorkload {
    /// Create a stub for the given workload type.
    pub fn new(workload_type: WorkloadType) -> Self {
        Self {
            workload_type,
            state: Mutex::new(StubState::default()),
            delay: Duration::ZERO,
            fail_start: false,
        }
    }

    /// Create a stub whose `start` always fails.
    pub fn failing(workload_type: WorkloadType) -> Self {
        Self {
            fail_start: true,
            ..Self::new(workload_type)
        }
    }

    /// Make every operation take `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Journal of operations, in order.
    ///
    /// Each operation appends `<op>` when entered and `<op>:done` when it
    /// completes successfully.
    pub async fn calls(&self) -> Vec<String> {
        self.state.lock().await.calls.clone()
    }

    /// Whether the stub is currently marked running.
    pub async fn is_running(&self) -> bool {
        self.state.lock().await.running
    }

    async fn enter(&self, op: &str) {
        self.state.lock().await.calls.push(op.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    async fn done(&self, op: &str) {
        self.state.lock().await.calls.push(format!("{}:done", op));
    }
}

#[async_trait]
impl Workload for StubWorkload {
    fn workload_type(&self) -> &WorkloadType {
        &self.workload_type
    }

    async fn start(&self) -> Result<()> {
        self.enter("start").await;
        if self.fail_start {
            return Err(AdapterError::Other(format!(
                "{} stub configured to fail",
                self.workload_type
            )));
        }
        self.state.lock().await.running = true;
        info!(workload = %self.workload_type, "Stub workload started");
        self.done("start").await;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.enter("stop").await;
        self.state.lock().await.running = false;
        info!(workload = %self.workload_type, "Stub workload stopped");
        self.done("stop").await;
        Ok(())
    }

    async fn backup(&self) -> Result<BackupRef> {
        self.enter("backup").await;
        let backup = BackupRef::new(format!(
            "s3://backups/{}/{}.zip",
            self.workload_type,
            Utc::now().format("%Y%m%d-%H%M%S")
        ))?;
        self.state.lock().await.last_backup = Some(backup.clone());
        self.done("backup").await;
        Ok(backup)
    }

    async fn restore(&self, backup: &BackupRef) -> Result<()> {
        self.enter("restore").await;
        self.state.lock().await.last_backup = Some(backup.clone());
        self.done("restore").await;
        Ok(())
    }

    async fn send_command(&self, command: &str) -> Result<()> {
        self.enter("command").await;
        info!(workload = %self.workload_type, command, "Stub workload received command");
        self.done("command").await;
        Ok(())
    }

    async fn status(&self) -> Result<WorkloadStatus> {
        let state = self.state.lock().await;
        let mut status = WorkloadStatus::new();
        status.insert("adapter".to_string(), Value::from(self.workload_type.as_str()));
        status.insert("ready".to_string(), Value::Bool(true));
        status.insert("note".to_string(), Value::from(STUB_NOTE));
        status.insert("running".to_string(), Value::Bool(state.running));
        status.insert(
            "last_backup".to_string(),
            state
                .last_backup
                .as_ref()
                .map_or(Value::Null, |b| Value::from(b.as_str())),
        );
        status.insert(
            "last_source".to_string(),
            state
                .last_source
                .as_ref()
                .map_or(Value::Null, |s| Value::from(s.as_str())),
        );
        Ok(status)
    }
}

#[async_trait]
impl SourceSync for StubWorkload {
    async fn seed_from_source(&self, source: &SourceLocator) -> Result<()> {
        self.enter("seed").await;
        self.state.lock().await.last_source = Some(source.clone());
        self.done("seed").await;
        Ok(())
    }

    async fn sync_to_source(&self, source: &SourceLocator) -> Result<()> {
        self.enter("sync").await;
        self.state.lock().await.last_source = Some(source.clone());
        self.done("sync").await;
        Ok(())
    }
}
