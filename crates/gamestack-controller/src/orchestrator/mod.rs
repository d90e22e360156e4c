// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Orchestrator - enforces "one stack at a time".
//!
//! Every mutating operation (start, stop, switch, backup, command) runs
//! under a single process-wide FIFO lock. Status is read-only and never
//! takes the lock; it always sees a complete copy of the state.
//!
//! Phases are advisory: any operation may be attempted in any phase. Once a
//! workflow has begun touching adapters, any failure records `phase=error`
//! together with whatever progress was already made.
//!
//! Dropping an operation's future cancels it and releases the lock.

mod workflows;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::state::{OrchestrationState, Phase, StateStore};
use crate::workload::{
    BackupRef, SourceLocator, WorkloadEntry, WorkloadRegistry, WorkloadStatus, WorkloadType,
};

/// Default bound on the live adapter status call.
pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a started workload's data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartSource {
    /// Seeded from a source locator.
    DataUrl,
    /// Restored from a backup.
    Backup,
}

/// Result of [`Orchestrator::start`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartResult {
    /// Workload now active
    pub started: WorkloadType,
    /// Data origin
    pub source: StartSource,
    /// Backup restored, when started from a backup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<BackupRef>,
    /// Source seeded from, when started from a locator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_url: Option<SourceLocator>,
}

/// Result of [`Orchestrator::stop`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopResult {
    /// Workload that was stopped
    pub stopped: WorkloadType,
    /// Backup taken after stopping
    pub backup: BackupRef,
    /// Whether data was pushed back to a remembered source
    pub synced: bool,
    /// Source synced to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_url: Option<SourceLocator>,
}

/// Result of [`Orchestrator::switch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchResult {
    /// Workload now active
    pub switched_to: WorkloadType,
}

/// Result of [`Orchestrator::backup`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupResult {
    /// Reference of the new backup
    pub backup: BackupRef,
}

/// Result of [`Orchestrator::command`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    /// Whether the command was handed to the adapter
    pub sent: bool,
}

/// Persisted state merged with the active adapter's live status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    /// Persisted state
    #[serde(flatten)]
    pub state: OrchestrationState,
    /// Live adapter attributes, absent when unavailable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workload_status: Option<WorkloadStatus>,
}

/// Sequences workload adapters so at most one stack is active.
pub struct Orchestrator {
    state: Arc<dyn StateStore>,
    registry: WorkloadRegistry,
    op_lock: Mutex<()>,
    status_timeout: Duration,
}

impl Orchestrator {
    /// Create an orchestrator over the given state store and adapters.
    pub fn new(state: Arc<dyn StateStore>, registry: WorkloadRegistry) -> Self {
        Self {
            state,
            registry,
            op_lock: Mutex::new(()),
            status_timeout: DEFAULT_STATUS_TIMEOUT,
        }
    }

    /// Bound the live adapter status call made by [`Orchestrator::status`].
    pub fn with_status_timeout(mut self, timeout: Duration) -> Self {
        self.status_timeout = timeout;
        self
    }

    fn entry(&self, workload: &WorkloadType) -> Result<&WorkloadEntry> {
        self.registry
            .get(workload)
            .ok_or_else(|| Error::UnknownWorkload(workload.to_string()))
    }

    /// Persist `phase=error` after a failed workflow, keeping recorded progress.
    async fn record_failure(&self, mut state: OrchestrationState, error: Error) -> Error {
        state.phase = Phase::Error;
        if let Err(e) = self.state.set(state).await {
            warn!(error = %e, "Failed to record error phase");
        }
        error
    }

    /// Make `target` the only active workload.
    ///
    /// A different active workload is retired first (stop, backup, sync to
    /// its remembered source). The target is then seeded from `source` when
    /// given, otherwise restored from its cached or latest backup.
    pub async fn start(&self, target: &str, source: Option<&str>) -> Result<StartResult> {
        let _guard = self.op_lock.lock().await;
        let target = WorkloadType::new(target);
        let entry = self.entry(&target)?;
        let mut state = self.state.get().await?;

        let preparation = match source.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => {
                let locator = SourceLocator::parse(raw)?;
                if entry.source_sync().is_none() {
                    return Err(Error::Unsupported {
                        workload: target,
                        capability: "source sync",
                    });
                }
                workflows::Preparation::Seed(locator)
            }
            None => workflows::Preparation::Restore(self.resolve_backup(entry, &state).await?),
        };

        info!(workload = %target, "Starting workload");

        if let Some(active) = state.active_workload.clone().filter(|a| *a != target) {
            let retired = self.retire(&active, &state, true).await;
            match retired {
                Ok(retired) => {
                    state.last_backups.insert(active.clone(), retired.backup);
                    state.active_workload = None;
                    state.phase = Phase::Stopped;
                    state = self.state.set(state).await?;
                    info!(workload = %active, "Retired previously active workload");
                }
                Err(e) => return Err(self.record_failure(state, e).await),
            }
        }

        let result = match preparation {
            workflows::Preparation::Seed(locator) => {
                if let Err(e) = self.seed(entry, &locator).await {
                    return Err(self.record_failure(state, e).await);
                }
                state.source_by_game.insert(target.clone(), locator.clone());
                StartResult {
                    started: target.clone(),
                    source: StartSource::DataUrl,
                    backup: None,
                    data_url: Some(locator),
                }
            }
            workflows::Preparation::Restore(backup) => {
                if let Err(e) =
                    workflows::step(&target, "restore", entry.workload().restore(&backup)).await
                {
                    return Err(self.record_failure(state, e).await);
                }
                state.last_backups.insert(target.clone(), backup.clone());
                StartResult {
                    started: target.clone(),
                    source: StartSource::Backup,
                    backup: Some(backup),
                    data_url: None,
                }
            }
        };

        if let Err(e) = workflows::step(&target, "start", entry.workload().start()).await {
            return Err(self.record_failure(state, e).await);
        }

        state.active_workload = Some(target.clone());
        state.phase = Phase::Running;
        self.state.set(state).await?;
        info!(workload = %target, source = ?result.source, "Workload running");
        Ok(result)
    }

    /// Stop the active workload, back it up and sync it to its remembered source.
    pub async fn stop(&self) -> Result<StopResult> {
        let _guard = self.op_lock.lock().await;
        let mut state = self.state.get().await?;
        let active = state.active_workload.clone().ok_or(Error::NoActiveWorkload)?;

        info!(workload = %active, "Stopping workload");
        let retired = self.retire(&active, &state, true).await;
        let retired = match retired {
            Ok(retired) => retired,
            Err(e) => return Err(self.record_failure(state, e).await),
        };

        state.last_backups.insert(active.clone(), retired.backup.clone());
        state.active_workload = None;
        state.phase = Phase::Stopped;
        self.state.set(state).await?;
        info!(
            workload = %active,
            backup = %retired.backup,
            synced = retired.synced_to.is_some(),
            "Workload stopped"
        );

        Ok(StopResult {
            stopped: active,
            backup: retired.backup,
            synced: retired.synced_to.is_some(),
            data_url: retired.synced_to,
        })
    }

    /// Replace the active workload with `target` without syncing or restoring.
    ///
    /// No-op when `target` is already active. On failure the active workload
    /// is left unchanged and the phase becomes `error`.
    pub async fn switch(&self, target: &str) -> Result<SwitchResult> {
        let _guard = self.op_lock.lock().await;
        let target = WorkloadType::new(target);
        let entry = self.entry(&target)?;
        let mut state = self.state.get().await?;

        if state.active_workload.as_ref() == Some(&target) {
            return Ok(SwitchResult {
                switched_to: target,
            });
        }

        info!(from = ?state.active_workload, to = %target, "Switching workload");
        state.phase = Phase::Switching;
        let mut state = self.state.set(state).await?;
        let outgoing = state.active_workload.clone();

        let outcome = async {
            let backup = match &outgoing {
                Some(previous) => Some(self.retire(previous, &state, false).await?.backup),
                None => None,
            };
            workflows::step(&target, "start", entry.workload().start()).await?;
            Ok::<_, Error>(backup)
        }
        .await;

        match outcome {
            Ok(backup) => {
                if let (Some(previous), Some(backup)) = (outgoing, backup) {
                    state.last_backups.insert(previous, backup);
                }
                state.active_workload = Some(target.clone());
                state.phase = Phase::Running;
                self.state.set(state).await?;
                info!(workload = %target, "Switch complete");
                Ok(SwitchResult {
                    switched_to: target,
                })
            }
            Err(e) => Err(self.record_failure(state, e).await),
        }
    }

    /// Back up the active workload. The phase is unchanged.
    pub async fn backup(&self) -> Result<BackupResult> {
        let _guard = self.op_lock.lock().await;
        let state = self.state.get().await?;
        let active = state.active_workload.ok_or(Error::NoActiveWorkload)?;
        let entry = self.entry(&active)?;

        let backup = workflows::step(&active, "backup", entry.workload().backup()).await?;
        info!(workload = %active, backup = %backup, "Backup taken");
        Ok(BackupResult { backup })
    }

    /// Forward a console command to the active workload.
    pub async fn command(&self, command: &str) -> Result<CommandResult> {
        let command = command.trim();
        if command.is_empty() {
            return Err(Error::InvalidRequest("command is required".to_string()));
        }

        let _guard = self.op_lock.lock().await;
        let state = self.state.get().await?;
        let active = state.active_workload.ok_or(Error::NoActiveWorkload)?;
        let entry = self.entry(&active)?;

        workflows::step(&active, "command", entry.workload().send_command(command)).await?;
        Ok(CommandResult { sent: true })
    }

    /// Persisted state plus best-effort live status of the active workload.
    pub async fn status(&self) -> Result<StatusReport> {
        let state = self.state.get().await?;

        let workload_status = match state
            .active_workload
            .as_ref()
            .and_then(|active| self.registry.get(active))
        {
            Some(entry) => {
                match tokio::time::timeout(self.status_timeout, entry.workload().status()).await {
                    Ok(Ok(status)) => Some(status),
                    Ok(Err(e)) => {
                        warn!(workload = %entry.workload_type(), error = %e, "Workload status unavailable");
                        None
                    }
                    Err(_) => {
                        warn!(workload = %entry.workload_type(), "Workload status timed out");
                        None
                    }
                }
            }
            None => None,
        };

        Ok(StatusReport {
            state,
            workload_status,
        })
    }
}
