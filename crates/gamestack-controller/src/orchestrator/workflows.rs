// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workflow steps shared by the orchestrator operations.

use std::future::Future;

use gamestack_cloud::ErrorKind;
use tracing::{debug, info};

use super::Orchestrator;
use crate::error::{Error, Result};
use crate::state::OrchestrationState;
use crate::workload::{self, BackupRef, SourceLocator, WorkloadEntry, WorkloadType};

/// How the start target gets its data.
pub(super) enum Preparation {
    Seed(SourceLocator),
    Restore(BackupRef),
}

/// Outcome of retiring a workload.
pub(super) struct Retirement {
    pub(super) backup: BackupRef,
    pub(super) synced_to: Option<SourceLocator>,
}

/// Run one adapter call, tagging a failure with the workload and step.
pub(super) async fn step<T>(
    workload: &WorkloadType,
    step: &'static str,
    call: impl Future<Output = workload::Result<T>>,
) -> Result<T> {
    debug!(workload = %workload, step, "Workflow step");
    call.await.map_err(|source| Error::Workflow {
        workload: workload.clone(),
        step,
        source,
    })
}

impl Orchestrator {
    /// Stop and back up `workload`; with `sync`, push its data to the remembered source.
    ///
    /// Does not write state.
    pub(super) async fn retire(
        &self,
        workload: &WorkloadType,
        state: &OrchestrationState,
        sync: bool,
    ) -> Result<Retirement> {
        let entry = self.entry(workload)?;

        step(workload, "stop", entry.workload().stop()).await?;
        let backup = step(workload, "backup", entry.workload().backup()).await?;
        info!(workload = %workload, backup = %backup, "Backed up retiring workload");

        let source = if sync {
            state.source_by_game.get(workload).cloned()
        } else {
            None
        };
        let synced_to = match source {
            Some(source) => {
                let syncer = entry.source_sync().ok_or_else(|| Error::Unsupported {
                    workload: workload.clone(),
                    capability: "source sync",
                })?;
                step(workload, "sync", syncer.sync_to_source(&source)).await?;
                Some(source)
            }
            None => None,
        };

        Ok(Retirement { backup, synced_to })
    }

    pub(super) async fn seed(&self, entry: &WorkloadEntry, source: &SourceLocator) -> Result<()> {
        let workload = entry.workload_type();
        let syncer = entry.source_sync().ok_or_else(|| Error::Unsupported {
            workload: workload.clone(),
            capability: "source sync",
        })?;
        step(workload, "seed", syncer.seed_from_source(source)).await
    }

    /// Cached last backup, else the adapter's latest, else [`Error::NoBackup`].
    pub(super) async fn resolve_backup(
        &self,
        entry: &WorkloadEntry,
        state: &OrchestrationState,
    ) -> Result<BackupRef> {
        let workload = entry.workload_type();
        if let Some(backup) = state.last_backups.get(workload) {
            return Ok(backup.clone());
        }

        match entry.backup_catalog() {
            Some(catalog) => match catalog.latest_backup().await {
                Ok(backup) => Ok(backup),
                Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::Configuration) => {
                    debug!(workload = %workload, error = %e, "No latest backup resolved");
                    Err(Error::NoBackup(workload.clone()))
                }
                Err(source) => Err(Error::Workflow {
                    workload: workload.clone(),
                    step: "resolve latest backup",
                    source,
                }),
            },
            None => Err(Error::NoBackup(workload.clone())),
        }
    }
}
