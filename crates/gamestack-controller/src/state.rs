// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Orchestration state and its store.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::workload::{BackupRef, SourceLocator, WorkloadType};

/// Lifecycle phase of the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Nothing is running.
    #[default]
    Stopped,
    /// The active workload is serving.
    Running,
    /// A switch is in progress.
    Switching,
    /// The last operation failed after side effects began.
    Error,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Stopped => "stopped",
            Phase::Running => "running",
            Phase::Switching => "switching",
            Phase::Error => "error",
        };
        f.write_str(s)
    }
}

/// Single record describing the stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationState {
    /// Workload currently running, if any
    pub active_workload: Option<WorkloadType>,
    /// Current phase
    pub phase: Phase,
    /// Most recent backup per workload
    pub last_backups: BTreeMap<WorkloadType, BackupRef>,
    /// Source locator a workload was last seeded from
    pub source_by_game: BTreeMap<WorkloadType, SourceLocator>,
    /// Time of the last write
    pub updated_at: DateTime<Utc>,
}

impl Default for OrchestrationState {
    fn default() -> Self {
        Self {
            active_workload: None,
            phase: Phase::Stopped,
            last_backups: BTreeMap::new(),
            source_by_game: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }
}

/// Storage of the orchestration state.
///
/// Reads and writes exchange independent copies; a caller can never mutate
/// the stored record without calling [`StateStore::set`].
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Current state.
    async fn get(&self) -> Result<OrchestrationState>;

    /// Replace the state, stamping `updated_at`. Returns the stored copy.
    async fn set(&self, state: OrchestrationState) -> Result<OrchestrationState>;
}

/// In-memory state store.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    inner: RwLock<OrchestrationState>,
}

impl MemoryStateStore {
    /// Create a store holding the initial state (stopped, nothing recorded).
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self) -> Result<OrchestrationState> {
        Ok(self.inner.read().await.clone())
    }

    async fn set(&self, mut state: OrchestrationState) -> Result<OrchestrationState> {
        state.updated_at = Utc::now();
        let mut guard = self.inner.write().await;
        *guard = state.clone();
        Ok(state)
    }
}
