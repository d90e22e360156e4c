// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Registry of workload adapters and their declared capabilities.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::warn;

use super::traits::{BackupCatalog, SourceSync, Workload};
use super::types::WorkloadType;

/// An adapter together with the optional capabilities it supports.
///
/// Capabilities are declared at registration time rather than discovered
/// per call.
#[derive(Clone)]
pub struct WorkloadEntry {
    workload: Arc<dyn Workload>,
    source_sync: Option<Arc<dyn SourceSync>>,
    backup_catalog: Option<Arc<dyn BackupCatalog>>,
}

impl WorkloadEntry {
    /// Register an adapter with only the core lifecycle.
    pub fn new(workload: Arc<dyn Workload>) -> Self {
        Self {
            workload,
            source_sync: None,
            backup_catalog: None,
        }
    }

    /// Register an adapter that supports every optional capability.
    pub fn full<W>(adapter: Arc<W>) -> Self
    where
        W: Workload + SourceSync + BackupCatalog + 'static,
    {
        Self::new(adapter.clone())
            .with_source_sync(adapter.clone())
            .with_backup_catalog(adapter)
    }

    /// Declare source sync support.
    pub fn with_source_sync(mut self, sync: Arc<dyn SourceSync>) -> Self {
        self.source_sync = Some(sync);
        self
    }

    /// Declare backup catalog support.
    pub fn with_backup_catalog(mut self, catalog: Arc<dyn BackupCatalog>) -> Self {
        self.backup_catalog = Some(catalog);
        self
    }

    /// Workload type of the adapter.
    pub fn workload_type(&self) -> &WorkloadType {
        self.workload.workload_type()
    }

    /// Core lifecycle.
    pub fn workload(&self) -> &Arc<dyn Workload> {
        &self.workload
    }

    /// Source sync capability, if declared.
    pub fn source_sync(&self) -> Option<&Arc<dyn SourceSync>> {
        self.source_sync.as_ref()
    }

    /// Backup catalog capability, if declared.
    pub fn backup_catalog(&self) -> Option<&Arc<dyn BackupCatalog>> {
        self.backup_catalog.as_ref()
    }
}

/// Workload adapters keyed by type.
#[derive(Clone, Default)]
pub struct WorkloadRegistry {
    entries: BTreeMap<WorkloadType, WorkloadEntry>,
}

impl WorkloadRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an adapter. A later registration for the same type replaces the earlier one.
    pub fn with(mut self, entry: WorkloadEntry) -> Self {
        let key = entry.workload_type().clone();
        if self.entries.insert(key.clone(), entry).is_some() {
            warn!(workload = %key, "Replacing previously registered workload adapter");
        }
        self
    }

    /// Look up an adapter.
    pub fn get(&self, workload: &WorkloadType) -> Option<&WorkloadEntry> {
        self.entries.get(workload)
    }

    /// Number of registered adapters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no adapter is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
