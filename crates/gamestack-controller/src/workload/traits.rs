// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workload trait definitions.
//!
//! Defines the uniform lifecycle contract every game adapter implements,
//! plus the optional capabilities (source sync, backup catalog).
//!
//! Cancellation follows the usual async contract: dropping an operation's
//! future abandons it. Subprocesses are killed on drop and scratch
//! directories are removed on drop.

use std::path::PathBuf;

use async_trait::async_trait;
use gamestack_cloud::ErrorKind;
use serde_json::{Map, Value};
use thiserror::Error;

use super::types::{BackupRef, SourceLocator, WorkloadType};

/// Errors from workload adapter operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AdapterError {
    /// A required setting for this operation is absent.
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// Input was rejected before any side effect.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// An archive entry would be written outside the destination.
    #[error("Unsafe archive entry: {0}")]
    UnsafeArchiveEntry(String),

    /// The source repository does not contain the requested directory.
    #[error("Source path not found in repository: {0}")]
    SourcePathNotFound(String),

    /// No backup is recorded for the workload.
    #[error("No backup recorded: {0}")]
    NoBackup(String),

    /// Scheduler or object store call failed.
    #[error("Control plane error: {0}")]
    ControlPlane(#[from] gamestack_cloud::Error),

    /// Archive could not be read or written.
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// A git subprocess failed.
    #[error("git {command} failed: {stderr}")]
    Git {
        /// Subcommand and arguments, with credentials redacted.
        command: String,
        /// Standard error output, with credentials redacted.
        stderr: String,
    },

    /// Local filesystem operation failed.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        /// Path being operated on.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A blocking task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl AdapterError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotConfigured(_) => ErrorKind::Configuration,
            Self::Validation(_) | Self::UnsafeArchiveEntry(_) => ErrorKind::Validation,
            Self::SourcePathNotFound(_) | Self::NoBackup(_) => ErrorKind::NotFound,
            Self::ControlPlane(e) => e.kind(),
            Self::Archive(_)
            | Self::Git { .. }
            | Self::Io { .. }
            | Self::Task(_)
            | Self::Other(_) => ErrorKind::Infrastructure,
        }
    }
}

/// Result type for adapter operations.
pub type Result<T> = std::result::Result<T, AdapterError>;

/// Adapter-specific status attributes.
pub type WorkloadStatus = Map<String, Value>;

/// Lifecycle contract of a game workload.
#[async_trait]
pub trait Workload: Send + Sync {
    /// Workload type this adapter owns.
    fn workload_type(&self) -> &WorkloadType;

    /// Bring the workload up and wait until it is serving.
    async fn start(&self) -> Result<()>;

    /// Bring the workload down.
    async fn stop(&self) -> Result<()>;

    /// Snapshot the workload's data to durable storage.
    async fn backup(&self) -> Result<BackupRef>;

    /// Replace the workload's data with the given snapshot.
    async fn restore(&self, backup: &BackupRef) -> Result<()>;

    /// Forward a console command.
    async fn send_command(&self, command: &str) -> Result<()>;

    /// Adapter-specific attributes for status reporting.
    async fn status(&self) -> Result<WorkloadStatus>;
}

/// Seeding from and publishing to a version-controlled source.
#[async_trait]
pub trait SourceSync: Send + Sync {
    /// Replace the workload's data with the contents of the locator's directory.
    async fn seed_from_source(&self, source: &SourceLocator) -> Result<()>;

    /// Publish the workload's data to the locator, committing only if changed.
    async fn sync_to_source(&self, source: &SourceLocator) -> Result<()>;
}

/// Lookup of the most recent durable backup.
#[async_trait]
pub trait BackupCatalog: Send + Sync {
    /// Most recent backup of this workload.
    async fn latest_backup(&self) -> Result<BackupRef>;
}
