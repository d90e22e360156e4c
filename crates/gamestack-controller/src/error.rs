// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for gamestack-controller.

use gamestack_cloud::ErrorKind;
use thiserror::Error;

use crate::workload::{AdapterError, WorkloadType};

/// Controller errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// No adapter is registered for the requested workload.
    #[error("unknown workload type: {0}")]
    UnknownWorkload(String),

    /// The operation needs an active workload and there is none.
    #[error("no active workload")]
    NoActiveWorkload,

    /// Start without a source found no backup to restore.
    #[error("no backup available for {0}")]
    NoBackup(WorkloadType),

    /// The adapter did not declare a required capability.
    #[error("workload {workload} does not support {capability}")]
    Unsupported {
        /// Workload that lacks the capability.
        workload: WorkloadType,
        /// Capability name.
        capability: &'static str,
    },

    /// Request validation failed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A workflow step failed after side effects began.
    #[error("{step} {workload} failed: {source}")]
    Workflow {
        /// Workload the step ran against.
        workload: WorkloadType,
        /// Step name (`stop`, `backup`, `restore`, ...).
        step: &'static str,
        /// Adapter failure.
        #[source]
        source: AdapterError,
    },

    /// Adapter failure outside a workflow step (e.g. locator parsing).
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    /// The state store failed.
    #[error("State store error: {0}")]
    State(String),
}

impl Error {
    /// Coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unsupported { .. } => ErrorKind::Configuration,
            Self::UnknownWorkload(_) | Self::NoActiveWorkload | Self::InvalidRequest(_) => {
                ErrorKind::Validation
            }
            Self::NoBackup(_) => ErrorKind::NotFound,
            Self::Workflow { source, .. } | Self::Adapter(source) => source.kind(),
            Self::State(_) => ErrorKind::Infrastructure,
        }
    }
}

/// Result type using controller Error.
pub type Result<T> = std::result::Result<T, Error>;
