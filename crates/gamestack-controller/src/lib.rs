// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! GameStack Controller - one game server stack at a time
//!
//! This crate owns the lifecycle of a small fleet of game servers of which
//! at most one may run at any moment. It sequences stop, backup, source
//! sync, seed, restore and start across heterogeneous workload adapters.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    HTTP request surface                         │
//! │   /start  /stop  /switch  /backup  /command  /status  /health   │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Orchestrator                             │
//! │        global FIFO lock · phase machine · state store           │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!              ┌────────────────┴────────────────┐
//!              ▼                                 ▼
//! ┌────────────────────────────┐    ┌────────────────────────────┐
//! │     ServiceWorkload        │    │       StubWorkload         │
//! │ scale · zip · git · restore│    │   in-memory journal        │
//! └────────────────────────────┘    └────────────────────────────┘
//!        │              │       │
//!        ▼              ▼       ▼
//!   ECS service    S3 bucket   git remote
//! ```
//!
//! # Operations
//!
//! | Operation | Input | Output |
//! |-----------|-------|--------|
//! | `start` | `{workload, source_locator?}` | `{started, source, backup?, data_url?}` |
//! | `stop` | - | `{stopped, backup, synced, data_url?}` |
//! | `switch` | `{workload}` | `{switched_to}` |
//! | `backup` | - | `{backup}` |
//! | `command` | `{command}` | `{sent}` |
//! | `status` | - | state + best-effort adapter status |
//!
//! # Configuration
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `HTTP_ADDR` | `:8080` | Listen address |
//! | `AWS_REGION` | `us-east-1` | Region for ECS and S3 |
//! | `ECS_CLUSTER_NAME` | - | Cluster of the game services |
//! | `ECS_SERVICE_MINECRAFT` | - | Service backing `minecraft` |
//! | `BACKUP_BUCKET` | - | Backup bucket |
//! | `BACKUP_PREFIX` | `backups` | Backup key prefix |
//! | `MC_DATA_DIR` | `/srv/minecraft-data` | Minecraft data directory |
//! | `GIT_USER_NAME` / `GIT_USER_EMAIL` | bot identity | Commit author |
//! | `GIT_AUTH_TOKEN` | - | Token for https remotes |
//! | `ECS_ENDPOINT_URL` / `S3_ENDPOINT_URL` | - | Endpoint overrides |

#![deny(missing_docs)]

/// Configuration loading.
pub mod config;

/// Error types.
pub mod error;

/// Orchestration of workload lifecycles.
pub mod orchestrator;

/// HTTP request surface.
pub mod server;

/// Orchestration state.
pub mod state;

/// Workload adapters.
pub mod workload;

pub use config::Config;
pub use error::{Error, Result};
pub use orchestrator::Orchestrator;
pub use state::{MemoryStateStore, OrchestrationState, Phase, StateStore};
pub use workload::{
    BackupRef, ServiceWorkload, ServiceWorkloadConfig, SourceLocator, StubWorkload, Workload,
    WorkloadEntry, WorkloadRegistry, WorkloadType,
};
