// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workload adapters - the per-game side of the controller.

pub mod registry;
pub mod service;
pub mod stub;
mod traits;
mod types;

pub use registry::{WorkloadEntry, WorkloadRegistry};
pub use service::{GitIdentity, ServiceWorkload, ServiceWorkloadConfig};
pub use stub::StubWorkload;
pub use traits::*;
pub use types::*;
