// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! GameStack Cloud - hand-signed control-plane client
//!
//! A deliberately small client for the two managed services the controller
//! depends on, instead of a full provider SDK:
//!
//! | Service | Surface | Operations |
//! |---------|---------|------------|
//! | Container scheduler (ECS) | JSON-RPC `POST /` | `UpdateService`, `DescribeServices`, wait-for-stable |
//! | Object store (S3) | REST, path-style | `PutObject`, `GetObject`, streamed file upload/download |
//!
//! Every request is signed with AWS Signature Version 4 ([`signing`]) using
//! credentials from a [`CredentialsProvider`](credentials::CredentialsProvider).
//!
//! # Example
//!
//! ```rust,ignore
//! use gamestack_cloud::{ControlPlaneClient, ControlPlaneConfig, ServiceScheduler};
//!
//! let client = ControlPlaneClient::with_default_credentials(ControlPlaneConfig::new("us-east-1"))?;
//! client.set_desired_count("games", "minecraft", 1, true).await?;
//! client.wait_until_stable("games", "minecraft", DEFAULT_STABLE_TIMEOUT).await?;
//! ```

#![deny(missing_docs)]

/// Shared signed HTTP client.
pub mod client;

/// Credential providers.
pub mod credentials;

/// Error types.
pub mod error;

/// Object storage operations.
pub mod object_store;

/// Container scheduler operations.
pub mod scheduler;

/// AWS Signature Version 4.
pub mod signing;

pub use client::{ControlPlaneClient, ControlPlaneConfig, DEFAULT_POLL_INTERVAL};
pub use credentials::{Credentials, CredentialsProvider, StaticCredentials};
pub use error::{Error, ErrorKind, Result};
pub use object_store::{ObjectLocation, ObjectStore};
pub use scheduler::{DEFAULT_STABLE_TIMEOUT, Deployment, ServiceScheduler, ServiceState};
