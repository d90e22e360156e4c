// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for gamestack-controller.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::workload::service::{DEFAULT_AUTHOR_EMAIL, DEFAULT_AUTHOR_NAME};

/// Default region when `AWS_REGION` is unset.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Controller configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen address for the request surface
    pub http_addr: SocketAddr,
    /// Region for the scheduler and object store
    pub region: String,
    /// Cluster hosting the game services (scaling disabled when unset)
    pub cluster: Option<String>,
    /// Service backing the minecraft workload (scaling disabled when unset)
    pub minecraft_service: Option<String>,
    /// Bucket for backups (backup/restore unsupported when unset)
    pub backup_bucket: Option<String>,
    /// Key prefix for backups, without surrounding slashes
    pub backup_prefix: String,
    /// Local persistent data directory of the minecraft workload
    pub minecraft_data_dir: PathBuf,
    /// Author name for source sync commits
    pub git_user_name: String,
    /// Author email for source sync commits
    pub git_user_email: String,
    /// Token embedded into https clone URLs
    pub git_token: Option<String>,
    /// Scheduler RPC endpoint override
    pub ecs_endpoint: Option<String>,
    /// Object store endpoint override
    pub s3_endpoint: Option<String>,
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

/// Accept the `:8080` shorthand as well as a full socket address.
fn parse_http_addr(raw: &str) -> Result<SocketAddr, ConfigError> {
    let candidate = if raw.starts_with(':') {
        format!("0.0.0.0{}", raw)
    } else {
        raw.to_string()
    };
    candidate
        .parse()
        .map_err(|_| ConfigError::InvalidHttpAddr(raw.to_string()))
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_addr = parse_http_addr(&env_or("HTTP_ADDR", ":8080"))?;

        let backup_prefix = env_or("BACKUP_PREFIX", "backups")
            .trim_matches('/')
            .to_string();

        Ok(Self {
            http_addr,
            region: env_or("AWS_REGION", DEFAULT_REGION),
            cluster: env_opt("ECS_CLUSTER_NAME"),
            minecraft_service: env_opt("ECS_SERVICE_MINECRAFT"),
            backup_bucket: env_opt("BACKUP_BUCKET"),
            backup_prefix,
            minecraft_data_dir: PathBuf::from(env_or("MC_DATA_DIR", "/srv/minecraft-data")),
            git_user_name: env_or("GIT_USER_NAME", DEFAULT_AUTHOR_NAME),
            git_user_email: env_or("GIT_USER_EMAIL", DEFAULT_AUTHOR_EMAIL),
            git_token: env_opt("GIT_AUTH_TOKEN"),
            ecs_endpoint: env_opt("ECS_ENDPOINT_URL"),
            s3_endpoint: env_opt("S3_ENDPOINT_URL"),
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The HTTP listen address could not be parsed.
    #[error("Invalid HTTP_ADDR: {0}")]
    InvalidHttpAddr(String),
}
