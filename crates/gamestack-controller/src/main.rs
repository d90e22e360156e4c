// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! GameStack Controller - HTTP server
//!
//! Registers the minecraft (service-backed) and hytale (stub) workloads and
//! serves the request surface until Ctrl-C.

use std::sync::Arc;

use tracing::{info, warn};

use gamestack_cloud::{ControlPlaneClient, ControlPlaneConfig};
use gamestack_controller::config::Config;
use gamestack_controller::server;
use gamestack_controller::workload::GitIdentity;
use gamestack_controller::{
    MemoryStateStore, Orchestrator, ServiceWorkload, ServiceWorkloadConfig, StubWorkload,
    WorkloadEntry, WorkloadRegistry, WorkloadType,
};

fn minecraft_config(config: &Config) -> ServiceWorkloadConfig {
    let mut settings =
        ServiceWorkloadConfig::new(WorkloadType::MINECRAFT, &config.minecraft_data_dir);
    settings.cluster = config.cluster.clone();
    settings.service = config.minecraft_service.clone();
    settings.bucket = config.backup_bucket.clone();
    settings.backup_prefix = config.backup_prefix.clone();
    settings.git = GitIdentity {
        name: config.git_user_name.clone(),
        email: config.git_user_email.clone(),
        token: config.git_token.clone(),
    };
    settings
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "gamestack_controller=info,gamestack_cloud=info,tower_http=info".into()
            }),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let config = Config::from_env()?;

    info!(
        http_addr = %config.http_addr,
        region = %config.region,
        cluster = ?config.cluster,
        bucket = ?config.backup_bucket,
        data_dir = %config.minecraft_data_dir.display(),
        "Starting GameStack Controller"
    );

    let mut cloud = ControlPlaneConfig::new(&config.region);
    cloud.ecs_endpoint = config.ecs_endpoint.clone();
    cloud.s3_endpoint = config.s3_endpoint.clone();
    let client = Arc::new(ControlPlaneClient::with_default_credentials(cloud)?);

    let minecraft = Arc::new(
        ServiceWorkload::new(minecraft_config(&config))
            .with_scheduler(client.clone())
            .with_object_store(client),
    );
    let hytale = Arc::new(StubWorkload::new(WorkloadType::HYTALE));

    let registry = WorkloadRegistry::new()
        .with(WorkloadEntry::full(minecraft))
        .with(WorkloadEntry::new(hytale.clone()).with_source_sync(hytale));
    info!(workloads = registry.len(), "Workload adapters registered");

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(MemoryStateStore::new()),
        registry,
    ));

    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    info!(addr = %config.http_addr, "Controller ready");

    axum::serve(listener, server::router(orchestrator))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
        })
        .await?;

    info!("GameStack Controller shut down");
    Ok(())
}
