// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Container scheduler: scale a service and wait for it to settle.
//!
//! Requests go straight to the ECS JSON-RPC surface
//! (`X-Amz-Target: AmazonEC2ContainerServiceV20141113.<Operation>`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::{ControlPlaneClient, SignedCall};
use crate::error::{Error, Result};
use crate::signing::sha256_hex;

/// JSON-RPC target prefix for the scheduler API.
pub const ECS_TARGET_PREFIX: &str = "AmazonEC2ContainerServiceV20141113.";

/// Default deadline for wait-for-stable.
pub const DEFAULT_STABLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

const ECS_CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// One deployment descriptor of a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Deployment {
    /// Deployment status (`PRIMARY`, `ACTIVE`, ...).
    pub status: String,
    /// Rollout state (`IN_PROGRESS`, `COMPLETED`, `FAILED`, or empty).
    pub rollout_state: String,
    /// Desired task count of this deployment.
    pub desired_count: i64,
    /// Running task count of this deployment.
    pub running_count: i64,
    /// Pending task count of this deployment.
    pub pending_count: i64,
}

/// Described state of a service; only used to decide stability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceState {
    /// Service name.
    pub service_name: String,
    /// Service status (`ACTIVE`, `DRAINING`, `INACTIVE`).
    pub status: String,
    /// Desired task count.
    pub desired_count: i64,
    /// Running task count.
    pub running_count: i64,
    /// Pending task count.
    pub pending_count: i64,
    /// Deployment descriptors; more than one means a rollout is in progress.
    pub deployments: Vec<Deployment>,
}

impl ServiceState {
    /// Whether the service has converged on its desired count with no rollout in flight.
    pub fn is_stable(&self) -> bool {
        if self.status.trim().eq_ignore_ascii_case("DRAINING") {
            return false;
        }
        if self.pending_count != 0 || self.running_count != self.desired_count {
            return false;
        }

        let [deployment] = self.deployments.as_slice() else {
            return false;
        };

        let rollout = deployment.rollout_state.trim();
        deployment.pending_count == 0
            && deployment.running_count == deployment.desired_count
            && deployment.running_count == self.desired_count
            && (rollout.is_empty() || rollout.eq_ignore_ascii_case("COMPLETED"))
    }
}

/// Scheduler operations used by workload adapters.
#[async_trait]
pub trait ServiceScheduler: Send + Sync {
    /// Set the desired instance count, optionally forcing a fresh rollout.
    async fn set_desired_count(
        &self,
        cluster: &str,
        service: &str,
        desired: u32,
        force_new_deployment: bool,
    ) -> Result<()>;

    /// Describe a single service.
    async fn describe_service(&self, cluster: &str, service: &str) -> Result<ServiceState>;

    /// Poll until the service is stable or `timeout` elapses.
    ///
    /// A describe failure is returned immediately; an elapsed deadline is
    /// [`Error::StabilizationTimeout`].
    async fn wait_until_stable(&self, cluster: &str, service: &str, timeout: Duration)
    -> Result<()>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateServiceRequest<'a> {
    cluster: &'a str,
    service: &'a str,
    desired_count: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    force_new_deployment: bool,
}

#[derive(Serialize)]
struct DescribeServicesRequest<'a> {
    cluster: &'a str,
    services: [&'a str; 1],
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DescribeServicesResponse {
    services: Vec<ServiceState>,
    failures: Vec<ServiceFailure>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServiceFailure {
    reason: String,
}

fn require_service(cluster: &str, service: &str) -> Result<(String, String)> {
    let cluster = cluster.trim();
    let service = service.trim();
    if cluster.is_empty() || service.is_empty() {
        return Err(Error::Validation(
            "cluster and service are required".to_string(),
        ));
    }
    Ok((cluster.to_string(), service.to_string()))
}

impl ControlPlaneClient {
    /// Call a scheduler JSON-RPC operation, decoding the response when `R` is not `()`.
    async fn ecs_rpc<T: Serialize, R: DeserializeOwned + Default>(
        &self,
        operation: &'static str,
        payload: &T,
    ) -> Result<R> {
        let body = serde_json::to_vec(payload)?;
        let payload_hash = sha256_hex(&body);
        let url = self.parse_url(operation, &format!("{}/", self.ecs_endpoint))?;

        let response = self
            .send(SignedCall {
                operation,
                service: "ecs",
                method: Method::POST,
                url,
                headers: vec![
                    ("content-type".to_string(), ECS_CONTENT_TYPE.to_string()),
                    (
                        "x-amz-target".to_string(),
                        format!("{}{}", ECS_TARGET_PREFIX, operation),
                    ),
                    ("x-amz-content-sha256".to_string(), payload_hash.clone()),
                ],
                payload_hash,
                body: body.into(),
            })
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(operation, response).await);
        }

        let bytes = response.bytes().await.map_err(|source| Error::Http {
            operation: operation.to_string(),
            source,
        })?;
        if bytes.is_empty() {
            return Ok(R::default());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl ServiceScheduler for ControlPlaneClient {
    async fn set_desired_count(
        &self,
        cluster: &str,
        service: &str,
        desired: u32,
        force_new_deployment: bool,
    ) -> Result<()> {
        let (cluster, service) = require_service(cluster, service)?;
        let request = UpdateServiceRequest {
            cluster: &cluster,
            service: &service,
            desired_count: desired,
            force_new_deployment,
        };

        let _: serde_json::Value = self.ecs_rpc("UpdateService", &request).await?;

        info!(
            cluster = %cluster,
            service = %service,
            desired,
            force_new_deployment,
            "Updated service desired count"
        );
        Ok(())
    }

    async fn describe_service(&self, cluster: &str, service: &str) -> Result<ServiceState> {
        let (cluster, service) = require_service(cluster, service)?;
        let request = DescribeServicesRequest {
            cluster: &cluster,
            services: [&service],
        };

        let mut response: DescribeServicesResponse =
            self.ecs_rpc("DescribeServices", &request).await?;

        if let Some(failure) = response.failures.first() {
            let reason = match failure.reason.trim() {
                "" => "unknown describe failure".to_string(),
                reason => reason.to_string(),
            };
            return Err(Error::ServiceFailure { service, reason });
        }

        if response.services.is_empty() {
            return Err(Error::ServiceNotFound { cluster, service });
        }
        Ok(response.services.swap_remove(0))
    }

    async fn wait_until_stable(
        &self,
        cluster: &str,
        service: &str,
        timeout: Duration,
    ) -> Result<()> {
        let timeout = if timeout.is_zero() {
            DEFAULT_STABLE_TIMEOUT
        } else {
            timeout
        };

        let poll = async {
            let mut ticker = tokio::time::interval(self.poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let state = self.describe_service(cluster, service).await?;
                if state.is_stable() {
                    return Ok(());
                }
                debug!(
                    service = %service,
                    desired = state.desired_count,
                    running = state.running_count,
                    pending = state.pending_count,
                    deployments = state.deployments.len(),
                    "Service not yet stable"
                );
            }
        };

        match tokio::time::timeout(timeout, poll).await {
            Ok(result) => result,
            Err(_) => Err(Error::StabilizationTimeout {
                service: service.trim().to_string(),
                timeout,
            }),
        }
    }
}
