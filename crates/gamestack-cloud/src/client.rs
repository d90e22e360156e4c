// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared signed HTTP client.
//!
//! One [`ControlPlaneClient`] is built at startup and shared by every adapter.
//! It implements both [`ServiceScheduler`](crate::scheduler::ServiceScheduler)
//! and [`ObjectStore`](crate::object_store::ObjectStore).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::{Method, Response};
use tracing::debug;
use url::Url;

use crate::credentials::{CredentialsChain, CredentialsProvider};
use crate::error::{Error, Result};
use crate::signing::{self, SignableRequest, SigningParams};

/// Interval between describe calls while waiting for a service to settle.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ControlPlaneConfig {
    /// Region used for endpoints and signing scope.
    pub region: String,
    /// Scheduler RPC endpoint override (local emulation, tests).
    pub ecs_endpoint: Option<String>,
    /// Object store endpoint override (local emulation, tests).
    pub s3_endpoint: Option<String>,
    /// Poll interval for wait-for-stable.
    pub poll_interval: Duration,
}

impl ControlPlaneConfig {
    /// Configuration with default endpoints for the region.
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ecs_endpoint: None,
            s3_endpoint: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Signed request about to be dispatched.
pub(crate) struct SignedCall {
    /// Operation name used in errors and logs.
    pub operation: &'static str,
    /// Signing service name.
    pub service: &'static str,
    pub method: Method,
    pub url: Url,
    /// Headers covered by the signature (host is added automatically).
    pub headers: Vec<(String, String)>,
    pub payload_hash: String,
    pub body: reqwest::Body,
}

/// Hand-signed client for the container scheduler and the object store.
pub struct ControlPlaneClient {
    pub(crate) region: String,
    pub(crate) http: reqwest::Client,
    credentials: Arc<dyn CredentialsProvider>,
    pub(crate) ecs_endpoint: String,
    pub(crate) s3_endpoint: String,
    pub(crate) poll_interval: Duration,
}

fn trim_endpoint(endpoint: &str) -> String {
    endpoint.trim().trim_end_matches('/').to_string()
}

impl ControlPlaneClient {
    /// Create a client with explicit credentials.
    pub fn new(
        config: ControlPlaneConfig,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> Result<Self> {
        Self::with_http(config, credentials, reqwest::Client::new())
    }

    /// Create a client using the default credentials chain.
    pub fn with_default_credentials(config: ControlPlaneConfig) -> Result<Self> {
        let http = reqwest::Client::new();
        let credentials = Arc::new(CredentialsChain::default_chain(http.clone()));
        Self::with_http(config, credentials, http)
    }

    fn with_http(
        config: ControlPlaneConfig,
        credentials: Arc<dyn CredentialsProvider>,
        http: reqwest::Client,
    ) -> Result<Self> {
        let region = config.region.trim().to_string();
        if region.is_empty() {
            return Err(Error::Config("region is required".to_string()));
        }

        let ecs_endpoint = config
            .ecs_endpoint
            .as_deref()
            .map(trim_endpoint)
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| format!("https://ecs.{}.amazonaws.com", region));
        let s3_endpoint = config
            .s3_endpoint
            .as_deref()
            .map(trim_endpoint)
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", region));

        Ok(Self {
            region,
            http,
            credentials,
            ecs_endpoint,
            s3_endpoint,
            poll_interval: config.poll_interval,
        })
    }

    pub(crate) fn parse_url(&self, operation: &str, raw: &str) -> Result<Url> {
        Url::parse(raw)
            .map_err(|e| Error::Config(format!("invalid endpoint for {}: {} ({})", operation, raw, e)))
    }

    /// Sign and send a request. Non-success statuses are returned as-is.
    pub(crate) async fn send(&self, call: SignedCall) -> Result<Response> {
        let host = match (call.url.host_str(), call.url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(Error::Config(format!(
                    "endpoint for {} has no host: {}",
                    call.operation, call.url
                )));
            }
        };

        let mut headers = call.headers;
        headers.push(("host".to_string(), host));

        let credentials = self.credentials.credentials().await?;
        let signed = signing::sign(
            &SignableRequest {
                method: call.method.as_str(),
                path: call.url.path(),
                query: &[],
                headers: &headers,
                payload_hash: &call.payload_hash,
            },
            &SigningParams {
                credentials: &credentials,
                region: &self.region,
                service: call.service,
                time: Utc::now(),
            },
        )?;

        debug!(operation = call.operation, url = %call.url, "Dispatching signed request");

        let mut builder = self.http.request(call.method, call.url);
        for (name, value) in headers
            .iter()
            .filter(|(name, _)| name != "host")
            .chain(signed.iter())
        {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder
            .body(call.body)
            .send()
            .await
            .map_err(|source| Error::Http {
                operation: call.operation.to_string(),
                source,
            })
    }

    /// Turn a non-success response into an API error.
    pub(crate) async fn api_error(operation: &str, response: Response) -> Error {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = match body.trim() {
            "" => status.canonical_reason().unwrap_or("unknown error").to_string(),
            trimmed => trimmed.to_string(),
        };
        Error::Api {
            operation: operation.to_string(),
            status: status.as_u16(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{Credentials, StaticCredentials};

    fn creds() -> Arc<dyn CredentialsProvider> {
        Arc::new(StaticCredentials::new(Credentials::new("a", "b", None)))
    }

    #[test]
    fn test_default_endpoints_follow_region() {
        let client = ControlPlaneClient::new(ControlPlaneConfig::new("eu-west-1"), creds()).unwrap();
        assert_eq!(client.ecs_endpoint, "https://ecs.eu-west-1.amazonaws.com");
        assert_eq!(client.s3_endpoint, "https://s3.eu-west-1.amazonaws.com");
        assert_eq!(client.poll_interval, DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn test_endpoint_override_is_trimmed() {
        let mut config = ControlPlaneConfig::new("us-east-1");
        config.ecs_endpoint = Some(" http://localhost:4566/ ".to_string());
        let client = ControlPlaneClient::new(config, creds()).unwrap();
        assert_eq!(client.ecs_endpoint, "http://localhost:4566");
    }

    #[test]
    fn test_empty_region_rejected() {
        let result = ControlPlaneClient::new(ControlPlaneConfig::new("  "), creds());
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
