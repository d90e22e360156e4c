// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Short-lived credential providers.
//!
//! The default chain tries, in order:
//! - `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN`
//! - the container credentials endpoint
//!   (`AWS_CONTAINER_CREDENTIALS_RELATIVE_URI` or
//!   `AWS_CONTAINER_CREDENTIALS_FULL_URI`), cached until shortly before expiry

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};

/// Link-local host serving task role credentials inside a container.
const CONTAINER_CREDENTIALS_HOST: &str = "http://169.254.170.2";

/// Refresh cached credentials this long before they expire.
const EXPIRY_MARGIN_SECS: i64 = 300;

/// A set of signing credentials.
#[derive(Clone)]
pub struct Credentials {
    /// Access key id.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Session token for temporary credentials.
    pub session_token: Option<String>,
    /// When temporary credentials stop being valid.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credentials {
    /// Create non-expiring credentials.
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token,
            expires_at: None,
        }
    }

    /// True if the credentials remain usable past the refresh margin.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - ChronoDuration::seconds(EXPIRY_MARGIN_SECS) > now,
            None => true,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .field("session_token", &self.session_token.as_ref().map(|_| "***"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of signing credentials.
#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;

    /// Return credentials valid for at least the next request.
    async fn credentials(&self) -> Result<Credentials>;
}

/// Fixed credentials, mostly for tests and local emulators.
#[derive(Debug, Clone)]
pub struct StaticCredentials(Credentials);

impl StaticCredentials {
    /// Wrap the given credentials.
    pub fn new(credentials: Credentials) -> Self {
        Self(credentials)
    }
}

#[async_trait]
impl CredentialsProvider for StaticCredentials {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn credentials(&self) -> Result<Credentials> {
        Ok(self.0.clone())
    }
}

/// Credentials read from the process environment on every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvironmentCredentials;

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl CredentialsProvider for EnvironmentCredentials {
    fn name(&self) -> &'static str {
        "environment"
    }

    async fn credentials(&self) -> Result<Credentials> {
        let access_key_id = non_empty_env("AWS_ACCESS_KEY_ID")
            .ok_or_else(|| Error::Credentials("AWS_ACCESS_KEY_ID is not set".to_string()))?;
        let secret_access_key = non_empty_env("AWS_SECRET_ACCESS_KEY")
            .ok_or_else(|| Error::Credentials("AWS_SECRET_ACCESS_KEY is not set".to_string()))?;
        Ok(Credentials::new(
            access_key_id,
            secret_access_key,
            non_empty_env("AWS_SESSION_TOKEN"),
        ))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerCredentialsResponse {
    access_key_id: String,
    secret_access_key: String,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    expiration: Option<DateTime<Utc>>,
}

/// Task role credentials served by the container agent.
pub struct ContainerCredentials {
    http: reqwest::Client,
    endpoint: String,
    authorization: Option<String>,
    cache: Mutex<Option<Credentials>>,
}

impl ContainerCredentials {
    /// Create a provider for an explicit endpoint.
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            authorization: None,
            cache: Mutex::new(None),
        }
    }

    /// Attach an authorization token sent with every credentials request.
    pub fn with_authorization(mut self, token: impl Into<String>) -> Self {
        self.authorization = Some(token.into());
        self
    }

    /// Build from the container agent environment, if present.
    pub fn from_env(http: reqwest::Client) -> Option<Self> {
        let endpoint = if let Some(relative) = non_empty_env("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI")
        {
            format!("{}{}", CONTAINER_CREDENTIALS_HOST, relative)
        } else {
            non_empty_env("AWS_CONTAINER_CREDENTIALS_FULL_URI")?
        };

        let provider = Self::new(http, endpoint);
        Some(match non_empty_env("AWS_CONTAINER_AUTHORIZATION_TOKEN") {
            Some(token) => provider.with_authorization(token),
            None => provider,
        })
    }

    async fn fetch(&self) -> Result<Credentials> {
        let mut request = self.http.get(&self.endpoint);
        if let Some(token) = &self.authorization {
            request = request.header("Authorization", token);
        }

        let response = request.send().await.map_err(|e| {
            Error::Credentials(format!("container credentials request failed: {}", e))
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Credentials(format!(
                "container credentials endpoint returned {}",
                status
            )));
        }

        let body: ContainerCredentialsResponse = response.json().await.map_err(|e| {
            Error::Credentials(format!("invalid container credentials response: {}", e))
        })?;

        Ok(Credentials {
            access_key_id: body.access_key_id,
            secret_access_key: body.secret_access_key,
            session_token: body.token,
            expires_at: body.expiration,
        })
    }
}

#[async_trait]
impl CredentialsProvider for ContainerCredentials {
    fn name(&self) -> &'static str {
        "container"
    }

    async fn credentials(&self) -> Result<Credentials> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref()
            && cached.is_fresh(Utc::now())
        {
            return Ok(cached.clone());
        }

        let fresh = self.fetch().await?;
        debug!(expires_at = ?fresh.expires_at, "Refreshed container credentials");
        *cache = Some(fresh.clone());
        Ok(fresh)
    }
}

/// Tries each provider in order and returns the first success.
pub struct CredentialsChain {
    providers: Vec<Arc<dyn CredentialsProvider>>,
}

impl CredentialsChain {
    /// Create a chain from explicit providers.
    pub fn new(providers: Vec<Arc<dyn CredentialsProvider>>) -> Self {
        Self { providers }
    }

    /// Environment variables first, then the container endpoint when configured.
    pub fn default_chain(http: reqwest::Client) -> Self {
        let mut providers: Vec<Arc<dyn CredentialsProvider>> = vec![Arc::new(EnvironmentCredentials)];
        if let Some(container) = ContainerCredentials::from_env(http) {
            providers.push(Arc::new(container));
        }
        Self::new(providers)
    }
}

#[async_trait]
impl CredentialsProvider for CredentialsChain {
    fn name(&self) -> &'static str {
        "chain"
    }

    async fn credentials(&self) -> Result<Credentials> {
        let mut failures = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            match provider.credentials().await {
                Ok(credentials) => return Ok(credentials),
                Err(e) => failures.push(format!("{}: {}", provider.name(), e)),
            }
        }
        Err(Error::Credentials(if failures.is_empty() {
            "no credential providers configured".to_string()
        } else {
            failures.join("; ")
        }))
    }
}
