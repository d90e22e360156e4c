// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared test doubles for controller integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gamestack_cloud::{Error as CloudError, ObjectLocation, ObjectStore, ServiceScheduler, ServiceState};
use tokio::sync::Mutex;

use gamestack_controller::{
    MemoryStateStore, Orchestrator, StubWorkload, WorkloadEntry, WorkloadRegistry, WorkloadType,
};

/// Object store keeping objects in memory, keyed by `s3://bucket/key`.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    /// Puts to keys ending with this suffix fail
    pub fail_put_suffix: Option<String>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_puts(suffix: &str) -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            fail_put_suffix: Some(suffix.to_string()),
        }
    }

    pub async fn keys(&self) -> Vec<String> {
        self.objects.lock().await.keys().cloned().collect()
    }

    pub async fn get(&self, location: &ObjectLocation) -> Option<Vec<u8>> {
        self.objects.lock().await.get(&location.to_string()).cloned()
    }

    pub async fn insert(&self, location: &ObjectLocation, body: Vec<u8>) {
        self.objects.lock().await.insert(location.to_string(), body);
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_bytes(&self, location: &ObjectLocation, body: Vec<u8>) -> gamestack_cloud::Result<()> {
        if let Some(suffix) = &self.fail_put_suffix {
            if location.key.ends_with(suffix.as_str()) {
                return Err(CloudError::Api {
                    operation: "PutObject".to_string(),
                    status: 503,
                    message: "SlowDown".to_string(),
                });
            }
        }
        self.insert(location, body).await;
        Ok(())
    }

    async fn get_bytes(&self, location: &ObjectLocation) -> gamestack_cloud::Result<Vec<u8>> {
        self.get(location).await.ok_or_else(|| CloudError::ObjectNotFound {
            bucket: location.bucket.clone(),
            key: location.key.clone(),
        })
    }

    async fn upload_file(&self, location: &ObjectLocation, path: &Path) -> gamestack_cloud::Result<()> {
        let body = tokio::fs::read(path).await.map_err(|e| CloudError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.put_bytes(location, body).await
    }

    async fn download_file(&self, location: &ObjectLocation, path: &Path) -> gamestack_cloud::Result<()> {
        let body = self.get_bytes(location).await?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| CloudError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        tokio::fs::write(path, body).await.map_err(|e| CloudError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// A recorded scheduler call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerCall {
    Scale {
        cluster: String,
        service: String,
        desired: u32,
        force: bool,
    },
    WaitStable {
        service: String,
    },
}

/// Scheduler that records calls and converges instantly.
#[derive(Default)]
pub struct RecordingScheduler {
    calls: Mutex<Vec<SchedulerCall>>,
    /// When set, every wait fails with a stabilization timeout
    pub never_stable: bool,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn never_stable() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            never_stable: true,
        }
    }

    pub async fn calls(&self) -> Vec<SchedulerCall> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ServiceScheduler for RecordingScheduler {
    async fn set_desired_count(
        &self,
        cluster: &str,
        service: &str,
        desired: u32,
        force_new_deployment: bool,
    ) -> gamestack_cloud::Result<()> {
        self.calls.lock().await.push(SchedulerCall::Scale {
            cluster: cluster.to_string(),
            service: service.to_string(),
            desired,
            force: force_new_deployment,
        });
        Ok(())
    }

    async fn describe_service(&self, _cluster: &str, service: &str) -> gamestack_cloud::Result<ServiceState> {
        Ok(ServiceState {
            service_name: service.to_string(),
            status: "ACTIVE".to_string(),
            ..Default::default()
        })
    }

    async fn wait_until_stable(
        &self,
        _cluster: &str,
        service: &str,
        timeout: Duration,
    ) -> gamestack_cloud::Result<()> {
        self.calls.lock().await.push(SchedulerCall::WaitStable {
            service: service.to_string(),
        });
        if self.never_stable {
            return Err(CloudError::StabilizationTimeout {
                service: service.to_string(),
                timeout,
            });
        }
        Ok(())
    }
}

/// Register each stub with source sync support.
pub fn registry_of(stubs: &[Arc<StubWorkload>]) -> WorkloadRegistry {
    stubs.iter().fold(WorkloadRegistry::new(), |registry, stub| {
        registry.with(WorkloadEntry::new(stub.clone()).with_source_sync(stub.clone()))
    })
}

/// Orchestrator over in-memory state and the given stubs.
pub fn orchestrator_with(stubs: &[Arc<StubWorkload>]) -> Orchestrator {
    Orchestrator::new(Arc::new(MemoryStateStore::new()), registry_of(stubs))
}

pub fn stub(name: &str) -> Arc<StubWorkload> {
    Arc::new(StubWorkload::new(WorkloadType::new(name)))
}

/// Locator pointing at a repository that is never cloned by stubs.
pub const SEED_LOCATOR: &str = "https://git.example.com/org/worlds.git#main:alpha";
