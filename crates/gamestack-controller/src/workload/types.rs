// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Value types shared by adapters and the orchestrator.

use std::borrow::Cow;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use gamestack_cloud::ObjectLocation;
use serde::{Deserialize, Serialize};

use super::traits::AdapterError;

/// Identifier of a workload type (which adapter owns a state slot).
///
/// The set is open: any registered name is a valid workload type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkloadType(Cow<'static, str>);

impl WorkloadType {
    /// Minecraft server backed by a scheduler service.
    pub const MINECRAFT: WorkloadType = WorkloadType(Cow::Borrowed("minecraft"));
    /// Hytale server (stub until official tooling exists).
    pub const HYTALE: WorkloadType = WorkloadType(Cow::Borrowed("hytale"));

    /// Create a workload type from a name, trimming whitespace.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Cow::Owned(name.as_ref().trim().to_string()))
    }

    /// The workload name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkloadType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Opaque locator of a durable snapshot; never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BackupRef(String);

impl BackupRef {
    /// Wrap a reference, rejecting empty values.
    pub fn new(reference: impl Into<String>) -> Result<Self, AdapterError> {
        let reference = reference.into().trim().to_string();
        if reference.is_empty() {
            return Err(AdapterError::Validation("empty backup reference".to_string()));
        }
        Ok(Self(reference))
    }

    /// The reference string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&ObjectLocation> for BackupRef {
    fn from(location: &ObjectLocation) -> Self {
        Self(location.to_string())
    }
}

impl TryFrom<String> for BackupRef {
    type Error = AdapterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BackupRef> for String {
    fn from(value: BackupRef) -> Self {
        value.0
    }
}

impl fmt::Display for BackupRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Git ref used when a locator names none.
pub const DEFAULT_SOURCE_REF: &str = "main";

/// Reference to a version-controlled copy of a workload's data.
///
/// Grammar: `<repo-url>[#<ref>[:<subpath>]]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceLocator {
    raw: String,
    repo_url: String,
    git_ref: String,
    subpath: Option<PathBuf>,
}

fn invalid_locator(raw: &str, reason: &str) -> AdapterError {
    AdapterError::Validation(format!("invalid source locator {:?}: {}", raw, reason))
}

fn valid_ref(git_ref: &str) -> bool {
    !git_ref.starts_with('-')
        && !git_ref.starts_with('/')
        && !git_ref.ends_with('/')
        && !git_ref.ends_with(".lock")
        && !git_ref.contains("..")
        && !git_ref.contains("@{")
        && !git_ref.chars().any(|c| {
            c.is_whitespace() || c.is_control() || matches!(c, '~' | '^' | ':' | '?' | '*' | '[' | '\\')
        })
}

fn parse_subpath(raw: &str, subpath: &str) -> Result<Option<PathBuf>, AdapterError> {
    let subpath = subpath.trim().trim_matches('/');
    if subpath.is_empty() {
        return Ok(None);
    }

    let mut out = PathBuf::new();
    for component in Path::new(subpath).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return Err(invalid_locator(raw, "subpath must stay inside the repository")),
        }
    }
    Ok((!out.as_os_str().is_empty()).then_some(out))
}

impl SourceLocator {
    /// Parse a locator. Malformed ref or subpath segments are rejected.
    pub fn parse(raw: &str) -> Result<Self, AdapterError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AdapterError::Validation(
                "source locator is required".to_string(),
            ));
        }

        let (repo_url, fragment) = match raw.split_once('#') {
            Some((repo, fragment)) => (repo.trim(), Some(fragment)),
            None => (raw, None),
        };
        if repo_url.is_empty() {
            return Err(invalid_locator(raw, "repository URL is empty"));
        }
        if repo_url.starts_with('-') || repo_url.chars().any(char::is_whitespace) {
            return Err(invalid_locator(raw, "repository URL is malformed"));
        }

        let (git_ref, subpath) = match fragment {
            None => (DEFAULT_SOURCE_REF.to_string(), None),
            Some(fragment) => {
                if fragment.contains('#') {
                    return Err(invalid_locator(raw, "more than one '#'"));
                }
                let (git_ref, subpath) = match fragment.split_once(':') {
                    Some((git_ref, subpath)) => (git_ref.trim(), Some(subpath)),
                    None => (fragment.trim(), None),
                };
                let git_ref = if git_ref.is_empty() {
                    DEFAULT_SOURCE_REF
                } else {
                    git_ref
                };
                if !valid_ref(git_ref) {
                    return Err(invalid_locator(raw, "ref segment is malformed"));
                }
                let subpath = match subpath {
                    Some(subpath) => parse_subpath(raw, subpath)?,
                    None => None,
                };
                (git_ref.to_string(), subpath)
            }
        };

        Ok(Self {
            raw: raw.to_string(),
            repo_url: repo_url.to_string(),
            git_ref,
            subpath,
        })
    }

    /// Repository URL as written (no credentials).
    pub fn repo_url(&self) -> &str {
        &self.repo_url
    }

    /// Branch or tag; `main` when unspecified.
    pub fn git_ref(&self) -> &str {
        &self.git_ref
    }

    /// Directory inside the repository; `None` means the repository root.
    pub fn subpath(&self) -> Option<&Path> {
        self.subpath.as_deref()
    }

    /// The locator as supplied.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl TryFrom<String> for SourceLocator {
    type Error = AdapterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SourceLocator> for String {
    fn from(value: SourceLocator) -> Self {
        value.raw
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
