// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Seeding from and publishing to git repositories.
//!
//! Shells out to the `git` binary. Every clone happens in a scratch
//! directory removed on drop; subprocesses are killed when the calling
//! future is dropped.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use chrono::{SecondsFormat, Utc};
use tokio::process::Command;
use tracing::{debug, info};
use url::Url;

use super::fs::{clear_directory, copy_directory_contents, reset_directory};
use crate::workload::{AdapterError, Result, SourceLocator, WorkloadType};

/// User name embedded in authenticated clone URLs.
pub const TOKEN_USERNAME: &str = "x-access-token";

/// Commit author name used when none is configured.
pub const DEFAULT_AUTHOR_NAME: &str = "GameStack Bot";
/// Commit author email used when none is configured.
pub const DEFAULT_AUTHOR_EMAIL: &str = "gamestack-bot@example.com";

const REDACTED: &str = "***";

/// Commit author and optional access token.
#[derive(Clone)]
pub struct GitIdentity {
    /// Commit author name
    pub name: String,
    /// Commit author email
    pub email: String,
    /// Token embedded into https URLs
    pub token: Option<String>,
}

impl Default for GitIdentity {
    fn default() -> Self {
        Self {
            name: DEFAULT_AUTHOR_NAME.to_string(),
            email: DEFAULT_AUTHOR_EMAIL.to_string(),
            token: None,
        }
    }
}

impl std::fmt::Debug for GitIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitIdentity")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("token", &self.token.as_ref().map(|_| REDACTED))
            .finish()
    }
}

/// Outcome of publishing data to a source repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A commit was created and pushed.
    Pushed,
    /// The working tree matched the repository; nothing was pushed.
    Unchanged,
}

/// Git operations for one workload's data directory.
pub(crate) struct GitPipeline<'a> {
    identity: &'a GitIdentity,
    workload: &'a WorkloadType,
}

impl<'a> GitPipeline<'a> {
    pub(crate) fn new(identity: &'a GitIdentity, workload: &'a WorkloadType) -> Self {
        Self { identity, workload }
    }

    fn redact(&self, text: &str) -> String {
        match self.identity.token.as_deref().filter(|t| !t.is_empty()) {
            Some(token) => text.replace(token, REDACTED),
            None => text.to_string(),
        }
    }

    /// Embed the token into https URLs; other URLs pass through unchanged.
    pub(crate) fn authenticated_url(&self, repo_url: &str) -> Result<String> {
        let Some(token) = self.identity.token.as_deref().filter(|t| !t.is_empty()) else {
            return Ok(repo_url.to_string());
        };
        let Ok(mut url) = Url::parse(repo_url) else {
            return Ok(repo_url.to_string());
        };
        if url.scheme() != "https" {
            return Ok(repo_url.to_string());
        }
        url.set_username(TOKEN_USERNAME)
            .and_then(|_| url.set_password(Some(token)))
            .map_err(|_| {
                AdapterError::Validation(format!("cannot embed credentials into {}", repo_url))
            })?;
        Ok(url.to_string())
    }

    async fn run(&self, cwd: Option<&Path>, args: &[&str]) -> Result<String> {
        let mut command = Command::new("git");
        if let Some(cwd) = cwd {
            command.arg("-C").arg(cwd);
        }
        command
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let shown = self.redact(&args.join(" "));
        debug!(command = %shown, "Running git");

        let output = command.output().await.map_err(|e| AdapterError::Git {
            command: shown.clone(),
            stderr: e.to_string(),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = if stderr.trim().is_empty() {
                output.status.to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(AdapterError::Git {
                command: shown,
                stderr: self.redact(&stderr),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn source_dir(repo_dir: &Path, source: &SourceLocator) -> PathBuf {
        match source.subpath() {
            Some(subpath) => repo_dir.join(subpath),
            None => repo_dir.to_path_buf(),
        }
    }

    /// Replace `data_dir` with the locator's directory from a shallow clone.
    pub(crate) async fn seed(&self, source: &SourceLocator, data_dir: &Path) -> Result<()> {
        let scratch = tempfile::Builder::new()
            .prefix("gamestack-seed-")
            .tempdir()
            .map_err(|e| AdapterError::io(std::env::temp_dir(), e))?;
        let repo_dir = scratch.path().join("repo");
        let url = self.authenticated_url(source.repo_url())?;
        let repo_arg = repo_dir.to_string_lossy();

        self.run(
            None,
            &[
                "clone",
                "--depth",
                "1",
                "--branch",
                source.git_ref(),
                "--",
                &url,
                &repo_arg,
            ],
        )
        .await?;

        let src = Self::source_dir(&repo_dir, source);
        let is_dir = tokio::fs::metadata(&src)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(AdapterError::SourcePathNotFound(
                source
                    .subpath()
                    .map_or_else(|| ".".to_string(), |p| p.display().to_string()),
            ));
        }

        let data_dir = data_dir.to_path_buf();
        tokio::task::spawn_blocking(move || {
            reset_directory(&data_dir)?;
            copy_directory_contents(&src, &data_dir)
        })
        .await??;

        info!(workload = %self.workload, source = %source, "Seeded data from source");
        Ok(())
    }

    /// Copy `data_dir` into the locator's directory and push if anything changed.
    pub(crate) async fn sync(&self, source: &SourceLocator, data_dir: &Path) -> Result<SyncOutcome> {
        let scratch = tempfile::Builder::new()
            .prefix("gamestack-sync-")
            .tempdir()
            .map_err(|e| AdapterError::io(std::env::temp_dir(), e))?;
        let repo_dir = scratch.path().join("repo");
        let url = self.authenticated_url(source.repo_url())?;
        let repo_arg = repo_dir.to_string_lossy();

        self.run(None, &["clone", "--", &url, &repo_arg]).await?;

        let git_ref = source.git_ref();
        if self
            .run(Some(&repo_dir), &["checkout", git_ref])
            .await
            .is_err()
        {
            self.run(Some(&repo_dir), &["checkout", "-b", git_ref])
                .await?;
        }

        let target = Self::source_dir(&repo_dir, source);
        let data_dir = data_dir.to_path_buf();
        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&target).map_err(|e| AdapterError::io(&target, e))?;
            clear_directory(&target)?;
            copy_directory_contents(&data_dir, &target)
        })
        .await??;

        self.run(Some(&repo_dir), &["config", "user.name", &self.identity.name])
            .await?;
        self.run(Some(&repo_dir), &["config", "user.email", &self.identity.email])
            .await?;
        self.run(Some(&repo_dir), &["add", "-A"]).await?;

        let status = self
            .run(Some(&repo_dir), &["status", "--porcelain"])
            .await?;
        if status.trim().is_empty() {
            info!(workload = %self.workload, source = %source, "Source already up to date");
            return Ok(SyncOutcome::Unchanged);
        }

        let message = format!(
            "chore: sync {} data {}",
            self.workload,
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        self.run(Some(&repo_dir), &["commit", "-m", &message])
            .await?;
        let refspec = format!("HEAD:refs/heads/{}", git_ref);
        self.run(Some(&repo_dir), &["push", "origin", &refspec])
            .await?;

        info!(workload = %self.workload, source = %source, "Pushed data to source");
        Ok(SyncOutcome::Pushed)
    }
}
