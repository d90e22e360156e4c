// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Source sync tests against local bare repositories.
//!
//! Skipped when no `git` binary is available.

use std::path::Path;
use std::process::Command;

use gamestack_cloud::ErrorKind;
use gamestack_controller::workload::{
    GitIdentity, ServiceWorkload, ServiceWorkloadConfig, SourceLocator, SourceSync, Workload,
    WorkloadType,
};
use tempfile::TempDir;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(cwd: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(cwd)
        .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
        .args(["-c", "commit.gpgsign=false"])
        .args(args)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Create a bare repository with `servers/mc/server.properties` on `main`.
fn seeded_remote(root: &Path) -> std::path::PathBuf {
    let bare = root.join("remote.git");
    std::fs::create_dir_all(&bare).unwrap();
    git(&bare, &["init", "--bare", "-q"]);
    git(&bare, &["symbolic-ref", "HEAD", "refs/heads/main"]);

    let work = root.join("work");
    std::fs::create_dir_all(work.join("servers/mc")).unwrap();
    git(&work, &["init", "-q"]);
    git(&work, &["checkout", "-q", "-b", "main"]);
    std::fs::write(work.join("servers/mc/server.properties"), "motd=seeded\n").unwrap();
    std::fs::write(work.join("README.md"), "worlds\n").unwrap();
    git(&work, &["add", "-A"]);
    git(&work, &["commit", "-q", "-m", "initial"]);
    git(&work, &["remote", "add", "origin", bare.to_str().unwrap()]);
    git(&work, &["push", "-q", "origin", "main"]);
    bare
}

fn workload(data_dir: &Path) -> ServiceWorkload {
    let mut config = ServiceWorkloadConfig::new(WorkloadType::MINECRAFT, data_dir);
    config.git = GitIdentity {
        name: "GameStack Bot".to_string(),
        email: "bot@example.com".to_string(),
        token: None,
    };
    ServiceWorkload::new(config)
}

fn locator(bare: &Path, suffix: &str) -> SourceLocator {
    SourceLocator::parse(&format!("file://{}{}", bare.display(), suffix)).unwrap()
}

fn commit_count(bare: &Path) -> usize {
    git(bare, &["rev-list", "--count", "main"]).trim().parse().unwrap()
}

#[tokio::test]
async fn test_seed_copies_subpath_into_data_dir() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let temp = TempDir::new().unwrap();
    let bare = seeded_remote(temp.path());
    let data_dir = temp.path().join("data");
    std::fs::create_dir_all(data_dir.join(".git")).unwrap();
    std::fs::write(data_dir.join("old-world.dat"), "stale").unwrap();

    let mc = workload(&data_dir);
    mc.seed_from_source(&locator(&bare, "#main:servers/mc"))
        .await
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(data_dir.join("server.properties")).unwrap(),
        "motd=seeded\n"
    );
    assert!(!data_dir.join("old-world.dat").exists());
    assert!(!data_dir.join("README.md").exists());
    assert!(data_dir.join(".git").is_dir());

    let status = mc.status().await.unwrap();
    assert!(status["last_source"].as_str().unwrap().ends_with("#main:servers/mc"));
}

#[tokio::test]
async fn test_seed_missing_subpath_is_not_found() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let temp = TempDir::new().unwrap();
    let bare = seeded_remote(temp.path());
    let mc = workload(&temp.path().join("data"));

    let err = mc
        .seed_from_source(&locator(&bare, "#main:servers/nope"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_seed_unknown_branch_fails() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let temp = TempDir::new().unwrap();
    let bare = seeded_remote(temp.path());
    let mc = workload(&temp.path().join("data"));

    let err = mc
        .seed_from_source(&locator(&bare, "#does-not-exist"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Infrastructure);
}

#[tokio::test]
async fn test_sync_commits_only_when_changed() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let temp = TempDir::new().unwrap();
    let bare = seeded_remote(temp.path());
    let data_dir = temp.path().join("data");
    let source = locator(&bare, "#main:servers/mc");

    let mc = workload(&data_dir);
    mc.seed_from_source(&source).await.unwrap();
    assert_eq!(commit_count(&bare), 1);

    // Unchanged data: nothing pushed.
    mc.sync_to_source(&source).await.unwrap();
    assert_eq!(commit_count(&bare), 1);

    std::fs::write(data_dir.join("server.properties"), "motd=updated\n").unwrap();
    std::fs::write(data_dir.join("ops.json"), "[]").unwrap();
    mc.sync_to_source(&source).await.unwrap();
    assert_eq!(commit_count(&bare), 2);

    let properties = git(&bare, &["show", "main:servers/mc/server.properties"]);
    assert_eq!(properties, "motd=updated\n");
    let message = git(&bare, &["log", "-1", "--format=%s", "main"]);
    assert!(message.starts_with("chore: sync minecraft data "));
    let author = git(&bare, &["log", "-1", "--format=%an <%ae>", "main"]);
    assert_eq!(author.trim(), "GameStack Bot <bot@example.com>");

    // Files outside the subpath are untouched.
    assert_eq!(git(&bare, &["show", "main:README.md"]), "worlds\n");
}

#[tokio::test]
async fn test_sync_creates_missing_branch() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let temp = TempDir::new().unwrap();
    let bare = seeded_remote(temp.path());
    let data_dir = temp.path().join("data");
    std::fs::create_dir_all(&data_dir).unwrap();
    std::fs::write(data_dir.join("level.dat"), "x").unwrap();

    let mc = workload(&data_dir);
    mc.sync_to_source(&locator(&bare, "#snapshots:mc"))
        .await
        .unwrap();

    assert_eq!(git(&bare, &["show", "snapshots:mc/level.dat"]), "x");
}

#[tokio::test]
async fn test_sync_with_default_identity_authors_as_bot() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let temp = TempDir::new().unwrap();
    let bare = seeded_remote(temp.path());
    let data_dir = temp.path().join("data");
    let source = locator(&bare, "#main:servers/mc");

    let mc = ServiceWorkload::new(ServiceWorkloadConfig::new(WorkloadType::MINECRAFT, &data_dir));
    mc.seed_from_source(&source).await.unwrap();
    std::fs::write(data_dir.join("whitelist.json"), "[]").unwrap();
    mc.sync_to_source(&source).await.unwrap();

    let author = git(&bare, &["log", "-1", "--format=%an <%ae>", "main"]);
    assert_eq!(author.trim(), "GameStack Bot <gamestack-bot@example.com>");
}
