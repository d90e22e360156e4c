// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Blocking directory helpers. Call from `spawn_blocking`.

use std::fs;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::workload::{AdapterError, Result};

/// Top-level entry preserved by clearing and skipped by copying.
pub(crate) const RESERVED_DIR: &str = ".git";

/// Create `dir` if needed and remove everything in it except [`RESERVED_DIR`].
pub(crate) fn reset_directory(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| AdapterError::io(dir, e))?;
    clear_directory(dir)
}

/// Remove every entry of `dir` except [`RESERVED_DIR`]. Symlinks are removed, never followed.
pub(crate) fn clear_directory(dir: &Path) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| AdapterError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| AdapterError::io(dir, e))?;
        if entry.file_name() == RESERVED_DIR {
            continue;
        }
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| AdapterError::io(&path, e))?;
        let removed = if file_type.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.map_err(|e| AdapterError::io(&path, e))?;
    }
    Ok(())
}

/// Copy the contents of `src` into `dst`, skipping a top-level [`RESERVED_DIR`].
///
/// Regular files and directories are copied; symlinks and special files are skipped.
pub(crate) fn copy_directory_contents(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).map_err(|e| AdapterError::io(dst, e))?;

    let walker = WalkDir::new(src)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !(e.depth() == 1 && e.file_name() == RESERVED_DIR));

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            AdapterError::io(path, e.into())
        })?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| AdapterError::Other(e.to_string()))?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| AdapterError::io(&target, e))?;
        } else if file_type.is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| AdapterError::io(parent, e))?;
            }
            fs::copy(entry.path(), &target).map_err(|e| AdapterError::io(entry.path(), e))?;
        } else {
            debug!(path = %entry.path().display(), "Skipping non-regular file");
        }
    }
    Ok(())
}
