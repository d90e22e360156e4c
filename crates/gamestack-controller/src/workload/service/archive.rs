// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Zip archives of workload data directories.
//!
//! Blocking; call from `spawn_blocking`.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::fs::reset_directory;
use crate::workload::{AdapterError, Result};

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

/// Counts reported after archiving or extracting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    /// Regular files written
    pub files: usize,
    /// Directory entries written
    pub directories: usize,
    /// Symlinks and special files skipped
    pub skipped: usize,
}

fn file_options(path: &Path) -> Result<SimpleFileOptions> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = fs::metadata(path).map_err(|e| AdapterError::io(path, e))?;
        Ok(options.unix_permissions(metadata.permissions().mode() & 0o777))
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(options)
    }
}

fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Write every regular file and directory under `src` into a zip at `dst`.
///
/// Entry names are relative to `src` with `/` separators. Symlinks and
/// special files are skipped.
pub fn zip_directory(src: &Path, dst: &Path) -> Result<ArchiveStats> {
    let file = File::create(dst).map_err(|e| AdapterError::io(dst, e))?;
    let mut zip = ZipWriter::new(file);
    let mut stats = ArchiveStats::default();

    let walker = WalkDir::new(src)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            AdapterError::io(path, e.into())
        })?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| AdapterError::Other(e.to_string()))?;
        let name = entry_name(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            zip.add_directory(format!("{}/", name), file_options(entry.path())?)?;
            stats.directories += 1;
        } else if file_type.is_file() {
            zip.start_file(name, file_options(entry.path())?)?;
            let mut source =
                File::open(entry.path()).map_err(|e| AdapterError::io(entry.path(), e))?;
            io::copy(&mut source, &mut zip).map_err(|e| AdapterError::io(entry.path(), e))?;
            stats.files += 1;
        } else {
            debug!(path = %entry.path().display(), "Skipping non-regular file in backup");
            stats.skipped += 1;
        }
    }

    zip.finish()?;
    Ok(stats)
}

/// Resolve an entry name to a path relative to the extraction root.
///
/// Returns `None` for names that normalize to the root itself. Absolute
/// names and names escaping the root are rejected.
pub(crate) fn sanitize_entry_name(name: &str) -> Result<Option<PathBuf>> {
    let normalized = name.replace('\\', "/");
    let mut out = PathBuf::new();
    let mut depth = 0usize;

    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => {
                out.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(AdapterError::UnsafeArchiveEntry(name.to_string()));
                }
                out.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(AdapterError::UnsafeArchiveEntry(name.to_string()));
            }
        }
    }

    Ok((depth > 0).then_some(out))
}

/// Replace the contents of `dst` with the archive at `archive_path`.
///
/// Every entry name is validated before `dst` is touched. A top-level
/// `.git` directory in `dst` survives the reset.
pub fn restore_archive(archive_path: &Path, dst: &Path) -> Result<ArchiveStats> {
    let file = File::open(archive_path).map_err(|e| AdapterError::io(archive_path, e))?;
    let mut archive = ZipArchive::new(file)?;

    for name in archive.file_names() {
        sanitize_entry_name(name)?;
    }

    reset_directory(dst)?;
    let mut stats = ArchiveStats::default();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let Some(relative) = sanitize_entry_name(entry.name())? else {
            continue;
        };
        let target = dst.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| AdapterError::io(&target, e))?;
            stats.directories += 1;
            continue;
        }
        if entry
            .unix_mode()
            .is_some_and(|mode| mode & S_IFMT == S_IFLNK)
        {
            debug!(entry = entry.name(), "Skipping symlink entry in archive");
            stats.skipped += 1;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| AdapterError::io(parent, e))?;
        }
        let mut out = File::create(&target).map_err(|e| AdapterError::io(&target, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| AdapterError::io(&target, e))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o777))
                .map_err(|e| AdapterError::io(&target, e))?;
        }
        stats.files += 1;
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_zip(path: &Path, names: &[&str]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for name in names {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(b"payload").unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_sanitize_entry_names() {
        assert_eq!(
            sanitize_entry_name("world/level.dat").unwrap(),
            Some(PathBuf::from("world/level.dat"))
        );
        assert_eq!(
            sanitize_entry_name("a/../b").unwrap(),
            Some(PathBuf::from("b"))
        );
        assert_eq!(sanitize_entry_name("./").unwrap(), None);
        assert!(sanitize_entry_name("../evil").is_err());
        assert!(sanitize_entry_name("a/../../evil").is_err());
        assert!(sanitize_entry_name("/etc/passwd").is_err());
        assert!(sanitize_entry_name("..\\evil").is_err());
    }

    #[test]
    fn test_zip_and_restore_round_trip() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("data");
        fs::create_dir_all(src.join("world/region")).unwrap();
        fs::create_dir_all(src.join("logs")).unwrap();
        fs::write(src.join("server.properties"), "level-name=world").unwrap();
        fs::write(src.join("world/region/r.0.0.mca"), vec![9u8; 4096]).unwrap();

        let archive = temp.path().join("backup.zip");
        let stats = zip_directory(&src, &archive).unwrap();
        assert_eq!(stats.files, 2);
        assert_eq!(stats.directories, 3);

        let dst = temp.path().join("restored");
        fs::create_dir_all(dst.join(".git")).unwrap();
        fs::write(dst.join("stale.txt"), "old").unwrap();

        restore_archive(&archive, &dst).unwrap();

        assert_eq!(
            fs::read_to_string(dst.join("server.properties")).unwrap(),
            "level-name=world"
        );
        assert_eq!(fs::read(dst.join("world/region/r.0.0.mca")).unwrap().len(), 4096);
        assert!(dst.join("logs").is_dir());
        assert!(dst.join(".git").is_dir());
        assert!(!dst.join("stale.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_archived() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("data");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("real.txt"), "x").unwrap();
        std::os::unix::fs::symlink("/etc/passwd", src.join("link")).unwrap();

        let archive = temp.path().join("backup.zip");
        let stats = zip_directory(&src, &archive).unwrap();
        assert_eq!(stats.files, 1);
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn test_traversal_entry_rejected_before_destination_touched() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("evil.zip");
        write_zip(&archive, &["ok.txt", "../escape.txt"]);

        let dst = temp.path().join("data");
        fs::create_dir_all(&dst).unwrap();
        fs::write(dst.join("keep.txt"), "still here").unwrap();

        let err = restore_archive(&archive, &dst).unwrap_err();
        assert!(matches!(err, AdapterError::UnsafeArchiveEntry(_)));
        assert_eq!(fs::read_to_string(dst.join("keep.txt")).unwrap(), "still here");
        assert!(!temp.path().join("escape.txt").exists());
    }
}
