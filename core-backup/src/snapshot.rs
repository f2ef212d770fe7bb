//! Snapshot naming and copying.
//!
//! A snapshot of artifact `prefix` taken at `ts` is named
//! `{prefix}_backup_{%Y-%m-%d_%H-%M-%S}`, followed by the source file's
//! extension for file snapshots (`metadata_backup_2024-05-01_12-00-00.json`).
//! Directory snapshots carry no extension (`artwork_backup_2024-05-01_12-00-00`).

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

use crate::error::{BackupError, Result};

pub const BACKUP_MARKER: &str = "_backup_";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Whether a snapshot holds a single file or a copied directory tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    File,
    Directory,
}

/// One snapshot in a backup directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub prefix: String,
    /// File or directory name inside the backup directory
    pub name: String,
    pub path: PathBuf,
    pub kind: SnapshotKind,
    pub modified: Option<SystemTime>,
}

/// Reject prefixes that would produce ambiguous or escaping names.
pub fn validate_prefix(prefix: &str) -> Result<()> {
    let valid = !prefix.is_empty()
        && prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(BackupError::InvalidPrefix(prefix.to_string()))
    }
}

pub fn snapshot_name(prefix: &str, taken_at: DateTime<Utc>, extension: Option<&str>) -> String {
    let stamp = taken_at.format(TIMESTAMP_FORMAT);
    match extension.filter(|ext| !ext.is_empty()) {
        Some(ext) => format!("{prefix}{BACKUP_MARKER}{stamp}.{ext}"),
        None => format!("{prefix}{BACKUP_MARKER}{stamp}"),
    }
}

/// Whether `name` is a snapshot of `prefix`.
///
/// The part after the marker must start with a digit so that prefix `library`
/// does not claim `library_backup_notes.txt`-style strays.
pub fn belongs_to(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix(BACKUP_MARKER))
        .and_then(|stamp| stamp.chars().next())
        .is_some_and(|c| c.is_ascii_digit())
}

/// Copy a directory tree, creating `dst` and any missing parents.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<u64> {
    let mut copied = 0;
    std::fs::create_dir_all(dst)?;

    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(std::io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(std::io::Error::other)?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }

    Ok(copied)
}
