//! # Backup Retention Manager
//!
//! Creates timestamped snapshots of an artifact and keeps only the newest `N`
//! per prefix.
//!
//! ## Failure policy
//!
//! Retention is advisory. [`RetentionManager::enforce`] never fails: a snapshot
//! that cannot be deleted (locked by a sync client, permission change) is
//! logged, recorded in [`EnforceReport::failed`] and skipped. Only
//! [`RetentionManager::snapshot`] returns errors, and callers treat those as
//! warnings too.
//!
//! ## Ordering
//!
//! Snapshots are ranked by modification time, newest first. Equal times fall
//! back to the name, whose timestamp suffix sorts chronologically.

use async_trait::async_trait;
use bridge_traits::Clock;
use core_runtime::events::{BackupEvent, CoreEvent, EventBus};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use crate::error::{BackupError, Result};
use crate::snapshot::{
    belongs_to, copy_dir_recursive, snapshot_name, validate_prefix, Snapshot, SnapshotKind,
};

/// Outcome of one retention pass over a prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnforceReport {
    pub prefix: String,
    /// Surviving snapshot names, newest first
    pub kept: Vec<String>,
    pub deleted: Vec<String>,
    /// Snapshots that should have been deleted but could not be
    pub failed: Vec<String>,
}

/// Outcome of [`RetentionManager::cleanup_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub reports: Vec<EnforceReport>,
}

impl CleanupReport {
    pub fn total_deleted(&self) -> usize {
        self.reports.iter().map(|r| r.deleted.len()).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.reports.iter().map(|r| r.failed.len()).sum()
    }

    pub fn for_prefix(&self, prefix: &str) -> Option<&EnforceReport> {
        self.reports.iter().find(|r| r.prefix == prefix)
    }
}

/// Deletes snapshots that fell out of retention.
///
/// Hosts whose cloud client holds files open can swap in a remover that
/// moves snapshots to a trash folder instead.
#[async_trait]
pub trait SnapshotRemover: Send + Sync {
    async fn remove(&self, snapshot: &Snapshot) -> std::io::Result<()>;
}

/// Removes snapshots from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSnapshotRemover;

#[async_trait]
impl SnapshotRemover for FsSnapshotRemover {
    async fn remove(&self, snapshot: &Snapshot) -> std::io::Result<()> {
        match snapshot.kind {
            SnapshotKind::Directory => fs::remove_dir_all(&snapshot.path).await,
            SnapshotKind::File => fs::remove_file(&snapshot.path).await,
        }
    }
}

/// Owns the snapshots in one backup directory.
pub struct RetentionManager {
    backup_dir: PathBuf,
    clock: Arc<dyn Clock>,
    remover: Arc<dyn SnapshotRemover>,
    event_bus: Option<EventBus>,
}

impl RetentionManager {
    pub fn new(backup_dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            clock,
            remover: Arc::new(FsSnapshotRemover),
            event_bus: None,
        }
    }

    pub fn with_remover(mut self, remover: Arc<dyn SnapshotRemover>) -> Self {
        self.remover = remover;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    fn emit(&self, event: BackupEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Backup(event)).ok();
        }
    }

    /// Copy `source` (file or directory) into the backup directory.
    ///
    /// Two snapshots of the same prefix within one second share a name; the
    /// later one replaces the earlier.
    #[instrument(skip(self), fields(backup_dir = %self.backup_dir.display()))]
    pub async fn snapshot(&self, source: &Path, prefix: &str) -> Result<Snapshot> {
        validate_prefix(prefix)?;

        let metadata = match fs::metadata(source).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BackupError::SourceMissing(source.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        fs::create_dir_all(&self.backup_dir).await?;

        let taken_at = self.clock.now();
        let (name, path, kind) = if metadata.is_dir() {
            let name = snapshot_name(prefix, taken_at, None);
            let target = self.backup_dir.join(&name);
            let src = source.to_path_buf();
            let dst = target.clone();
            let copied = tokio::task::spawn_blocking(move || copy_dir_recursive(&src, &dst))
                .await
                .map_err(|e| BackupError::write_failed(&name, std::io::Error::other(e)))?
                .map_err(|e| BackupError::write_failed(&name, e))?;
            debug!(name = %name, files = copied, "Directory snapshot copied");
            (name, target, SnapshotKind::Directory)
        } else {
            let extension = source.extension().and_then(|ext| ext.to_str());
            let name = snapshot_name(prefix, taken_at, extension);
            let target = self.backup_dir.join(&name);
            fs::copy(source, &target)
                .await
                .map_err(|e| BackupError::write_failed(&name, e))?;
            // Some platforms carry the source mtime over on copy
            touch_modified(&target)
                .await
                .map_err(|e| BackupError::write_failed(&name, e))?;
            (name, target, SnapshotKind::File)
        };

        let modified = fs::metadata(&path).await.ok().and_then(|m| m.modified().ok());
        info!(prefix = %prefix, name = %name, "Snapshot created");
        self.emit(BackupEvent::SnapshotCreated {
            prefix: prefix.to_string(),
            name: name.clone(),
        });

        Ok(Snapshot {
            prefix: prefix.to_string(),
            name,
            path,
            kind,
            modified,
        })
    }

    /// Snapshot `source`, then trim `prefix` to `keep`. Snapshot failures are
    /// logged and reported as `None`.
    pub async fn snapshot_and_enforce(
        &self,
        source: &Path,
        prefix: &str,
        keep: usize,
    ) -> Option<Snapshot> {
        let snapshot = match self.snapshot(source, prefix).await {
            Ok(snapshot) => Some(snapshot),
            Err(BackupError::SourceMissing(path)) => {
                debug!(prefix = %prefix, path = %path, "Nothing to snapshot yet");
                None
            }
            Err(e) => {
                warn!(prefix = %prefix, error = %e, "Snapshot failed, continuing without it");
                self.emit(BackupEvent::SnapshotFailed {
                    prefix: prefix.to_string(),
                    message: e.to_string(),
                });
                None
            }
        };
        self.enforce(prefix, keep).await;
        snapshot
    }

    /// All snapshots of `prefix`, newest first.
    pub async fn list(&self, prefix: &str) -> Result<Vec<Snapshot>> {
        let mut entries = match fs::read_dir(&self.backup_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut snapshots = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !belongs_to(&name, prefix) {
                continue;
            }

            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    // Vanished between listing and stat
                    debug!(name = %name, error = %e, "Skipping unreadable snapshot entry");
                    continue;
                }
            };

            snapshots.push(Snapshot {
                prefix: prefix.to_string(),
                name,
                path: entry.path(),
                kind: if metadata.is_dir() {
                    SnapshotKind::Directory
                } else {
                    SnapshotKind::File
                },
                modified: metadata.modified().ok(),
            });
        }

        snapshots.sort_by(newest_first);
        Ok(snapshots)
    }

    /// Delete every snapshot of `prefix` beyond the `keep` newest.
    #[instrument(skip(self), fields(backup_dir = %self.backup_dir.display()))]
    pub async fn enforce(&self, prefix: &str, keep: usize) -> EnforceReport {
        let mut report = EnforceReport {
            prefix: prefix.to_string(),
            ..Default::default()
        };

        let snapshots = match self.list(prefix).await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                warn!(prefix = %prefix, error = %e, "Could not list backups, skipping retention");
                return report;
            }
        };

        for (index, snapshot) in snapshots.into_iter().enumerate() {
            if index < keep {
                report.kept.push(snapshot.name);
                continue;
            }

            let removal = self
                .remover
                .remove(&snapshot)
                .await
                .map_err(|e| BackupError::delete_failed(&snapshot.name, e));
            match removal {
                Ok(()) => {
                    debug!(name = %snapshot.name, "Deleted old backup");
                    report.deleted.push(snapshot.name);
                }
                Err(e) => {
                    warn!(
                        name = %snapshot.name,
                        error = %e,
                        "Could not delete old backup, skipping"
                    );
                    report.failed.push(snapshot.name);
                }
            }
        }

        info!(
            prefix = %prefix,
            kept = report.kept.len(),
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "Retention enforced"
        );
        self.emit(BackupEvent::RetentionEnforced {
            prefix: prefix.to_string(),
            kept: report.kept.len(),
            deleted: report.deleted.len(),
            failed: report.failed.len(),
        });

        report
    }

    /// Enforce `keep` for each prefix in turn.
    pub async fn cleanup_all(&self, prefixes: &[&str], keep: usize) -> CleanupReport {
        let mut cleanup = CleanupReport::default();
        for prefix in prefixes {
            cleanup.reports.push(self.enforce(prefix, keep).await);
        }
        cleanup
    }
}

/// Stamp `path` with the current time so retention ranks it as the newest.
async fn touch_modified(path: &Path) -> std::io::Result<()> {
    let file = fs::OpenOptions::new().write(true).open(path).await?.into_std().await;
    tokio::task::spawn_blocking(move || file.set_modified(SystemTime::now()))
        .await
        .map_err(std::io::Error::other)?
}

fn newest_first(a: &Snapshot, b: &Snapshot) -> Ordering {
    b.modified
        .cmp(&a.modified)
        .then_with(|| b.name.cmp(&a.name))
}
