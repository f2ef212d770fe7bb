//! # Song Sync Worker
//!
//! Copies the files named by a [`SongDiff`] between the local music folder
//! and the remote music folder. Each file is copied on its own: a failure is
//! logged and recorded, and the batch moves on. Stopping part way is a valid
//! outcome; the next run re-diffs and moves only what is left.
//!
//! Files are written to a `.partial` name and renamed into place, so an
//! interrupted copy never looks synced to the existence-only diff.

use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::diff::{diff_songs, resolve_key, SongDiff};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CopyDirection {
    Upload,
    Download,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedCopy {
    pub path: String,
    pub direction: CopyDirection,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongSyncReport {
    pub uploaded: Vec<String>,
    pub downloaded: Vec<String>,
    pub failed: Vec<FailedCopy>,
    /// Files not attempted because the run was cancelled
    pub skipped_cancelled: usize,
}

impl SongSyncReport {
    pub fn copied(&self) -> usize {
        self.uploaded.len() + self.downloaded.len()
    }

    pub fn was_cancelled(&self) -> bool {
        self.skipped_cancelled > 0
    }
}

pub struct SongSyncer {
    local_dir: PathBuf,
    remote_dir: PathBuf,
    extensions: Vec<String>,
    event_bus: Option<EventBus>,
}

impl SongSyncer {
    pub fn new(
        local_dir: impl Into<PathBuf>,
        remote_dir: impl Into<PathBuf>,
        extensions: Vec<String>,
    ) -> Self {
        Self {
            local_dir: local_dir.into(),
            remote_dir: remote_dir.into(),
            extensions,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub async fn diff(&self) -> Result<SongDiff> {
        diff_songs(&self.local_dir, &self.remote_dir, &self.extensions).await
    }

    /// Diff both folders and copy the difference.
    pub async fn sync(&self, job_id: &str, cancel: &CancellationToken) -> Result<SongSyncReport> {
        let diff = self.diff().await?;
        Ok(self.apply(job_id, &diff, cancel).await)
    }

    /// Copy every entry of `diff`, checking `cancel` between files.
    #[instrument(
        skip(self, diff, cancel),
        fields(to_upload = diff.to_upload.len(), to_download = diff.to_download.len())
    )]
    pub async fn apply(
        &self,
        job_id: &str,
        diff: &SongDiff,
        cancel: &CancellationToken,
    ) -> SongSyncReport {
        let work: Vec<(&String, CopyDirection)> = diff
            .to_upload
            .iter()
            .map(|p| (p, CopyDirection::Upload))
            .chain(diff.to_download.iter().map(|p| (p, CopyDirection::Download)))
            .collect();
        let total = work.len() as u64;
        let mut report = SongSyncReport::default();

        for (index, (key, direction)) in work.iter().enumerate() {
            if cancel.is_cancelled() {
                report.skipped_cancelled = work.len() - index;
                info!(remaining = report.skipped_cancelled, "Song sync cancelled");
                break;
            }

            let (src_root, dst_root) = match direction {
                CopyDirection::Upload => (&self.local_dir, &self.remote_dir),
                CopyDirection::Download => (&self.remote_dir, &self.local_dir),
            };
            let src = resolve_key(src_root, key);
            let dst = resolve_key(dst_root, key);

            match copy_file(&src, &dst).await {
                Ok(bytes) => {
                    debug!(path = %key, bytes, direction = ?direction, "Copied");
                    match direction {
                        CopyDirection::Upload => report.uploaded.push((*key).clone()),
                        CopyDirection::Download => report.downloaded.push((*key).clone()),
                    }
                }
                Err(e) => {
                    warn!(
                        path = %key,
                        direction = ?direction,
                        error = %e,
                        "Copy failed, continuing"
                    );
                    report.failed.push(FailedCopy {
                        path: (*key).clone(),
                        direction: *direction,
                        reason: e.to_string(),
                    });
                }
            }

            self.emit(SyncEvent::Progress {
                job_id: job_id.to_string(),
                processed: index as u64 + 1,
                total: Some(total),
            });
        }

        info!(
            copied = report.copied(),
            failed = report.failed.len(),
            skipped = report.skipped_cancelled,
            "Song sync finished"
        );
        report
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Sync(event)).ok();
        }
    }
}

async fn copy_file(src: &Path, dst: &Path) -> std::io::Result<u64> {
    if let Some(parent) = dst.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut partial = dst.as_os_str().to_os_string();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    let bytes = match tokio::fs::copy(src, &partial).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tokio::fs::remove_file(&partial).await.ok();
            return Err(e);
        }
    };
    if let Err(e) = tokio::fs::rename(&partial, dst).await {
        tokio::fs::remove_file(&partial).await.ok();
        return Err(e);
    }
    Ok(bytes)
}
