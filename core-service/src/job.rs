//! Background jobs.
//!
//! Long operations (library rebuild, song sync, playlist transfers, cloud
//! backup) run on the tokio runtime. The caller gets a [`JobHandle`] that
//! carries the job's [`JobId`], a cancellation token and the completion
//! signal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use core_library::RebuildSummary;
use core_sync::{DownloadReceipt, SongSyncReport, UploadReceipt};

use crate::error::{CoreError, Result};

/// Unique identifier for a background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Rebuild,
    SongSync,
    PlaylistUpload,
    PlaylistDownload,
    CloudBackup,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Rebuild => "rebuild",
            JobKind::SongSync => "song_sync",
            JobKind::PlaylistUpload => "playlist_upload",
            JobKind::PlaylistDownload => "playlist_download",
            JobKind::CloudBackup => "cloud_backup",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a finished job reports itself on the event bus.
pub trait JobOutcome {
    /// `(succeeded, failed)` item counts
    fn counts(&self) -> (u64, u64);

    fn was_cancelled(&self) -> bool {
        false
    }
}

impl JobOutcome for RebuildSummary {
    fn counts(&self) -> (u64, u64) {
        (
            (self.new_count + self.removed_count) as u64,
            self.unreadable_count as u64,
        )
    }

    fn was_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl JobOutcome for SongSyncReport {
    fn counts(&self) -> (u64, u64) {
        (self.copied() as u64, self.failed.len() as u64)
    }

    fn was_cancelled(&self) -> bool {
        SongSyncReport::was_cancelled(self)
    }
}

impl JobOutcome for UploadReceipt {
    fn counts(&self) -> (u64, u64) {
        (1, 0)
    }
}

impl JobOutcome for DownloadReceipt {
    fn counts(&self) -> (u64, u64) {
        (1, 0)
    }
}

/// Handle to a running background job.
///
/// Dropping the handle detaches the job; it keeps running to completion.
#[derive(Debug)]
pub struct JobHandle<T> {
    id: JobId,
    kind: JobKind,
    cancel: CancellationToken,
    handle: JoinHandle<Result<T>>,
}

impl<T> JobHandle<T> {
    pub(crate) fn new(
        id: JobId,
        kind: JobKind,
        cancel: CancellationToken,
        handle: JoinHandle<Result<T>>,
    ) -> Self {
        Self {
            id,
            kind,
            cancel,
            handle,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// Ask the job to stop at its next checkpoint. Work already done is kept.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the job to finish and return its result.
    pub async fn wait(self) -> Result<T> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(CoreError::JobFailed {
                job_id: self.id.to_string(),
                message: e.to_string(),
            }),
        }
    }
}
