//! Mirror of the engine's artifacts into the synced cloud folder.

use std::path::PathBuf;
use tracing::{info, instrument, warn};

use core_backup::{prefixes, BackupError, CleanupReport, RetentionManager};

use crate::job::JobOutcome;

/// What one cloud backup pass wrote and cleaned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloudBackupReport {
    /// Snapshot names written into the cloud folder
    pub snapshots: Vec<String>,
    /// Prefixes whose source does not exist yet
    pub skipped: Vec<String>,
    /// `(prefix, error)` for snapshots that could not be written
    pub failed: Vec<(String, String)>,
    pub cleanup: CleanupReport,
}

impl JobOutcome for CloudBackupReport {
    fn counts(&self) -> (u64, u64) {
        (self.snapshots.len() as u64, self.failed.len() as u64)
    }
}

/// Snapshot every `(source, prefix)` pair into the cloud folder, then trim
/// each cloud prefix to `keep`.
///
/// A failed snapshot does not stop the others, and retention still runs.
#[instrument(skip(cloud, sources), fields(dir = %cloud.backup_dir().display()))]
pub(crate) async fn mirror(
    cloud: &RetentionManager,
    sources: &[(PathBuf, &'static str)],
    keep: usize,
) -> CloudBackupReport {
    let mut report = CloudBackupReport::default();

    for (source, prefix) in sources {
        match cloud.snapshot(source, prefix).await {
            Ok(snapshot) => report.snapshots.push(snapshot.name),
            Err(BackupError::SourceMissing(_)) => report.skipped.push(prefix.to_string()),
            Err(e) => {
                warn!(prefix = %prefix, error = %e, "Cloud snapshot failed");
                report.failed.push((prefix.to_string(), e.to_string()));
            }
        }
    }

    report.cleanup = cloud.cleanup_all(prefixes::CLOUD, keep).await;
    info!(
        written = report.snapshots.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        deleted = report.cleanup.total_deleted(),
        "Cloud backup finished"
    );
    report
}
