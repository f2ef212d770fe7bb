//! Browser listing cache.
//!
//! A flat list of `{path, display}` entries sorted by display name, so the
//! library view can start without rescanning the music folder.

use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use crate::document::{read_document, write_document, LoadOutcome};
use crate::error::{LibraryError, Result};
use crate::models::LibraryEntry;
use crate::scan::scan_audio_files;

pub struct LibraryCache {
    path: PathBuf,
}

impl LibraryCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scan `root`, persist the listing and return it.
    #[instrument(skip(self, extensions), fields(root = %root.display()))]
    pub async fn rescan(&self, root: &Path, extensions: &[String]) -> Result<Vec<LibraryEntry>> {
        let root = root.to_path_buf();
        let extensions = extensions.to_vec();
        let files = tokio::task::spawn_blocking(move || scan_audio_files(&root, &extensions))
            .await
            .map_err(|e| LibraryError::Io(std::io::Error::other(e)))?;

        let entries = build_entries(files.iter().map(PathBuf::as_path));
        self.save(&entries).await?;
        info!(entries = entries.len(), "Library cache rebuilt");
        Ok(entries)
    }

    /// Cached entries whose files still exist.
    ///
    /// `None` means the cache is missing, corrupt, or entirely stale, and the
    /// caller should rescan.
    pub async fn load(&self) -> Result<Option<Vec<LibraryEntry>>> {
        let entries: Vec<LibraryEntry> = match read_document(&self.path).await? {
            LoadOutcome::Loaded(entries) => entries,
            LoadOutcome::Missing | LoadOutcome::Corrupt(_) => return Ok(None),
        };

        let total = entries.len();
        let mut surviving = Vec::with_capacity(total);
        for entry in entries {
            if tokio::fs::try_exists(&entry.path).await.unwrap_or(false) {
                surviving.push(entry);
            }
        }
        debug!(total, surviving = surviving.len(), "Library cache loaded");

        if surviving.is_empty() {
            Ok(None)
        } else {
            Ok(Some(surviving))
        }
    }

    pub async fn save(&self, entries: &[LibraryEntry]) -> Result<()> {
        write_document(&self.path, &entries).await
    }
}

/// Entries for `paths`, sorted case-insensitively by display name.
pub fn build_entries<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Vec<LibraryEntry> {
    let mut entries: Vec<LibraryEntry> = paths.into_iter().map(LibraryEntry::for_path).collect();
    entries.sort_by_cached_key(|e| e.display.to_lowercase());
    entries
}
