//! # Metadata Indexer
//!
//! Reconciles the metadata store with the audio files under a root folder.
//!
//! ## Rebuild pass
//!
//! 1. Load the store (absent or corrupt means empty)
//! 2. Snapshot the store document under prefix `metadata` and trim old snapshots
//! 3. Scan the root for audio files
//! 4. Read tags for every path not yet in the store
//! 5. Drop records (and their artwork) whose file is gone
//! 6. Write the store back atomically
//!
//! Files already in the store are not re-read, so tag edits made after the
//! first index are not picked up until the record is removed.

use bridge_traits::error::BridgeError;
use bridge_traits::tags::TagReader;
use core_backup::{prefixes, RetentionManager};
use core_runtime::config::{RetentionPolicy, DEFAULT_AUDIO_EXTENSIONS};
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::artwork::ArtworkCache;
use crate::error::{LibraryError, Result};
use crate::metadata_store::MetadataStore;
use crate::models::{file_stem, MetadataMap, RebuildSummary, TrackRecord};
use crate::scan::scan_audio_files;

pub struct MetadataIndexer {
    store: Arc<MetadataStore>,
    tag_reader: Arc<dyn TagReader>,
    artwork: ArtworkCache,
    retention: Arc<RetentionManager>,
    local_keep: usize,
    extensions: Vec<String>,
    event_bus: Option<EventBus>,
}

impl MetadataIndexer {
    pub fn new(
        store: Arc<MetadataStore>,
        tag_reader: Arc<dyn TagReader>,
        artwork: ArtworkCache,
        retention: Arc<RetentionManager>,
    ) -> Self {
        Self {
            store,
            tag_reader,
            artwork,
            retention,
            local_keep: RetentionPolicy::default().local_keep,
            extensions: DEFAULT_AUDIO_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            event_bus: None,
        }
    }

    pub fn with_local_keep(mut self, keep: usize) -> Self {
        self.local_keep = keep;
        self
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn store(&self) -> &Arc<MetadataStore> {
        &self.store
    }

    fn emit(&self, event: LibraryEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Library(event)).ok();
        }
    }

    pub async fn rebuild(&self, root: &Path) -> Result<RebuildSummary> {
        self.rebuild_with_cancel(root, &CancellationToken::new())
            .await
    }

    /// Run one rebuild pass.
    ///
    /// Cancellation is checked between files. A cancelled pass still removes
    /// dead records and saves what it has indexed so far; the next pass picks
    /// up the remaining files.
    #[instrument(skip(self, cancel), fields(root = %root.display()))]
    pub async fn rebuild_with_cancel(
        &self,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<RebuildSummary> {
        let root = normalize_root(root)?;
        if !tokio::fs::metadata(&root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Err(LibraryError::invalid(
                "root",
                format!("{} is not a readable directory", root.display()),
            ));
        }

        let _guard = self.store.exclusive().await;
        self.emit(LibraryEvent::RebuildStarted {
            root: root.display().to_string(),
        });

        let mut records = self.store.load().await?;
        self.retention
            .snapshot_and_enforce(self.store.path(), prefixes::METADATA, self.local_keep)
            .await;

        let found = self.scan(&root).await?;
        let found_keys: BTreeSet<String> = found
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();

        let mut summary = RebuildSummary::default();
        for path in &found {
            let key = path.to_string_lossy().into_owned();
            if records.contains_key(&key) {
                continue;
            }
            if cancel.is_cancelled() {
                info!("Rebuild cancelled, keeping progress");
                summary.cancelled = true;
                break;
            }

            let (record, unreadable) = self.index_file(path).await;
            if unreadable {
                summary.unreadable_count += 1;
            }
            records.insert(key, record);
            summary.new_count += 1;
        }

        summary.removed_count = self.remove_missing(&mut records, &found_keys).await;
        summary.total = records.len();

        self.store.save(&records).await?;

        info!(
            total = summary.total,
            new_count = summary.new_count,
            removed_count = summary.removed_count,
            unreadable = summary.unreadable_count,
            "Rebuild completed"
        );
        self.emit(LibraryEvent::RebuildCompleted {
            total: summary.total,
            new_count: summary.new_count,
            removed_count: summary.removed_count,
        });
        Ok(summary)
    }

    async fn scan(&self, root: &Path) -> Result<BTreeSet<PathBuf>> {
        let root = root.to_path_buf();
        let extensions = self.extensions.clone();
        tokio::task::spawn_blocking(move || scan_audio_files(&root, &extensions))
            .await
            .map_err(|e| LibraryError::Io(std::io::Error::other(e)))
    }

    /// Build the record for one new file. Never fails; the flag reports a
    /// filename-only fallback.
    async fn index_file(&self, path: &Path) -> (TrackRecord, bool) {
        let tags = match self.tag_reader.read_tags(path).await {
            Ok(tags) => tags,
            Err(e) => {
                let reason = match &e {
                    BridgeError::Unreadable { reason, .. } => reason.clone(),
                    other => other.to_string(),
                };
                warn!(
                    path = %path.display(),
                    reason = %reason,
                    "Tags unreadable, indexing by filename"
                );
                self.emit(LibraryEvent::TrackUnreadable {
                    path: path.display().to_string(),
                    reason,
                });
                return (TrackRecord::stem_only(path), true);
            }
        };

        let mut record = TrackRecord::from_tags(path, &tags);
        if let Some(artwork) = tags.artwork {
            match self.artwork.store(&file_stem(path), artwork.data).await {
                Ok(relative) => record.artwork = relative,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Artwork skipped");
                }
            }
        }
        (record, false)
    }

    /// Drop records whose file is no longer present, with their artwork.
    async fn remove_missing(&self, records: &mut MetadataMap, found: &BTreeSet<String>) -> usize {
        let dead: Vec<String> = records
            .keys()
            .filter(|key| !found.contains(*key))
            .cloned()
            .collect();

        for key in &dead {
            let Some(record) = records.remove(key) else {
                continue;
            };
            if !record.has_artwork() {
                continue;
            }
            let shared = records.values().any(|r| r.artwork == record.artwork);
            if shared {
                debug!(artwork = %record.artwork, "Artwork still referenced, keeping file");
                continue;
            }
            if let Err(e) = self.artwork.remove(&record.artwork).await {
                warn!(artwork = %record.artwork, error = %e, "Failed to delete artwork");
            }
        }

        dead.len()
    }
}

/// Absolute form of `root` with `.` and `..` folded away, so the same folder
/// always yields the same record keys.
fn normalize_root(root: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(root).map_err(LibraryError::Io)?;
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}
