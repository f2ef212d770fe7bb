use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::document::{read_document, write_document, LoadOutcome};
use crate::error::Result;
use crate::models::MetadataMap;

/// The persisted path → record map.
///
/// Callers that read, modify and write the map hold [`MetadataStore::exclusive`]
/// for the whole sequence; the indexer does this for a full rebuild pass.
pub struct MetadataStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl MetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exclusive(&self) -> MutexGuard<'_, ()> {
        self.guard.lock().await
    }

    /// Current map; empty when the document is absent or corrupt.
    pub async fn load(&self) -> Result<MetadataMap> {
        let outcome = read_document::<MetadataMap>(&self.path).await?;
        if let LoadOutcome::Loaded(map) = &outcome {
            debug!(records = map.len(), "Metadata store loaded");
        }
        Ok(outcome.into_value())
    }

    pub async fn save(&self, map: &MetadataMap) -> Result<()> {
        write_document(&self.path, map).await?;
        debug!(records = map.len(), "Metadata store saved");
        Ok(())
    }
}
