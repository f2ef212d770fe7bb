//! Named playlists persisted as one document.
//!
//! Every mutation loads the current document, applies the change and writes it
//! back under the store's lock, so concurrent callers never lose each other's
//! edits. The store accepts duplicate paths inside a playlist; the
//! [`PlaylistBuilder`] used by the editing flow is what rejects them.

use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, instrument};

use crate::document::{read_document, write_bytes_atomic, write_document, LoadOutcome};
use crate::error::{LibraryError, Result};
use crate::models::Playlists;

pub struct PlaylistStore {
    path: PathBuf,
    guard: Mutex<()>,
    event_bus: Option<EventBus>,
}

impl PlaylistStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hold the store lock across an external read-modify-write, such as a
    /// download replacing the whole document.
    pub async fn exclusive(&self) -> MutexGuard<'_, ()> {
        self.guard.lock().await
    }

    fn emit(&self, event: LibraryEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Library(event)).ok();
        }
    }

    async fn load_unlocked(&self) -> Result<Playlists> {
        Ok(read_document(&self.path).await?.into_value())
    }

    pub async fn all(&self) -> Result<Playlists> {
        let _guard = self.guard.lock().await;
        self.load_unlocked().await
    }

    pub async fn names(&self) -> Result<Vec<String>> {
        Ok(self.all().await?.into_keys().collect())
    }

    pub async fn get(&self, name: &str) -> Result<Vec<String>> {
        self.all()
            .await?
            .remove(name)
            .ok_or_else(|| LibraryError::PlaylistNotFound(name.to_string()))
    }

    /// Create an empty playlist.
    #[instrument(skip(self))]
    pub async fn create(&self, name: &str) -> Result<()> {
        let name = validate_name(name)?;
        let _guard = self.guard.lock().await;
        let mut playlists = self.load_unlocked().await?;
        if playlists.contains_key(name) {
            return Err(LibraryError::invalid(
                "name",
                format!("playlist '{name}' already exists"),
            ));
        }
        playlists.insert(name.to_string(), Vec::new());
        write_document(&self.path, &playlists).await?;

        info!(playlist = %name, "Playlist created");
        self.emit(LibraryEvent::PlaylistCreated {
            name: name.to_string(),
        });
        Ok(())
    }

    /// Replace the track list of `name`, creating the playlist if needed.
    #[instrument(skip(self, tracks), fields(track_count = tracks.len()))]
    pub async fn save_playlist(&self, name: &str, tracks: Vec<String>) -> Result<()> {
        let name = validate_name(name)?;
        let _guard = self.guard.lock().await;
        let mut playlists = self.load_unlocked().await?;
        let track_count = tracks.len();
        playlists.insert(name.to_string(), tracks);
        write_document(&self.path, &playlists).await?;

        info!(playlist = %name, track_count, "Playlist saved");
        self.emit(LibraryEvent::PlaylistSaved {
            name: name.to_string(),
            track_count,
        });
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, name: &str) -> Result<()> {
        let _guard = self.guard.lock().await;
        let mut playlists = self.load_unlocked().await?;
        if playlists.remove(name).is_none() {
            return Err(LibraryError::PlaylistNotFound(name.to_string()));
        }
        write_document(&self.path, &playlists).await?;

        info!(playlist = %name, "Playlist deleted");
        self.emit(LibraryEvent::PlaylistDeleted {
            name: name.to_string(),
        });
        Ok(())
    }

    /// Overwrite the document with raw bytes received from elsewhere.
    ///
    /// The bytes must parse as a playlist document. The caller must already
    /// hold [`PlaylistStore::exclusive`].
    pub async fn replace_raw_locked(&self, bytes: &[u8]) -> Result<Playlists> {
        let playlists: Playlists =
            serde_json::from_slice(bytes).map_err(|e| LibraryError::StoreCorrupt {
                path: self.path.display().to_string(),
                reason: format!("incoming playlist document rejected: {e}"),
            })?;
        write_bytes_atomic(&self.path, bytes).await?;
        Ok(playlists)
    }

    /// Raw document state, distinguishing a missing file from a corrupt one.
    pub async fn inspect(&self) -> Result<LoadOutcome<Playlists>> {
        let _guard = self.guard.lock().await;
        read_document(&self.path).await
    }
}

fn validate_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(LibraryError::invalid("name", "playlist name cannot be empty"));
    }
    Ok(trimmed)
}

/// Track list being assembled in an editor. Rejects duplicate paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistBuilder {
    tracks: Vec<String>,
}

impl PlaylistBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tracks(tracks: Vec<String>) -> Self {
        let mut builder = Self::new();
        for track in tracks {
            builder.push(track);
        }
        builder
    }

    /// Append `path`; returns `false` if it is already present.
    pub fn push(&mut self, path: impl Into<String>) -> bool {
        let path = path.into();
        if self.tracks.contains(&path) {
            return false;
        }
        self.tracks.push(path);
        true
    }

    pub fn remove(&mut self, path: &str) -> bool {
        let before = self.tracks.len();
        self.tracks.retain(|t| t != path);
        self.tracks.len() != before
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn into_tracks(self) -> Vec<String> {
        self.tracks
    }
}
