//! Read-only sync status, computed on demand for a status view.

use core_library::PlaylistStore;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use crate::diff::{count_songs, diff_playlists, diff_songs, PlaylistDiff, SongDiff};
use crate::error::Result;
use crate::transfer::TransferClient;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub local_playlists: usize,
    /// `None` when the remote could not be reached
    pub remote_playlists: Option<usize>,
    pub playlist_diff: Option<PlaylistDiff>,
    /// Reason the remote side is missing from this status
    pub remote_error: Option<String>,
    pub local_songs: usize,
    /// `None` when no remote music folder is configured
    pub song_diff: Option<SongDiff>,
}

impl SyncStatus {
    pub fn to_upload(&self) -> usize {
        self.song_diff.as_ref().map_or(0, |d| d.to_upload.len())
    }

    pub fn to_download(&self) -> usize {
        self.song_diff.as_ref().map_or(0, |d| d.to_download.len())
    }

    pub fn remote_songs(&self) -> Option<usize> {
        self.song_diff.as_ref().map(|d| d.remote_count)
    }
}

/// Where the status view looks.
pub struct StatusSources<'a> {
    pub playlists: &'a PlaylistStore,
    pub transfer: Option<&'a TransferClient>,
    pub remote_playlists_path: &'a str,
    pub music_dir: &'a Path,
    pub remote_music_dir: Option<&'a Path>,
    pub extensions: &'a [String],
}

/// Compute the status without changing anything. A remote failure is
/// reported in the status instead of failing the call.
pub async fn compute_status(sources: StatusSources<'_>) -> Result<SyncStatus> {
    let local = sources.playlists.all().await?;
    let mut status = SyncStatus {
        local_playlists: local.len(),
        ..Default::default()
    };

    if let Some(transfer) = sources.transfer {
        match transfer.fetch_playlists(sources.remote_playlists_path).await {
            Ok(remote) => {
                let remote = remote.unwrap_or_default();
                status.remote_playlists = Some(remote.len());
                status.playlist_diff = Some(diff_playlists(&local, &remote));
            }
            Err(e) => {
                warn!(error = %e, "Remote playlists unavailable for status");
                status.remote_error = Some(e.to_string());
            }
        }
    }

    match sources.remote_music_dir {
        Some(remote_dir) => {
            let diff = diff_songs(sources.music_dir, remote_dir, sources.extensions).await?;
            status.local_songs = diff.local_count;
            status.song_diff = Some(diff);
        }
        None => {
            status.local_songs = count_songs(sources.music_dir, sources.extensions).await?;
        }
    }

    debug!(
        local_playlists = status.local_playlists,
        local_songs = status.local_songs,
        to_upload = status.to_upload(),
        to_download = status.to_download(),
        "Sync status computed"
    );
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::FolderRemoteStorage;
    use bridge_traits::SystemClock;
    use core_backup::RetentionManager;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_status_against_folder_remote() {
        let dir = tempfile::tempdir().unwrap();
        let cloud = dir.path().join("cloud");
        let music = dir.path().join("music");
        let remote_music = cloud.join("Music");
        std::fs::create_dir_all(&music).unwrap();
        std::fs::create_dir_all(&remote_music).unwrap();
        std::fs::write(music.join("a.mp3"), b"").unwrap();
        std::fs::write(music.join("b.mp3"), b"").unwrap();
        std::fs::write(remote_music.join("b.mp3"), b"").unwrap();
        std::fs::write(
            cloud.join("playlists.json"),
            br#"{"Road Trip": ["x", "y", "z"], "Gym": []}"#,
        )
        .unwrap();

        let store = PlaylistStore::new(dir.path().join("playlists.json"));
        store
            .save_playlist("Road Trip", vec!["x".into(), "y".into()])
            .await
            .unwrap();

        let transfer = TransferClient::new(
            Arc::new(FolderRemoteStorage::new(&cloud)),
            Arc::new(RetentionManager::new(dir.path().join("backups"), Arc::new(SystemClock))),
        );
        let exts = vec!["mp3".to_string()];

        let status = compute_status(StatusSources {
            playlists: &store,
            transfer: Some(&transfer),
            remote_playlists_path: "playlists.json",
            music_dir: &music,
            remote_music_dir: Some(&remote_music),
            extensions: &exts,
        })
        .await
        .unwrap();

        assert_eq!(status.local_playlists, 1);
        assert_eq!(status.remote_playlists, Some(2));
        let diff = status.playlist_diff.as_ref().unwrap();
        assert_eq!(diff.modified, vec!["Road Trip".to_string()]);
        assert_eq!(diff.missing_in_local, vec!["Gym".to_string()]);
        assert_eq!(status.local_songs, 2);
        assert_eq!(status.to_upload(), 1);
        assert_eq!(status.to_download(), 0);
        assert_eq!(status.remote_songs(), Some(1));
        assert!(!dir.path().join("backups").exists());
    }

    #[tokio::test]
    async fn test_status_without_remote() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlaylistStore::new(dir.path().join("playlists.json"));
        let exts = vec!["mp3".to_string()];

        let status = compute_status(StatusSources {
            playlists: &store,
            transfer: None,
            remote_playlists_path: "playlists.json",
            music_dir: dir.path(),
            remote_music_dir: None,
            extensions: &exts,
        })
        .await
        .unwrap();

        assert_eq!(status.local_playlists, 0);
        assert!(status.playlist_diff.is_none());
        assert!(status.song_diff.is_none());
    }
}
