//! # Sync Diff Engine
//!
//! Read-only classification of local state against a remote counterpart.
//!
//! - Playlists compare by content: a name present on both sides is `Modified`
//!   unless the track lists are equal element by element, order included.
//! - Songs compare by existence only: a relative path present on both sides is
//!   never reported, whatever the file contents.

use core_library::scan::scan_audio_files;
use core_library::Playlists;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::{Result, SyncError};

/// Action for one playlist name or song path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SyncDecision {
    UploadNew,
    DownloadMissing,
    Modified,
    InSync,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistDiff {
    /// Local only
    pub missing_in_remote: Vec<String>,
    /// Remote only
    pub missing_in_local: Vec<String>,
    pub modified: Vec<String>,
    pub in_sync: Vec<String>,
}

impl PlaylistDiff {
    pub fn in_sync_count(&self) -> usize {
        self.in_sync.len()
    }

    pub fn is_in_sync(&self) -> bool {
        self.missing_in_remote.is_empty()
            && self.missing_in_local.is_empty()
            && self.modified.is_empty()
    }

    /// Every name with its decision, sorted by name.
    pub fn decisions(&self) -> Vec<(String, SyncDecision)> {
        let mut all: Vec<(String, SyncDecision)> = self
            .missing_in_remote
            .iter()
            .map(|n| (n.clone(), SyncDecision::UploadNew))
            .chain(self.missing_in_local.iter().map(|n| (n.clone(), SyncDecision::DownloadMissing)))
            .chain(self.modified.iter().map(|n| (n.clone(), SyncDecision::Modified)))
            .chain(self.in_sync.iter().map(|n| (n.clone(), SyncDecision::InSync)))
            .collect();
        all.sort();
        all
    }

    pub fn decision_for(&self, name: &str) -> Option<SyncDecision> {
        self.decisions()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d)
    }
}

pub fn diff_playlists(local: &Playlists, remote: &Playlists) -> PlaylistDiff {
    let mut diff = PlaylistDiff::default();

    for (name, tracks) in local {
        match remote.get(name) {
            None => diff.missing_in_remote.push(name.clone()),
            Some(remote_tracks) if remote_tracks == tracks => diff.in_sync.push(name.clone()),
            Some(_) => diff.modified.push(name.clone()),
        }
    }
    diff.missing_in_local = remote
        .keys()
        .filter(|name| !local.contains_key(*name))
        .cloned()
        .collect();

    diff
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongDiff {
    /// Relative paths present locally only
    pub to_upload: Vec<String>,
    /// Relative paths present remotely only
    pub to_download: Vec<String>,
    pub local_count: usize,
    pub remote_count: usize,
}

impl SongDiff {
    pub fn is_empty(&self) -> bool {
        self.to_upload.is_empty() && self.to_download.is_empty()
    }
}

/// Compare two song directories by relative path.
///
/// A missing directory counts as empty. Paths use `/` separators.
pub async fn diff_songs(
    local_dir: &Path,
    remote_dir: &Path,
    extensions: &[String],
) -> Result<SongDiff> {
    let local_dir = local_dir.to_path_buf();
    let remote_dir = remote_dir.to_path_buf();
    let extensions = extensions.to_vec();

    tokio::task::spawn_blocking(move || {
        let local = relative_set(&local_dir, &extensions);
        let remote = relative_set(&remote_dir, &extensions);
        diff_song_sets(&local, &remote)
    })
    .await
    .map_err(|e| SyncError::Io(std::io::Error::other(e)))
}

/// Number of audio files under `dir`; a missing directory has none.
pub async fn count_songs(dir: &Path, extensions: &[String]) -> Result<usize> {
    let dir = dir.to_path_buf();
    let extensions = extensions.to_vec();
    tokio::task::spawn_blocking(move || relative_set(&dir, &extensions).len())
        .await
        .map_err(|e| SyncError::Io(std::io::Error::other(e)))
}

pub fn diff_song_sets(local: &BTreeSet<String>, remote: &BTreeSet<String>) -> SongDiff {
    SongDiff {
        to_upload: local.difference(remote).cloned().collect(),
        to_download: remote.difference(local).cloned().collect(),
        local_count: local.len(),
        remote_count: remote.len(),
    }
}

fn relative_set(root: &Path, extensions: &[String]) -> BTreeSet<String> {
    if !root.is_dir() {
        return BTreeSet::new();
    }
    scan_audio_files(root, extensions)
        .iter()
        .filter_map(|path| relative_key(root, path))
        .collect()
}

pub(crate) fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// Inverse of [`relative_key`].
pub(crate) fn resolve_key(root: &Path, key: &str) -> PathBuf {
    key.split('/')
        .filter(|part| !part.is_empty())
        .fold(root.to_path_buf(), |acc, part| acc.join(part))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playlists(entries: &[(&str, &[&str])]) -> Playlists {
        entries
            .iter()
            .map(|(name, tracks)| {
                (
                    name.to_string(),
                    tracks.iter().map(|t| t.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_road_trip_is_modified() {
        let local = playlists(&[("Road Trip", &["x", "y"])]);
        let remote = playlists(&[("Road Trip", &["x", "y", "z"])]);

        let diff = diff_playlists(&local, &remote);
        assert_eq!(diff.modified, vec!["Road Trip".to_string()]);
        assert_eq!(diff.decision_for("Road Trip"), Some(SyncDecision::Modified));
        assert!(!diff.is_in_sync());
    }

    #[test]
    fn test_order_matters() {
        let local = playlists(&[("Mix", &["a", "b"])]);
        let remote = playlists(&[("Mix", &["b", "a"])]);
        assert_eq!(diff_playlists(&local, &remote).modified.len(), 1);
    }

    #[test]
    fn test_partition_covers_union() {
        let local = playlists(&[("a", &["1"]), ("b", &["2"]), ("c", &[])]);
        let remote = playlists(&[("b", &["2"]), ("c", &["3"]), ("d", &[])]);

        let diff = diff_playlists(&local, &remote);
        assert_eq!(diff.missing_in_remote, vec!["a".to_string()]);
        assert_eq!(diff.missing_in_local, vec!["d".to_string()]);
        assert_eq!(diff.modified, vec!["c".to_string()]);
        assert_eq!(diff.in_sync_count(), 1);

        let union: BTreeSet<_> = local.keys().chain(remote.keys()).collect();
        assert_eq!(diff.decisions().len(), union.len());
        assert!(diff
            .missing_in_remote
            .iter()
            .all(|n| !diff.missing_in_local.contains(n)));
    }

    #[test]
    fn test_empty_sides() {
        let diff = diff_playlists(&Playlists::new(), &Playlists::new());
        assert!(diff.is_in_sync());
        assert!(diff.decisions().is_empty());
    }

    #[tokio::test]
    async fn test_song_diff_is_existence_only() {
        let local = tempfile::tempdir().unwrap();
        let remote = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(local.path().join("Album")).unwrap();
        std::fs::create_dir_all(remote.path().join("Album")).unwrap();

        std::fs::write(local.path().join("Album").join("same.mp3"), b"local bytes").unwrap();
        std::fs::write(remote.path().join("Album").join("same.mp3"), b"other bytes").unwrap();
        std::fs::write(local.path().join("Album").join("mine.mp3"), b"").unwrap();
        std::fs::write(remote.path().join("theirs.mp3"), b"").unwrap();
        std::fs::write(remote.path().join("notes.txt"), b"").unwrap();

        let exts = vec!["mp3".to_string()];
        let diff = diff_songs(local.path(), remote.path(), &exts).await.unwrap();
        assert_eq!(diff.to_upload, vec!["Album/mine.mp3".to_string()]);
        assert_eq!(diff.to_download, vec!["theirs.mp3".to_string()]);
        assert_eq!((diff.local_count, diff.remote_count), (2, 2));
    }

    #[tokio::test]
    async fn test_missing_remote_dir_uploads_everything() {
        let local = tempfile::tempdir().unwrap();
        std::fs::write(local.path().join("a.mp3"), b"").unwrap();

        let exts = vec!["mp3".to_string()];
        let diff = diff_songs(local.path(), &local.path().join("absent"), &exts)
            .await
            .unwrap();
        assert_eq!(diff.to_upload, vec!["a.mp3".to_string()]);
        assert!(diff.to_download.is_empty());
    }

    #[test]
    fn test_relative_key_round_trip() {
        let root = Path::new("/music");
        let key = relative_key(root, Path::new("/music/A/b.mp3")).unwrap();
        assert_eq!(key, "A/b.mp3");
        assert_eq!(resolve_key(root, &key), Path::new("/music/A/b.mp3"));
    }
}
