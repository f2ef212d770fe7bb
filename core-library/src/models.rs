//! Library domain models
//!
//! The on-disk shapes here are part of the data format shared with earlier
//! installs, so field names and string-typed values are fixed.

use bridge_traits::tags::TrackTags;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Tag fields for one audio file, keyed in the store by absolute path.
///
/// Every field is a string; absent tags are stored as `""`. `artwork` is a
/// path relative to the cache root (`cache/artwork/{stem}.jpg`) or empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackRecord {
    pub title: String,
    pub album_artist: String,
    pub album: String,
    pub publisher: String,
    pub disc_number: String,
    pub track_number: String,
    pub total_discs: String,
    pub year: String,
    pub genre: String,
    pub composer: String,
    pub artwork: String,
}

impl TrackRecord {
    /// Record for a file whose tags could not be read.
    pub fn stem_only(path: &Path) -> Self {
        Self {
            title: file_stem(path),
            ..Default::default()
        }
    }

    /// Build a record from extracted tags. The title falls back to the file
    /// stem when the tag is missing or blank. Artwork is attached separately.
    pub fn from_tags(path: &Path, tags: &TrackTags) -> Self {
        let field = |value: &Option<String>| value.clone().unwrap_or_default();
        let title = tags
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| file_stem(path));

        Self {
            title,
            album_artist: field(&tags.album_artist),
            album: field(&tags.album),
            publisher: field(&tags.publisher),
            disc_number: field(&tags.disc_number),
            track_number: field(&tags.track_number),
            total_discs: field(&tags.total_discs),
            year: field(&tags.year),
            genre: field(&tags.genre),
            composer: field(&tags.composer),
            artwork: String::new(),
        }
    }

    pub fn has_artwork(&self) -> bool {
        !self.artwork.is_empty()
    }
}

/// Absolute path → record.
pub type MetadataMap = BTreeMap<String, TrackRecord>;

/// Playlist name → ordered track paths.
pub type Playlists = BTreeMap<String, Vec<String>>;

/// One row of the library browser cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub path: String,
    /// `"{parent folder} - {file name}"`
    pub display: String,
}

impl LibraryEntry {
    pub fn for_path(path: &Path) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parent = path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            path: path.to_string_lossy().into_owned(),
            display: format!("{parent} - {file_name}"),
        }
    }
}

/// Counts reported by a rebuild pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildSummary {
    /// Records in the store after the pass
    pub total: usize,
    pub new_count: usize,
    pub removed_count: usize,
    /// New files indexed with a filename-only record
    pub unreadable_count: usize,
    /// The pass stopped early; the store holds the files processed so far
    pub cancelled: bool,
}

pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
