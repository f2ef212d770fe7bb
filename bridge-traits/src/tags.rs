//! Audio Tag Reading Abstraction
//!
//! The library indexer never parses audio containers itself. It asks a
//! [`TagReader`] for the text fields and embedded cover art of a file and
//! degrades to a filename-derived record when the reader reports the file as
//! unreadable.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;

use crate::error::Result;

/// Embedded cover image as found in the file's tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedArtwork {
    /// Raw image bytes (JPEG, PNG, ...)
    pub data: Bytes,
    /// MIME type reported by the tag, if any
    pub mime_type: Option<String>,
}

/// Text tag fields extracted from one audio file.
///
/// Every field is optional; a missing field is stored as an empty string by
/// the library layer, except `title` which falls back to the file stem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackTags {
    pub title: Option<String>,
    pub album_artist: Option<String>,
    pub album: Option<String>,
    pub publisher: Option<String>,
    pub disc_number: Option<String>,
    pub track_number: Option<String>,
    pub total_discs: Option<String>,
    pub year: Option<String>,
    pub genre: Option<String>,
    pub composer: Option<String>,
    /// First usable embedded picture
    pub artwork: Option<EmbeddedArtwork>,
}

impl TrackTags {
    /// True when no text field carries a value.
    pub fn is_empty(&self) -> bool {
        [
            &self.title,
            &self.album_artist,
            &self.album,
            &self.publisher,
            &self.disc_number,
            &self.track_number,
            &self.total_discs,
            &self.year,
            &self.genre,
            &self.composer,
        ]
        .iter()
        .all(|field| field.as_deref().map_or(true, str::is_empty))
    }
}

/// Tag extraction capability.
///
/// Implementations must return [`BridgeError::Unreadable`](crate::error::BridgeError::Unreadable)
/// when the file exists but its tags cannot be parsed, so callers can tell a
/// degraded file apart from an I/O failure.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::tags::TagReader;
///
/// async fn title_of(reader: &dyn TagReader, path: &Path) -> Option<String> {
///     reader.read_tags(path).await.ok().and_then(|tags| tags.title)
/// }
/// ```
#[async_trait]
pub trait TagReader: Send + Sync {
    /// Read the tag fields and embedded artwork of `path`.
    async fn read_tags(&self, path: &Path) -> Result<TrackTags>;
}
