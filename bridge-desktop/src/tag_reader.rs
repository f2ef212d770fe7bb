//! Tag Reader using Lofty
//!
//! Reads ID3v2, Vorbis Comments, MP4 atoms and RIFF INFO through `lofty`.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    tags::{EmbeddedArtwork, TagReader, TrackTags},
};
use bytes::Bytes;
use lofty::config::ParseOptions;
use lofty::file::TaggedFileExt;
use lofty::picture::MimeType;
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag};
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

/// `TagReader` backed by the `lofty` crate.
pub struct LoftyTagReader {
    parse_options: ParseOptions,
}

impl LoftyTagReader {
    pub fn new() -> Self {
        Self {
            parse_options: ParseOptions::new(),
        }
    }

    pub fn with_options(parse_options: ParseOptions) -> Self {
        Self { parse_options }
    }

    fn unreadable(path: &Path, reason: impl ToString) -> BridgeError {
        BridgeError::Unreadable {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    fn tags_from(tag: &Tag) -> TrackTags {
        let text = |key: &ItemKey| tag.get_string(key).map(normalize_text);

        TrackTags {
            title: tag.title().map(|s| normalize_text(s.as_ref())),
            album_artist: text(&ItemKey::AlbumArtist),
            album: tag.album().map(|s| normalize_text(s.as_ref())),
            publisher: text(&ItemKey::Publisher).or_else(|| text(&ItemKey::Label)),
            disc_number: tag.disk().map(|n| n.to_string()),
            track_number: tag.track().map(|n| n.to_string()),
            total_discs: tag.disk_total().map(|n| n.to_string()),
            year: text(&ItemKey::RecordingDate)
                .or_else(|| text(&ItemKey::Year))
                .or_else(|| tag.year().map(|y| y.to_string())),
            genre: tag.genre().map(|s| normalize_text(s.as_ref())),
            composer: text(&ItemKey::Composer),
            artwork: first_artwork(tag),
        }
    }

    fn parse(path: &Path, file_data: Vec<u8>, parse_options: ParseOptions) -> Result<TrackTags> {
        let tagged_file = Probe::new(std::io::Cursor::new(file_data))
            .options(parse_options)
            .guess_file_type()
            .map_err(|e| Self::unreadable(path, e))?
            .read()
            .map_err(|e| Self::unreadable(path, e))?;

        let tag = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag());

        match tag {
            Some(tag) => Ok(Self::tags_from(tag)),
            None => {
                warn!(path = %path.display(), "No tags found");
                Ok(TrackTags::default())
            }
        }
    }
}

impl Default for LoftyTagReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TagReader for LoftyTagReader {
    async fn read_tags(&self, path: &Path) -> Result<TrackTags> {
        debug!(path = %path.display(), "Reading tags");

        let file_data = fs::read(path).await?;
        let parse_options = self.parse_options;
        let owned_path = path.to_path_buf();

        // Parsing walks the whole buffer, keep it off the async workers
        tokio::task::spawn_blocking(move || {
            LoftyTagReader::parse(&owned_path, file_data, parse_options)
        })
        .await
        .map_err(|e| BridgeError::OperationFailed(format!("tag parse task: {e}")))?
    }
}

/// Trims and collapses whitespace, drops control characters.
fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| !c.is_control())
        .collect()
}

fn first_artwork(tag: &Tag) -> Option<EmbeddedArtwork> {
    tag.pictures()
        .iter()
        .find(|pic| !pic.data().is_empty())
        .map(|pic| EmbeddedArtwork {
            data: Bytes::copy_from_slice(pic.data()),
            mime_type: pic.mime_type().and_then(mime_type_to_string),
        })
}

fn mime_type_to_string(mime_type: &MimeType) -> Option<String> {
    let mime = match mime_type {
        MimeType::Png => "image/png",
        MimeType::Jpeg => "image/jpeg",
        MimeType::Tiff => "image/tiff",
        MimeType::Bmp => "image/bmp",
        MimeType::Gif => "image/gif",
        _ => return None,
    };
    Some(mime.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Blue   in Green "), "Blue in Green");
        assert_eq!(normalize_text("So\u{0}What"), "SoWhat");
    }

    #[test]
    fn test_mime_type_to_string() {
        assert_eq!(
            mime_type_to_string(&MimeType::Jpeg),
            Some("image/jpeg".to_string())
        );
        assert_eq!(
            mime_type_to_string(&MimeType::Png),
            Some("image/png".to_string())
        );
    }

    #[test]
    fn test_tags_from_lofty_tag() {
        use lofty::tag::TagType;

        let mut tag = Tag::new(TagType::Id3v2);
        tag.set_title("Kind of Blue".to_string());
        tag.set_album("Sessions".to_string());
        tag.set_genre("Jazz".to_string());
        tag.insert_text(ItemKey::AlbumArtist, "Miles Davis".to_string());
        tag.insert_text(ItemKey::Composer, "Bill Evans".to_string());

        let tags = LoftyTagReader::tags_from(&tag);
        assert_eq!(tags.title.as_deref(), Some("Kind of Blue"));
        assert_eq!(tags.album.as_deref(), Some("Sessions"));
        assert_eq!(tags.genre.as_deref(), Some("Jazz"));
        assert_eq!(tags.album_artist.as_deref(), Some("Miles Davis"));
        assert_eq!(tags.composer.as_deref(), Some("Bill Evans"));
        assert!(tags.artwork.is_none());
    }

    #[tokio::test]
    async fn test_garbage_file_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.mp3");
        std::fs::write(&path, b"definitely not audio").unwrap();

        let err = LoftyTagReader::new().read_tags(&path).await.unwrap_err();
        assert!(matches!(err, BridgeError::Unreadable { .. }));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = LoftyTagReader::new()
            .read_tags(&dir.path().join("gone.flac"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Io(_)));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_concurrent_reads_on_single_worker() {
        let dir = tempfile::tempdir().unwrap();
        let reader = std::sync::Arc::new(LoftyTagReader::new());
        let mut tasks = Vec::new();
        for i in 0..4 {
            let path = dir.path().join(format!("broken{i}.flac"));
            std::fs::write(&path, vec![0u8; 64 * 1024]).unwrap();
            let reader = reader.clone();
            tasks.push(tokio::spawn(async move { reader.read_tags(&path).await }));
        }

        for task in tasks {
            let err = task.await.unwrap().unwrap_err();
            assert!(matches!(err, BridgeError::Unreadable { .. }));
        }
    }
}
