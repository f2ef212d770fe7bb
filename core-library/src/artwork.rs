//! # Artwork Cache
//!
//! Embedded cover art is decoded, converted to RGB and written as
//! `{cache_root}/cache/artwork/{stem}.jpg`. Records store the path relative to
//! the cache root with forward slashes, so the metadata document stays
//! portable between machines.
//!
//! Two audio files with the same stem share one artwork file. The indexer
//! checks for other references before removing one.

use bytes::Bytes;
use core_runtime::config::ARTWORK_RELATIVE_DIR;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::PathBuf;
use tracing::{debug, instrument};

use crate::document::write_bytes_atomic;
use crate::error::{LibraryError, Result};

pub struct ArtworkCache {
    cache_root: PathBuf,
}

impl ArtworkCache {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
        }
    }

    pub fn artwork_dir(&self) -> PathBuf {
        self.cache_root.join(ARTWORK_RELATIVE_DIR)
    }

    pub fn relative_path_for(stem: &str) -> String {
        format!("{ARTWORK_RELATIVE_DIR}/{stem}.jpg")
    }

    /// Absolute location of a stored relative reference.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.cache_root.clone(), |acc, part| acc.join(part))
    }

    /// Re-encode `data` as RGB JPEG for `stem` and return the relative reference.
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn store(&self, stem: &str, data: Bytes) -> Result<String> {
        if stem.is_empty() || stem.contains(['/', '\\']) || stem == ".." {
            return Err(LibraryError::invalid("stem", "invalid artwork name"));
        }

        let encoded = tokio::task::spawn_blocking(move || encode_rgb_jpeg(&data))
            .await
            .map_err(|e| LibraryError::ArtworkFailed(e.to_string()))??;

        let relative = Self::relative_path_for(stem);
        write_bytes_atomic(&self.resolve(&relative), &encoded).await?;
        debug!(artwork = %relative, "Artwork cached");
        Ok(relative)
    }

    /// Delete the file behind `relative`. Returns `false` if it was not there.
    pub async fn remove(&self, relative: &str) -> Result<bool> {
        let path = self.resolve(relative);
        if relative.split('/').any(|part| part == "..") || !path.starts_with(self.artwork_dir()) {
            return Err(LibraryError::invalid(
                "artwork",
                format!("{relative} is outside the artwork cache"),
            ));
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, relative: &str) -> bool {
        tokio::fs::try_exists(self.resolve(relative))
            .await
            .unwrap_or(false)
    }
}

fn encode_rgb_jpeg(data: &[u8]) -> Result<Vec<u8>> {
    let img = image::load_from_memory(data)
        .map_err(|e| LibraryError::ArtworkFailed(format!("Failed to load image: {e}")))?;
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

    let mut buffer = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)
        .map_err(|e| LibraryError::ArtworkFailed(format!("Failed to encode image: {e}")))?;
    Ok(buffer)
}
