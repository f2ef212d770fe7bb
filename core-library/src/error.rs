use bridge_traits::error::BridgeError;
use core_backup::BackupError;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Cannot access store {path}: {source}")]
    StoreIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Store {path} is corrupt: {reason}")]
    StoreCorrupt { path: String, reason: String },

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unreadable file {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("Artwork processing failed: {0}")]
    ArtworkFailed(String),

    #[error("Playlist not found: {0}")]
    PlaylistNotFound(String),

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LibraryError {
    pub(crate) fn store_io(path: &Path, source: std::io::Error) -> Self {
        LibraryError::StoreIo {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        LibraryError::InvalidInput {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
