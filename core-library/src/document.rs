//! JSON document persistence shared by the library stores.
//!
//! Reads never fail on content: a missing or unparsable document is reported
//! through [`LoadOutcome`] and the caller starts from the default value.
//! Writes go to a sibling `.tmp` file which is then renamed over the target,
//! so a crash mid-write leaves the previous document intact.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

use crate::error::{LibraryError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome<T> {
    Loaded(T),
    Missing,
    Corrupt(String),
}

impl<T: Default> LoadOutcome<T> {
    pub fn into_value(self) -> T {
        match self {
            LoadOutcome::Loaded(value) => value,
            LoadOutcome::Missing | LoadOutcome::Corrupt(_) => T::default(),
        }
    }
}

pub async fn read_document<T: DeserializeOwned>(path: &Path) -> Result<LoadOutcome<T>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LoadOutcome::Missing),
        Err(e) => return Err(LibraryError::store_io(path, e)),
    };

    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(LoadOutcome::Loaded(value)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Document is corrupt, starting empty");
            Ok(LoadOutcome::Corrupt(e.to_string()))
        }
    }
}

pub async fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    write_bytes_atomic(path, &json).await
}

pub async fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| LibraryError::store_io(parent, e))?;
    }

    let tmp = tmp_path(path);
    fs::write(&tmp, bytes)
        .await
        .map_err(|e| LibraryError::store_io(&tmp, e))?;
    if let Err(e) = fs::rename(&tmp, path).await {
        fs::remove_file(&tmp).await.ok();
        return Err(LibraryError::store_io(path, e));
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
