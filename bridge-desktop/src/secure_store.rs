//! Credential Storage in a Local Token Cache File

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SecureStore,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// File-backed secret storage
///
/// Keeps every secret in one JSON object (`key -> value`) inside the user's
/// local application directory. Values must be UTF-8. A missing or corrupt
/// cache file reads as empty so the user is simply asked to sign in again.
pub struct FileSecureStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSecureStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>> {
        match fs::read(&self.path).await {
            Ok(raw) => Ok(serde_json::from_slice(&raw).unwrap_or_else(|e| {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Token cache is corrupt, ignoring it"
                );
                BTreeMap::new()
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let raw = serde_json::to_vec_pretty(entries).map_err(|e| {
            BridgeError::OperationFailed(format!("Token cache encoding failed: {}", e))
        })?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl SecureStore for FileSecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        let value = String::from_utf8(value.to_vec())
            .map_err(|_| BridgeError::OperationFailed("Secret is not valid UTF-8".to_string()))?;

        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        entries.insert(key.to_string(), value);
        self.write_all(&entries).await?;

        debug!(key = key, "Stored secret in token cache");
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let _guard = self.lock.lock().await;
        let entries = self.read_all().await?;
        Ok(entries.get(key).map(|value| value.as_bytes().to_vec()))
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        if entries.remove(key).is_some() {
            self.write_all(&entries).await?;
            debug!(key = key, "Deleted secret from token cache");
        }
        Ok(())
    }
}
