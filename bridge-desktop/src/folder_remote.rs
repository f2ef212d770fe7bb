//! Remote storage backed by a locally synced cloud folder

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    remote::RemoteStorage,
};
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// `RemoteStorage` over a directory that a desktop sync client mirrors to the
/// cloud. The access token is ignored; the sync client owns authentication.
pub struct FolderRemoteStorage {
    root: PathBuf,
}

impl FolderRemoteStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `remote_path` under the root, refusing anything that escapes it.
    fn resolve(&self, remote_path: &str) -> Result<PathBuf> {
        let relative = Path::new(remote_path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if remote_path.is_empty() || escapes {
            return Err(BridgeError::OperationFailed(format!(
                "Invalid remote path: {}",
                remote_path
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl RemoteStorage for FolderRemoteStorage {
    async fn fetch(&self, remote_path: &str, _access_token: &str) -> Result<Option<Bytes>> {
        let path = self.resolve(remote_path)?;
        match fs::read(&path).await {
            Ok(data) => {
                debug!(path = %path.display(), bytes = data.len(), "Fetched from cloud folder");
                Ok(Some(Bytes::from(data)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, remote_path: &str, data: Bytes, _access_token: &str) -> Result<()> {
        let path = self.resolve(remote_path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, &data).await?;
        debug!(path = %path.display(), bytes = data.len(), "Stored in cloud folder");
        Ok(())
    }

    fn name(&self) -> &str {
        "cloud-folder"
    }

    fn requires_auth(&self) -> bool {
        false
    }
}
