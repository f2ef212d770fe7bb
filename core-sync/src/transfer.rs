//! # Transfer Client
//!
//! Upload and download of whole artifacts through a [`RemoteStorage`].
//!
//! ## Credential handling
//!
//! Each call uses the credential manager's current token. If the remote
//! answers with an auth-expired status, the token is refreshed once and the
//! call is repeated once; a second rejection is returned as
//! [`SyncError::TransferAuthExpired`]. Every remote call is bounded by the
//! configured timeout.
//!
//! ## Local backups
//!
//! - A successful upload snapshots the uploaded file into the local backup
//!   directory, so each push advances the local backup chain.
//! - A download snapshots the file it is about to overwrite.

use bridge_traits::error::Result as BridgeResult;
use bridge_traits::RemoteStorage;
use bytes::Bytes;
use core_auth::{AuthError, CredentialManager};
use core_backup::{prefixes, RetentionManager};
use core_library::document::write_bytes_atomic;
use core_library::{PlaylistStore, Playlists};
use core_runtime::config::{RetentionPolicy, DEFAULT_REMOTE_TIMEOUT};
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, SyncError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub remote_path: String,
    pub bytes: u64,
    /// Local snapshot taken after the push, if it could be written
    pub snapshot: Option<String>,
    /// The credential had to be refreshed for this call
    pub refreshed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReceipt {
    pub remote_path: String,
    pub bytes: u64,
    /// Snapshot of the local file that was replaced
    pub backup: Option<String>,
    pub refreshed: bool,
}

struct Attempt<T> {
    value: T,
    refreshed: bool,
}

pub struct TransferClient {
    remote: Arc<dyn RemoteStorage>,
    credentials: Option<Arc<CredentialManager>>,
    retention: Arc<RetentionManager>,
    local_keep: usize,
    timeout: Duration,
    event_bus: Option<EventBus>,
}

impl TransferClient {
    pub fn new(remote: Arc<dyn RemoteStorage>, retention: Arc<RetentionManager>) -> Self {
        Self {
            remote,
            credentials: None,
            retention,
            local_keep: RetentionPolicy::default().local_keep,
            timeout: DEFAULT_REMOTE_TIMEOUT,
            event_bus: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Arc<CredentialManager>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_local_keep(mut self, keep: usize) -> Self {
        self.local_keep = keep;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn remote_name(&self) -> &str {
        self.remote.name()
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Sync(event)).ok();
        }
    }

    /// Push the file at `local` to `remote_path`, then snapshot it locally
    /// under `backup_prefix`.
    #[instrument(skip(self), fields(remote = %self.remote.name()))]
    pub async fn upload(
        &self,
        local: &Path,
        remote_path: &str,
        backup_prefix: &str,
    ) -> Result<UploadReceipt> {
        let data = match tokio::fs::read(local).await {
            Ok(data) => Bytes::from(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SyncError::NotFound(local.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let bytes = data.len() as u64;

        let remote = Arc::clone(&self.remote);
        let attempt = self
            .call_with_refresh(remote_path, |token| {
                let remote = Arc::clone(&remote);
                let data = data.clone();
                async move { remote.put(remote_path, data, &token).await }
            })
            .await?;

        let snapshot = self
            .retention
            .snapshot_and_enforce(local, backup_prefix, self.local_keep)
            .await
            .map(|s| s.name);

        info!(remote_path, bytes, refreshed = attempt.refreshed, "Upload completed");
        self.emit(SyncEvent::Uploaded {
            remote_path: remote_path.to_string(),
            bytes,
        });

        Ok(UploadReceipt {
            remote_path: remote_path.to_string(),
            bytes,
            snapshot,
            refreshed: attempt.refreshed,
        })
    }

    /// Content stored at `remote_path`, with whether a refresh was needed.
    pub async fn fetch(&self, remote_path: &str) -> Result<(Bytes, bool)> {
        let remote = Arc::clone(&self.remote);
        let attempt = self
            .call_with_refresh(remote_path, |token| {
                let remote = Arc::clone(&remote);
                async move { remote.fetch(remote_path, &token).await }
            })
            .await?;

        match attempt.value {
            Some(data) => Ok((data, attempt.refreshed)),
            None => Err(SyncError::NotFound(remote_path.to_string())),
        }
    }

    /// Replace `local` with the content of `remote_path`. The current local
    /// file is snapshotted under `backup_prefix` first.
    #[instrument(skip(self), fields(remote = %self.remote.name()))]
    pub async fn download(
        &self,
        remote_path: &str,
        local: &Path,
        backup_prefix: &str,
    ) -> Result<DownloadReceipt> {
        let (data, refreshed) = self.fetch(remote_path).await?;
        self.install(remote_path, local, backup_prefix, &data, refreshed)
            .await
    }

    async fn install(
        &self,
        remote_path: &str,
        local: &Path,
        backup_prefix: &str,
        data: &[u8],
        refreshed: bool,
    ) -> Result<DownloadReceipt> {
        let backup = self
            .retention
            .snapshot_and_enforce(local, backup_prefix, self.local_keep)
            .await
            .map(|s| s.name);
        write_bytes_atomic(local, data).await?;

        let bytes = data.len() as u64;
        info!(remote_path, bytes, backup = ?backup, "Download installed");
        self.emit(SyncEvent::Downloaded {
            remote_path: remote_path.to_string(),
            bytes,
        });

        Ok(DownloadReceipt {
            remote_path: remote_path.to_string(),
            bytes,
            backup,
            refreshed,
        })
    }

    /// Upload the playlist document while holding the store lock.
    pub async fn upload_playlists(
        &self,
        store: &PlaylistStore,
        remote_path: &str,
    ) -> Result<UploadReceipt> {
        let _guard = store.exclusive().await;
        self.upload(store.path(), remote_path, prefixes::PLAYLISTS)
            .await
    }

    /// Replace the local playlist document with the remote one.
    ///
    /// The remote content must parse as a playlist document; otherwise the
    /// local file is left untouched.
    pub async fn download_playlists(
        &self,
        store: &PlaylistStore,
        remote_path: &str,
    ) -> Result<DownloadReceipt> {
        let (data, refreshed) = self.fetch(remote_path).await?;
        parse_playlists(remote_path, &data)?;

        let _guard = store.exclusive().await;
        let backup = self
            .retention
            .snapshot_and_enforce(store.path(), prefixes::PLAYLIST_LOCAL, self.local_keep)
            .await
            .map(|s| s.name);
        store.replace_raw_locked(&data).await?;

        let bytes = data.len() as u64;
        info!(remote_path, bytes, backup = ?backup, "Playlists downloaded");
        self.emit(SyncEvent::Downloaded {
            remote_path: remote_path.to_string(),
            bytes,
        });

        Ok(DownloadReceipt {
            remote_path: remote_path.to_string(),
            bytes,
            backup,
            refreshed,
        })
    }

    /// Remote playlist document, or `None` if the remote has none yet.
    pub async fn fetch_playlists(&self, remote_path: &str) -> Result<Option<Playlists>> {
        match self.fetch(remote_path).await {
            Ok((data, _)) => parse_playlists(remote_path, &data).map(Some),
            Err(SyncError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn current_token(&self) -> Result<String> {
        if !self.remote.requires_auth() {
            return Ok(String::new());
        }
        match &self.credentials {
            Some(credentials) => Ok(credentials.access_token().await?),
            None => Err(AuthError::NotAuthenticated.into()),
        }
    }

    async fn timed<T>(&self, path: &str, call: impl Future<Output = T>) -> Result<T> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| {
                warn!(path, timeout_secs = self.timeout.as_secs(), "Remote call timed out");
                SyncError::Timeout {
                    path: path.to_string(),
                    seconds: self.timeout.as_secs(),
                }
            })
    }

    /// Run `op` with the current token; on auth expiry refresh once and rerun.
    async fn call_with_refresh<T, F, Fut>(&self, path: &str, op: F) -> Result<Attempt<T>>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = BridgeResult<T>>,
    {
        let token = self.current_token().await?;
        match self.timed(path, op(token.clone())).await? {
            Ok(value) => {
                return Ok(Attempt {
                    value,
                    refreshed: false,
                })
            }
            Err(e) if e.is_auth_expired() && self.remote.requires_auth() => {
                debug!(path, "Credential rejected, refreshing once");
            }
            Err(e) => return Err(SyncError::from_bridge(path, e)),
        }

        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| SyncError::TransferAuthExpired {
                path: path.to_string(),
            })?;
        let fresh = credentials.refresh_rejected(&token).await?;

        match self.timed(path, op(fresh)).await? {
            Ok(value) => Ok(Attempt {
                value,
                refreshed: true,
            }),
            Err(e) => {
                warn!(path, error = %e, "Retry after refresh failed");
                Err(SyncError::from_bridge(path, e))
            }
        }
    }
}

fn parse_playlists(remote_path: &str, data: &[u8]) -> Result<Playlists> {
    serde_json::from_slice(data).map_err(|e| SyncError::TransferFailed {
        path: remote_path.to_string(),
        reason: format!("invalid playlist document: {e}"),
    })
}
