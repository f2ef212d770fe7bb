//! Remote Storage Abstraction
//!
//! The sync engine treats the cloud side as an opaque object store addressed by
//! relative paths. Vendor wire protocols live behind this trait.
//!
//! ## Contract
//!
//! - `fetch` returns `Ok(None)` when the object does not exist
//! - `put` returns `Ok(())` once the remote acknowledged the write
//! - Any rejected call maps to [`BridgeError::Remote`](crate::error::BridgeError::Remote)
//!   carrying the remote status code; `401` means the credential expired

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Object storage on the remote side of a sync.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::remote::RemoteStorage;
///
/// async fn push(remote: &dyn RemoteStorage, token: &str, data: Bytes) -> Result<()> {
///     remote.put("playlists.json", data, token).await
/// }
/// ```
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    /// Download the object stored at `remote_path`.
    ///
    /// Returns `Ok(None)` when nothing is stored there.
    async fn fetch(&self, remote_path: &str, access_token: &str) -> Result<Option<Bytes>>;

    /// Store `data` at `remote_path`, replacing any previous content.
    async fn put(&self, remote_path: &str, data: Bytes, access_token: &str) -> Result<()>;

    /// Human-readable name used in logs.
    fn name(&self) -> &str {
        "remote"
    }

    /// Whether calls need a valid access token. Remotes that authenticate out
    /// of band receive an empty token.
    fn requires_auth(&self) -> bool {
        true
    }
}
