//! Credential Storage Abstraction
//!
//! Provides a platform-agnostic trait for persisting the remote credential
//! between runs so a cached token can be reused silently.

use async_trait::async_trait;

use crate::error::Result;

/// Secret storage trait
///
/// Backends range from an OS keychain to a plain token cache file in the
/// user's local application directory. Implementations must never log secret
/// values.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SecureStore;
///
/// async fn store_token(store: &dyn SecureStore, token: &str) -> Result<()> {
///     store.set_secret("remote_credential", token.as_bytes()).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Store a secret value, replacing any previous value under `key`
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Retrieve a secret value
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a secret. Deleting a missing key succeeds.
    async fn delete_secret(&self, key: &str) -> Result<()>;

    /// Check if a secret exists without handing out its value
    async fn has_secret(&self, key: &str) -> Result<bool> {
        Ok(self.get_secret(key).await?.is_some())
    }
}
