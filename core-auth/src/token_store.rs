//! Credential persistence over a [`SecureStore`].
//!
//! The credential is stored as JSON under a single key. A value that no
//! longer parses is deleted on read so the next sign-in starts clean.

use bridge_traits::SecureStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{AuthError, Result};
use crate::types::Credential;

pub const CREDENTIAL_KEY: &str = "remote_credential";

pub struct TokenStore {
    secure_store: Arc<dyn SecureStore>,
    key: String,
}

impl TokenStore {
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        Self {
            secure_store,
            key: CREDENTIAL_KEY.to_string(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub async fn save(&self, credential: &Credential) -> Result<()> {
        let json = serde_json::to_vec(credential)
            .map_err(|e| AuthError::TokenCorrupted(e.to_string()))?;
        self.secure_store
            .set_secret(&self.key, &json)
            .await
            .map_err(|e| AuthError::SecureStorageUnavailable(e.to_string()))?;

        info!(
            has_refresh_token = credential.refresh_token.is_some(),
            "Credential stored"
        );
        Ok(())
    }

    /// Cached credential, or `None` when nothing usable is stored.
    pub async fn load(&self) -> Result<Option<Credential>> {
        let data = self
            .secure_store
            .get_secret(&self.key)
            .await
            .map_err(|e| AuthError::SecureStorageUnavailable(e.to_string()))?;

        let Some(data) = data else {
            debug!("No cached credential");
            return Ok(None);
        };

        match serde_json::from_slice::<Credential>(&data) {
            Ok(credential) => Ok(Some(credential)),
            Err(e) => {
                warn!(error = %e, "Cached credential is corrupted, discarding");
                if let Err(delete_err) = self.secure_store.delete_secret(&self.key).await {
                    warn!(error = %delete_err, "Failed to discard corrupted credential");
                }
                Ok(None)
            }
        }
    }

    pub async fn clear(&self) -> Result<()> {
        self.secure_store
            .delete_secret(&self.key)
            .await
            .map_err(|e| AuthError::SecureStorageUnavailable(e.to_string()))
    }
}
