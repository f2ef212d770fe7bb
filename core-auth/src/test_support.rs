use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::SecureStore;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Default)]
pub(crate) struct MemoryStore {
    secrets: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl SecureStore for MemoryStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
        self.secrets
            .lock()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
        Ok(self.secrets.lock().await.get(key).cloned())
    }

    async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
        self.secrets.lock().await.remove(key);
        Ok(())
    }
}
