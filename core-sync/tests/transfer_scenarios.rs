use async_trait::async_trait;
use bridge_desktop::{FileSecureStore, FolderRemoteStorage};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::{RemoteStorage, SystemClock};
use bytes::Bytes;
use core_auth::{AuthError, Credential, CredentialManager, CredentialRefresher, TokenStore};
use core_backup::RetentionManager;
use core_library::PlaylistStore;
use core_sync::{diff_playlists, SyncDecision, SyncError, TransferClient};
use mockall::{mock, Sequence};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

mock! {
    Remote {}

    #[async_trait]
    impl RemoteStorage for Remote {
        async fn fetch(&self, remote_path: &str, access_token: &str) -> BridgeResult<Option<Bytes>>;
        async fn put(&self, remote_path: &str, data: Bytes, access_token: &str) -> BridgeResult<()>;
    }
}

#[derive(Default)]
struct CountingRefresher {
    calls: AtomicUsize,
}

#[async_trait]
impl CredentialRefresher for CountingRefresher {
    async fn refresh_credential(
        &self,
        current: Option<Credential>,
    ) -> core_auth::Result<Credential> {
        current.ok_or(AuthError::NotAuthenticated)?;
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Credential::new(format!("fresh-{n}")).with_refresh_token("r"))
    }
}

fn expired() -> BridgeError {
    BridgeError::Remote {
        status: 401,
        message: "token expired".to_string(),
    }
}

struct Fixture {
    dir: TempDir,
    refresher: Arc<CountingRefresher>,
    credentials: Arc<CredentialManager>,
}

impl Fixture {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let refresher = Arc::new(CountingRefresher::default());
        let credentials = Arc::new(CredentialManager::new(
            TokenStore::new(Arc::new(FileSecureStore::new(dir.path().join("token_cache.json")))),
            refresher.clone(),
            Arc::new(SystemClock),
        ));
        credentials
            .sign_in(Credential::new("stale").with_refresh_token("r"))
            .await
            .unwrap();
        Self {
            dir,
            refresher,
            credentials,
        }
    }

    fn backups(&self) -> PathBuf {
        self.dir.path().join("backups")
    }

    fn client(&self, remote: impl RemoteStorage + 'static) -> TransferClient {
        TransferClient::new(
            Arc::new(remote),
            Arc::new(RetentionManager::new(self.backups(), Arc::new(SystemClock))),
        )
        .with_credentials(self.credentials.clone())
    }

    fn backup_names(&self) -> Vec<String> {
        match std::fs::read_dir(self.backups()) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    async fn playlists(&self, content: &[(&str, &[&str])]) -> PlaylistStore {
        let store = PlaylistStore::new(self.dir.path().join("playlists.json"));
        for (name, tracks) in content {
            store
                .save_playlist(name, tracks.iter().map(|t| t.to_string()).collect())
                .await
                .unwrap();
        }
        store
    }
}

#[tokio::test]
async fn test_upload_succeeds_after_one_refresh() {
    let fx = Fixture::new().await;
    let store = fx.playlists(&[("Road Trip", &["x", "y"])]).await;

    let mut remote = MockRemote::new();
    let mut seq = Sequence::new();
    remote
        .expect_put()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|path, _, token| path == "playlists.json" && token == "stale")
        .returning(|_, _, _| Err(expired()));
    remote
        .expect_put()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|_, data, token| token == "fresh-1" && !data.is_empty())
        .returning(|_, _, _| Ok(()));

    let receipt = fx
        .client(remote)
        .upload_playlists(&store, "playlists.json")
        .await
        .unwrap();

    assert!(receipt.refreshed);
    assert_eq!(fx.refresher.calls.load(Ordering::SeqCst), 1);
    let snapshot = receipt.snapshot.unwrap();
    assert!(snapshot.starts_with("playlists_backup_"));
    assert_eq!(fx.backup_names(), vec![snapshot]);
}

#[tokio::test]
async fn test_second_rejection_is_terminal() {
    let fx = Fixture::new().await;
    let store = fx.playlists(&[("Gym", &["a"])]).await;

    let mut remote = MockRemote::new();
    remote
        .expect_put()
        .times(2)
        .returning(|_, _, _| Err(expired()));

    let result = fx
        .client(remote)
        .upload_playlists(&store, "playlists.json")
        .await;

    assert!(matches!(result, Err(SyncError::TransferAuthExpired { .. })));
    assert_eq!(fx.refresher.calls.load(Ordering::SeqCst), 1);
    assert!(fx.backup_names().is_empty());
}

#[tokio::test]
async fn test_other_failures_are_not_retried() {
    let fx = Fixture::new().await;
    let store = fx.playlists(&[("Gym", &["a"])]).await;

    let mut remote = MockRemote::new();
    remote.expect_put().times(1).returning(|_, _, _| {
        Err(BridgeError::Remote {
            status: 500,
            message: "boom".to_string(),
        })
    });

    let result = fx
        .client(remote)
        .upload_playlists(&store, "playlists.json")
        .await;

    assert!(matches!(result, Err(SyncError::TransferFailed { .. })));
    assert_eq!(fx.refresher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_download_backs_up_local_playlists() {
    let fx = Fixture::new().await;
    let store = fx.playlists(&[("Road Trip", &["x", "y"])]).await;
    let local_before = store.all().await.unwrap();

    let mut remote = MockRemote::new();
    remote
        .expect_fetch()
        .times(1)
        .returning(|_, _| Ok(Some(Bytes::from_static(br#"{"Road Trip": ["x", "y", "z"]}"#))));

    let receipt = fx
        .client(remote)
        .download_playlists(&store, "playlists.json")
        .await
        .unwrap();

    let backup = receipt.backup.unwrap();
    assert!(backup.starts_with("playlist_local_backup_"));
    let backed_up: core_library::Playlists =
        serde_json::from_slice(&std::fs::read(fx.backups().join(&backup)).unwrap()).unwrap();
    assert_eq!(backed_up, local_before);

    let after = store.all().await.unwrap();
    let diff = diff_playlists(&local_before, &after);
    assert_eq!(diff.decision_for("Road Trip"), Some(SyncDecision::Modified));
    assert_eq!(after["Road Trip"].len(), 3);
}

#[tokio::test]
async fn test_invalid_remote_playlists_leave_local_alone() {
    let fx = Fixture::new().await;
    let store = fx.playlists(&[("Keep", &["k"])]).await;

    let mut remote = MockRemote::new();
    remote
        .expect_fetch()
        .times(1)
        .returning(|_, _| Ok(Some(Bytes::from_static(b"<html>oops</html>"))));

    let result = fx
        .client(remote)
        .download_playlists(&store, "playlists.json")
        .await;

    assert!(matches!(result, Err(SyncError::TransferFailed { .. })));
    assert_eq!(store.names().await.unwrap(), vec!["Keep".to_string()]);
    assert!(fx.backup_names().is_empty());
}

#[tokio::test]
async fn test_missing_remote_object() {
    let fx = Fixture::new().await;
    let mut remote = MockRemote::new();
    remote.expect_fetch().times(1).returning(|_, _| Ok(None));

    let client = fx.client(remote);
    assert!(matches!(
        client.download("playlists.json", &fx.dir.path().join("p.json"), "playlist_local").await,
        Err(SyncError::NotFound(_))
    ));
}

struct StalledRemote;

#[async_trait]
impl RemoteStorage for StalledRemote {
    async fn fetch(&self, _remote_path: &str, _access_token: &str) -> BridgeResult<Option<Bytes>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(None)
    }

    async fn put(&self, _remote_path: &str, _data: Bytes, _access_token: &str) -> BridgeResult<()> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }
}

#[tokio::test]
async fn test_stalled_remote_times_out() {
    let fx = Fixture::new().await;
    let client = fx.client(StalledRemote).with_timeout(Duration::from_millis(50));

    let result = client.fetch("playlists.json").await;
    assert!(matches!(result, Err(SyncError::Timeout { .. })));
}

#[tokio::test]
async fn test_folder_remote_needs_no_credential() {
    let dir = tempfile::tempdir().unwrap();
    let cloud = dir.path().join("cloud");
    let local = dir.path().join("metadata.json");
    std::fs::write(&local, b"{}").unwrap();

    let client = TransferClient::new(
        Arc::new(FolderRemoteStorage::new(&cloud)),
        Arc::new(RetentionManager::new(dir.path().join("backups"), Arc::new(SystemClock))),
    );
    let receipt = client
        .upload(&local, "music_metadata.json", "metadata")
        .await
        .unwrap();

    assert!(!receipt.refreshed);
    assert_eq!(std::fs::read(cloud.join("music_metadata.json")).unwrap(), b"{}");
    assert!(receipt.snapshot.is_some());
}

#[tokio::test]
async fn test_authenticated_remote_without_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let mut remote = MockRemote::new();
    remote.expect_fetch().times(0);

    let client = TransferClient::new(
        Arc::new(remote),
        Arc::new(RetentionManager::new(dir.path(), Arc::new(SystemClock))),
    );
    assert!(matches!(
        client.fetch("playlists.json").await,
        Err(SyncError::Auth(AuthError::NotAuthenticated))
    ));
}
