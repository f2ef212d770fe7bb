//! Core service façade.
//!
//! [`CoreService`] wires a [`CoreConfig`] into the engine's components:
//! the metadata indexer and stores from `core-library`, the local and cloud
//! retention managers from `core-backup`, the credential manager from
//! `core-auth`, and the transfer client and song syncer from `core-sync`.
//!
//! Quick operations are plain async methods. Long ones also have a `spawn_*`
//! variant that runs on the tokio runtime and returns a [`JobHandle`]; job
//! lifecycle is published on the event bus as [`SyncEvent`]s.
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::CoreService;
//!
//! let config = CoreConfig::builder()
//!     .music_dir("/home/me/Music")
//!     .data_dir("/home/me/.local/share/MusicPlayer")
//!     .cache_dir("/home/me/.cache/MusicPlayer")
//!     .cloud_dir("/home/me/OneDrive/MusicPlayerData")
//!     .build()?;
//! let core = CoreService::new(config)?;
//!
//! let job = core.spawn_rebuild();
//! let summary = job.wait().await?;
//! core.backup_to_cloud().await?;
//! ```

pub mod cloud_backup;
pub mod error;
pub mod job;

pub use cloud_backup::CloudBackupReport;
pub use error::{CoreError, Result};
pub use job::{JobHandle, JobId, JobKind, JobOutcome};

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use bridge_traits::RemoteStorage;
use core_auth::{Credential, CredentialManager, CredentialState, OAuthRefresher, TokenStore};
use core_backup::{prefixes, CleanupReport, RetentionManager};
use core_library::{
    ArtworkCache, LibraryCache, LibraryEntry, MetadataIndexer, MetadataMap, MetadataStore,
    PlaylistStore, RebuildSummary,
};
use core_runtime::config::{CoreConfig, PLAYLISTS_FILE_NAME};
use core_runtime::events::{CoreEvent, EventBus, EventStream, SyncEvent};
use core_sync::{
    compute_status, DownloadReceipt, HttpRemoteStorage, SongSyncReport, SongSyncer,
    StatusSources, SyncStatus, TransferClient, UploadReceipt,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, instrument, warn, Instrument};

/// Remote object name of the playlist document.
pub const REMOTE_PLAYLISTS_PATH: &str = PLAYLISTS_FILE_NAME;
/// Folder under `cloud_dir` that mirrors the music folder.
pub const REMOTE_MUSIC_DIR_NAME: &str = "Music";

struct ServiceInner {
    config: CoreConfig,
    event_bus: EventBus,
    metadata: Arc<MetadataStore>,
    playlists: Arc<PlaylistStore>,
    library_cache: LibraryCache,
    indexer: MetadataIndexer,
    local_backups: Arc<RetentionManager>,
    cloud_backups: Option<RetentionManager>,
    credentials: Option<Arc<CredentialManager>>,
    transfer: Option<TransferClient>,
}

/// Primary façade exposed to host applications. Cheap to clone.
#[derive(Clone)]
pub struct CoreService {
    inner: Arc<ServiceInner>,
}

impl CoreService {
    /// Validate `config`, create its directories and assemble the engine.
    pub fn new(config: CoreConfig) -> Result<Self> {
        config.validate()?;
        config.ensure_directories()?;

        let event_bus = EventBus::new(config.event_buffer_size);
        let clock = Arc::clone(&config.clock);

        let local_backups = Arc::new(
            RetentionManager::new(config.backup_dir(), Arc::clone(&clock))
                .with_event_bus(event_bus.clone()),
        );
        let cloud_backups = config.cloud_dir.as_ref().map(|dir| {
            RetentionManager::new(dir.clone(), Arc::clone(&clock)).with_event_bus(event_bus.clone())
        });

        let metadata = Arc::new(MetadataStore::new(config.metadata_file()));
        let playlists =
            Arc::new(PlaylistStore::new(config.playlists_file()).with_event_bus(event_bus.clone()));
        let library_cache = LibraryCache::new(config.library_cache_file());

        let indexer = MetadataIndexer::new(
            Arc::clone(&metadata),
            Arc::clone(&config.tag_reader),
            ArtworkCache::new(config.cache_dir.clone()),
            Arc::clone(&local_backups),
        )
        .with_local_keep(config.retention.local_keep)
        .with_extensions(config.audio_extensions.clone())
        .with_event_bus(event_bus.clone());

        let credentials = build_credentials(&config, &event_bus)?;
        let transfer = build_remote(&config)?.map(|remote| {
            let client = TransferClient::new(remote, Arc::clone(&local_backups))
                .with_local_keep(config.retention.local_keep)
                .with_timeout(config.remote_timeout)
                .with_event_bus(event_bus.clone());
            match &credentials {
                Some(manager) => client.with_credentials(Arc::clone(manager)),
                None => client,
            }
        });

        info!(
            music_dir = %config.music_dir.display(),
            remote = transfer.as_ref().map(|t| t.remote_name()).unwrap_or("none"),
            cloud_backups = cloud_backups.is_some(),
            "Core service initialized"
        );

        Ok(Self {
            inner: Arc::new(ServiceInner {
                config,
                event_bus,
                metadata,
                playlists,
                library_cache,
                indexer,
                local_backups,
                cloud_backups,
                credentials,
                transfer,
            }),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    /// Subscribe to every event the engine publishes from now on.
    pub fn events(&self) -> EventStream {
        EventStream::new(self.inner.event_bus.subscribe())
    }

    // ------------------------------------------------------------------
    // Library
    // ------------------------------------------------------------------

    pub fn playlists(&self) -> &PlaylistStore {
        &self.inner.playlists
    }

    pub async fn metadata(&self) -> Result<MetadataMap> {
        Ok(self.inner.metadata.load().await?)
    }

    /// Reconcile the metadata store with the music folder.
    pub async fn rebuild_library(&self) -> Result<RebuildSummary> {
        Ok(self.inner.indexer.rebuild(&self.inner.config.music_dir).await?)
    }

    /// [`rebuild_library`](Self::rebuild_library) as a cancellable background job.
    pub fn spawn_rebuild(&self) -> JobHandle<RebuildSummary> {
        self.spawn_job(JobKind::Rebuild, |service, _id, cancel| async move {
            let root = service.inner.config.music_dir.clone();
            service
                .inner
                .indexer
                .rebuild_with_cancel(&root, &cancel)
                .await
                .map_err(CoreError::from)
        })
    }

    /// The cached library listing, rescanning when the cache is missing or stale.
    pub async fn library_listing(&self) -> Result<Vec<LibraryEntry>> {
        match self.inner.library_cache.load().await? {
            Some(entries) => Ok(entries),
            None => self.refresh_library_listing().await,
        }
    }

    pub async fn refresh_library_listing(&self) -> Result<Vec<LibraryEntry>> {
        let config = &self.inner.config;
        Ok(self
            .inner
            .library_cache
            .rescan(&config.music_dir, &config.audio_extensions)
            .await?)
    }

    // ------------------------------------------------------------------
    // Credentials
    // ------------------------------------------------------------------

    fn credentials(&self) -> Result<&Arc<CredentialManager>> {
        self.inner.credentials.as_ref().ok_or_else(|| {
            CoreError::capability(
                "OAuth",
                "No OAuth client is configured. Use .oauth() on the config builder.",
            )
        })
    }

    /// Load the cached credential, if any, without user interaction.
    pub async fn restore_session(&self) -> Result<CredentialState> {
        Ok(self.credentials()?.load_cached().await?)
    }

    pub async fn sign_in(&self, credential: Credential) -> Result<()> {
        Ok(self.credentials()?.sign_in(credential).await?)
    }

    pub async fn sign_out(&self) -> Result<()> {
        Ok(self.credentials()?.sign_out().await?)
    }

    pub async fn credential_state(&self) -> CredentialState {
        match &self.inner.credentials {
            Some(manager) => manager.state().await,
            None => CredentialState::NoCredential,
        }
    }

    // ------------------------------------------------------------------
    // Remote transfers
    // ------------------------------------------------------------------

    fn transfer(&self) -> Result<&TransferClient> {
        self.inner.transfer.as_ref().ok_or_else(|| {
            CoreError::capability(
                "RemoteStorage",
                "No remote is configured. Set a cloud folder, a remote base URL, \
                 or inject a RemoteStorage.",
            )
        })
    }

    pub async fn upload_playlists(&self) -> Result<UploadReceipt> {
        let transfer = self.transfer()?;
        Ok(transfer
            .upload_playlists(&self.inner.playlists, REMOTE_PLAYLISTS_PATH)
            .await?)
    }

    /// Replace the local playlists with the remote copy. The local document is
    /// backed up first.
    pub async fn download_playlists(&self) -> Result<DownloadReceipt> {
        let transfer = self.transfer()?;
        Ok(transfer
            .download_playlists(&self.inner.playlists, REMOTE_PLAYLISTS_PATH)
            .await?)
    }

    pub fn spawn_upload_playlists(&self) -> JobHandle<UploadReceipt> {
        self.spawn_job(JobKind::PlaylistUpload, |service, _id, _cancel| async move {
            service.upload_playlists().await
        })
    }

    pub fn spawn_download_playlists(&self) -> JobHandle<DownloadReceipt> {
        self.spawn_job(JobKind::PlaylistDownload, |service, _id, _cancel| async move {
            service.download_playlists().await
        })
    }

    // ------------------------------------------------------------------
    // Songs and status
    // ------------------------------------------------------------------

    /// Folder in the cloud drive that mirrors the music folder.
    pub fn remote_music_dir(&self) -> Option<PathBuf> {
        self.inner
            .config
            .cloud_dir
            .as_ref()
            .map(|dir| dir.join(REMOTE_MUSIC_DIR_NAME))
    }

    fn song_syncer(&self) -> Result<SongSyncer> {
        let remote_dir = self.remote_music_dir().ok_or_else(|| {
            CoreError::capability("CloudFolder", "Song sync needs a cloud folder")
        })?;
        let config = &self.inner.config;
        Ok(SongSyncer::new(
            config.music_dir.clone(),
            remote_dir,
            config.audio_extensions.clone(),
        )
        .with_event_bus(self.inner.event_bus.clone()))
    }

    /// Copy songs missing on either side. Runs in the background; cancel the
    /// handle to stop between files.
    pub fn spawn_song_sync(&self) -> Result<JobHandle<SongSyncReport>> {
        let syncer = self.song_syncer()?;
        Ok(self.spawn_job(JobKind::SongSync, move |_service, id, cancel| async move {
            syncer
                .sync(&id.to_string(), &cancel)
                .await
                .map_err(CoreError::from)
        }))
    }

    /// Read-only comparison of local and remote playlists and songs.
    #[instrument(skip(self))]
    pub async fn sync_status(&self) -> Result<SyncStatus> {
        let config = &self.inner.config;
        let remote_music_dir = self.remote_music_dir();
        let status = compute_status(StatusSources {
            playlists: &self.inner.playlists,
            transfer: self.inner.transfer.as_ref(),
            remote_playlists_path: REMOTE_PLAYLISTS_PATH,
            music_dir: &config.music_dir,
            remote_music_dir: remote_music_dir.as_deref(),
            extensions: &config.audio_extensions,
        })
        .await?;
        Ok(status)
    }

    // ------------------------------------------------------------------
    // Backups
    // ------------------------------------------------------------------

    /// Snapshot the library listing, metadata, playlists and artwork into the
    /// cloud folder, then keep only the newest `cloud_keep` of each.
    pub async fn backup_to_cloud(&self) -> Result<CloudBackupReport> {
        let cloud = self.inner.cloud_backups.as_ref().ok_or_else(|| {
            CoreError::capability("CloudFolder", "Cloud backup needs a cloud folder")
        })?;
        let config = &self.inner.config;
        let sources = [
            (config.library_cache_file(), prefixes::LIBRARY),
            (config.metadata_file(), prefixes::METADATA),
            (config.playlists_file(), prefixes::PLAYLISTS),
            (config.artwork_dir(), prefixes::ARTWORK),
        ];

        let _metadata_guard = self.inner.metadata.exclusive().await;
        let _playlists_guard = self.inner.playlists.exclusive().await;
        Ok(cloud_backup::mirror(cloud, &sources, config.retention.cloud_keep).await)
    }

    pub fn spawn_backup_to_cloud(&self) -> JobHandle<CloudBackupReport> {
        self.spawn_job(JobKind::CloudBackup, |service, _id, _cancel| async move {
            service.backup_to_cloud().await
        })
    }

    /// Trim the cloud folder to `cloud_keep` snapshots per prefix without
    /// writing new ones.
    pub async fn cleanup_cloud_backups(&self) -> Result<CleanupReport> {
        let cloud = self.inner.cloud_backups.as_ref().ok_or_else(|| {
            CoreError::capability("CloudFolder", "Cloud cleanup needs a cloud folder")
        })?;
        Ok(cloud
            .cleanup_all(prefixes::CLOUD, self.inner.config.retention.cloud_keep)
            .await)
    }

    /// Trim the local backup directory to `local_keep` snapshots per prefix.
    pub async fn cleanup_local_backups(&self) -> CleanupReport {
        let local_prefixes = [
            prefixes::METADATA,
            prefixes::PLAYLISTS,
            prefixes::PLAYLIST_LOCAL,
            prefixes::LIBRARY,
        ];
        self.inner
            .local_backups
            .cleanup_all(&local_prefixes, self.inner.config.retention.local_keep)
            .await
    }

    // ------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------

    /// Run `work` on the tokio runtime and publish its lifecycle.
    ///
    /// Must be called from within a tokio runtime.
    fn spawn_job<T, F, Fut>(&self, kind: JobKind, work: F) -> JobHandle<T>
    where
        T: JobOutcome + Send + 'static,
        F: FnOnce(CoreService, JobId, CancellationToken) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let id = JobId::new();
        let cancel = CancellationToken::new();
        let bus = self.inner.event_bus.clone();
        let job_id = id.to_string();

        bus.emit(CoreEvent::Sync(SyncEvent::Started {
            job_id: job_id.clone(),
            kind: kind.as_str().to_string(),
        }))
        .ok();

        let work = work(self.clone(), id, cancel.clone());
        let span = info_span!("job", job_id = %id, kind = %kind);
        let handle = tokio::spawn(
            async move {
                let result = work.await;
                let event = match &result {
                    Ok(outcome) if outcome.was_cancelled() => {
                        info!("Job cancelled");
                        SyncEvent::Cancelled { job_id }
                    }
                    Ok(outcome) => {
                        let (succeeded, failed) = outcome.counts();
                        info!(succeeded, failed, "Job completed");
                        SyncEvent::Completed {
                            job_id,
                            succeeded,
                            failed,
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Job failed");
                        SyncEvent::Failed {
                            job_id,
                            message: e.to_string(),
                        }
                    }
                };
                bus.emit(CoreEvent::Sync(event)).ok();
                result
            }
            .instrument(span),
        );

        JobHandle::new(id, kind, cancel, handle)
    }
}

fn build_credentials(
    config: &CoreConfig,
    event_bus: &EventBus,
) -> Result<Option<Arc<CredentialManager>>> {
    let Some(oauth) = &config.oauth else {
        return Ok(None);
    };
    let http = config.http_client.as_ref().ok_or_else(|| {
        CoreError::capability(
            "HttpClient",
            "OAuth is configured but no HttpClient is available for token refresh",
        )
    })?;

    let refresher = OAuthRefresher::new(Arc::clone(http), oauth.clone(), Arc::clone(&config.clock))
        .with_request_timeout(config.remote_timeout);
    let manager = CredentialManager::new(
        TokenStore::new(Arc::clone(&config.secure_store)),
        Arc::new(refresher),
        Arc::clone(&config.clock),
    )
    .with_event_bus(event_bus.clone())
    .with_timeout(config.auth_timeout);

    Ok(Some(Arc::new(manager)))
}

/// The injected remote, or an HTTP remote over `remote_base_url`.
fn build_remote(config: &CoreConfig) -> Result<Option<Arc<dyn RemoteStorage>>> {
    if let Some(remote) = &config.remote_storage {
        return Ok(Some(Arc::clone(remote)));
    }

    match (&config.remote_base_url, &config.http_client) {
        (Some(base_url), Some(http)) => {
            let remote = HttpRemoteStorage::new(Arc::clone(http), base_url)?
                .with_request_timeout(config.remote_timeout);
            Ok(Some(Arc::new(remote)))
        }
        (Some(_), None) => Err(CoreError::capability(
            "HttpClient",
            "A remote base URL is configured but no HttpClient is available",
        )),
        (None, _) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{TagReader, TrackTags};
    use std::path::Path;

    struct TitleFromStem;

    #[async_trait]
    impl TagReader for TitleFromStem {
        async fn read_tags(&self, path: &Path) -> BridgeResult<TrackTags> {
            Ok(TrackTags {
                title: path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned()),
                ..Default::default()
            })
        }
    }

    struct NullStore;

    #[async_trait]
    impl bridge_traits::SecureStore for NullStore {
        async fn set_secret(&self, _key: &str, _value: &[u8]) -> BridgeResult<()> {
            Ok(())
        }
        async fn get_secret(&self, _key: &str) -> BridgeResult<Option<Vec<u8>>> {
            Ok(None)
        }
        async fn delete_secret(&self, _key: &str) -> BridgeResult<()> {
            Ok(())
        }
    }

    struct OfflineHttp;

    #[async_trait]
    impl bridge_traits::HttpClient for OfflineHttp {
        async fn execute(
            &self,
            _request: bridge_traits::HttpRequest,
        ) -> BridgeResult<bridge_traits::HttpResponse> {
            Err(bridge_traits::error::BridgeError::NotAvailable(
                "offline".to_string(),
            ))
        }
    }

    fn config_in(root: &Path) -> CoreConfig {
        CoreConfig::builder()
            .music_dir(root.join("music"))
            .data_dir(root.join("data"))
            .cache_dir(root.join("cache"))
            .tag_reader(Arc::new(TitleFromStem))
            .secure_store(Arc::new(NullStore))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_new_creates_directories() {
        let root = tempfile::tempdir().unwrap();
        let core = CoreService::new(config_in(root.path())).unwrap();

        assert!(core.config().backup_dir().is_dir());
        assert!(core.config().artwork_dir().is_dir());
        assert!(core.remote_music_dir().is_none());
    }

    #[tokio::test]
    async fn test_remote_operations_need_a_remote() {
        let root = tempfile::tempdir().unwrap();
        let core = CoreService::new(config_in(root.path())).unwrap();

        assert!(matches!(
            core.upload_playlists().await,
            Err(CoreError::CapabilityMissing { .. })
        ));
        assert!(matches!(
            core.backup_to_cloud().await,
            Err(CoreError::CapabilityMissing { .. })
        ));
        assert!(matches!(
            core.spawn_song_sync(),
            Err(CoreError::CapabilityMissing { .. })
        ));
        assert_eq!(core.credential_state().await, CredentialState::NoCredential);
    }

    #[tokio::test]
    async fn test_base_url_without_http_client_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let mut config = config_in(root.path());
        config.http_client = None;
        config.remote_storage = None;
        config.remote_base_url = Some("https://files.example.com/music".to_string());

        assert!(matches!(
            CoreService::new(config),
            Err(CoreError::CapabilityMissing { .. })
        ));
    }

    #[tokio::test]
    async fn test_base_url_builds_http_remote() {
        let root = tempfile::tempdir().unwrap();
        let mut config = config_in(root.path());
        config.http_client = Some(Arc::new(OfflineHttp));
        config.remote_storage = None;
        config.remote_base_url = Some("https://files.example.com/music".to_string());
        assert!(CoreService::new(config).is_ok());

        let mut config = config_in(root.path());
        config.http_client = Some(Arc::new(OfflineHttp));
        config.remote_storage = None;
        config.remote_base_url = Some("not a url".to_string());
        assert!(matches!(
            CoreService::new(config),
            Err(CoreError::Bridge(_))
        ));
    }

    #[tokio::test]
    async fn test_spawned_rebuild_publishes_lifecycle() {
        let root = tempfile::tempdir().unwrap();
        let config = config_in(root.path());
        std::fs::create_dir_all(&config.music_dir).unwrap();
        std::fs::write(config.music_dir.join("one.mp3"), b"x").unwrap();

        let core = CoreService::new(config).unwrap();
        let mut events = core
            .events()
            .filter(|e| matches!(e, CoreEvent::Sync(_)));

        let job = core.spawn_rebuild();
        let id = job.id().to_string();
        let summary = job.wait().await.unwrap();
        assert_eq!(summary.new_count, 1);

        match events.recv().await.unwrap() {
            CoreEvent::Sync(SyncEvent::Started { job_id, kind }) => {
                assert_eq!(job_id, id);
                assert_eq!(kind, "rebuild");
            }
            other => panic!("unexpected event {other:?}"),
        }
        match events.recv().await.unwrap() {
            CoreEvent::Sync(SyncEvent::Completed { job_id, succeeded, .. }) => {
                assert_eq!(job_id, id);
                assert_eq!(succeeded, 1);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_job_publishes_failure() {
        let root = tempfile::tempdir().unwrap();
        // music_dir is never created, so the rebuild refuses to run
        let core = CoreService::new(config_in(root.path())).unwrap();
        let mut events = core
            .events()
            .filter(|e| matches!(e, CoreEvent::Sync(SyncEvent::Failed { .. })));

        let job = core.spawn_rebuild();
        assert!(matches!(job.wait().await, Err(CoreError::Library(_))));
        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Sync(SyncEvent::Failed { .. })
        ));
    }
}
