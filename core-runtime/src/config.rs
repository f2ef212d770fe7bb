//! # Core Configuration Module
//!
//! Explicit configuration for the sync engine, built once and handed to every
//! component at construction time.
//!
//! ## Overview
//!
//! `CoreConfig` carries the directory layout, retention and timeout settings,
//! and the host bridges the engine needs. The builder validates eagerly so a
//! misconfigured host fails at startup rather than halfway through a rebuild.
//!
//! ## Directory layout
//!
//! | Setting | Holds |
//! |---------|-------|
//! | `music_dir` | Audio files to index (never modified) |
//! | `data_dir` | `music_metadata.json`, `playlists.json`, `backups/` |
//! | `cache_dir` | `cache/artwork/`, `library_cache.json`, `token_cache.json` |
//! | `cloud_dir` | Optional synced cloud folder for mirrored backups |
//!
//! ## Required Dependencies
//!
//! - `TagReader` - desktop default: lofty
//! - `SecureStore` - desktop default: JSON token cache in `cache_dir`
//!
//! ## Optional Dependencies
//!
//! - `HttpClient` - desktop default: reqwest
//! - `RemoteStorage` - desktop default: folder remote over `cloud_dir`
//! - `Clock` - defaults to the system clock
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .music_dir("/home/me/Music")
//!     .data_dir("/home/me/.local/share/MusicPlayer")
//!     .cache_dir("/home/me/.cache/MusicPlayer")
//!     .build()?;
//! config.ensure_directories()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{Clock, HttpClient, RemoteStorage, SecureStore, SystemClock, TagReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const METADATA_FILE_NAME: &str = "music_metadata.json";
pub const PLAYLISTS_FILE_NAME: &str = "playlists.json";
pub const LIBRARY_CACHE_FILE_NAME: &str = "library_cache.json";
pub const TOKEN_CACHE_FILE_NAME: &str = "token_cache.json";
pub const BACKUP_DIR_NAME: &str = "backups";
/// Artwork lives at `cache_dir/cache/artwork`; records store paths relative to `cache_dir`.
pub const ARTWORK_RELATIVE_DIR: &str = "cache/artwork";

pub const DEFAULT_AUDIO_EXTENSIONS: &[&str] = &["mp3", "ogg", "wav", "flac", "m4a"];
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(120);

/// How many snapshots to keep per artifact prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Snapshots kept in the local backup directory
    pub local_keep: usize,
    /// Snapshots kept in the cloud folder
    pub cloud_keep: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            local_keep: 10,
            cloud_keep: 2,
        }
    }
}

/// OAuth client settings for the refresh-token grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub token_endpoint: String,
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    pub fn new(client_id: impl Into<String>, token_endpoint: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            token_endpoint: token_endpoint.into(),
            scopes: Vec::new(),
        }
    }

    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(Error::Config("OAuth client id cannot be empty".to_string()));
        }
        if !self.token_endpoint.starts_with("https://")
            && !self.token_endpoint.starts_with("http://")
        {
            return Err(Error::Config(format!(
                "OAuth token endpoint must be an http(s) URL, got '{}'",
                self.token_endpoint
            )));
        }
        Ok(())
    }
}

/// Engine configuration. Build with [`CoreConfig::builder`].
#[derive(Clone)]
pub struct CoreConfig {
    pub music_dir: PathBuf,
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub cloud_dir: Option<PathBuf>,

    /// Lower-case extensions without the dot
    pub audio_extensions: Vec<String>,
    pub retention: RetentionPolicy,
    pub remote_timeout: Duration,
    pub auth_timeout: Duration,
    pub event_buffer_size: usize,

    pub tag_reader: Arc<dyn TagReader>,
    pub secure_store: Arc<dyn SecureStore>,
    pub http_client: Option<Arc<dyn HttpClient>>,
    pub remote_storage: Option<Arc<dyn RemoteStorage>>,
    pub clock: Arc<dyn Clock>,

    pub oauth: Option<OAuthConfig>,
    /// Base URL for the HTTP remote, used when no `remote_storage` is injected
    pub remote_base_url: Option<String>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("music_dir", &self.music_dir)
            .field("data_dir", &self.data_dir)
            .field("cache_dir", &self.cache_dir)
            .field("cloud_dir", &self.cloud_dir)
            .field("audio_extensions", &self.audio_extensions)
            .field("retention", &self.retention)
            .field("remote_timeout", &self.remote_timeout)
            .field("auth_timeout", &self.auth_timeout)
            .field("tag_reader", &"TagReader { ... }")
            .field("secure_store", &"SecureStore { ... }")
            .field(
                "http_client",
                &self.http_client.as_ref().map(|_| "HttpClient { ... }"),
            )
            .field(
                "remote_storage",
                &self.remote_storage.as_ref().map(|r| r.name().to_string()),
            )
            .field("oauth", &self.oauth.as_ref().map(|o| &o.token_endpoint))
            .field("remote_base_url", &self.remote_base_url)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    pub fn metadata_file(&self) -> PathBuf {
        self.data_dir.join(METADATA_FILE_NAME)
    }

    pub fn playlists_file(&self) -> PathBuf {
        self.data_dir.join(PLAYLISTS_FILE_NAME)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join(BACKUP_DIR_NAME)
    }

    pub fn artwork_dir(&self) -> PathBuf {
        self.cache_dir.join(ARTWORK_RELATIVE_DIR)
    }

    pub fn library_cache_file(&self) -> PathBuf {
        self.cache_dir.join(LIBRARY_CACHE_FILE_NAME)
    }

    pub fn token_cache_file(&self) -> PathBuf {
        self.cache_dir.join(TOKEN_CACHE_FILE_NAME)
    }

    /// Whether `path` has one of the configured audio extensions (case-insensitive).
    pub fn is_audio_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.audio_extensions
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    /// Checks paths, extensions, retention and timeouts.
    pub fn validate(&self) -> Result<()> {
        for (name, dir) in [
            ("Music directory", &self.music_dir),
            ("Data directory", &self.data_dir),
            ("Cache directory", &self.cache_dir),
        ] {
            if dir.as_os_str().is_empty() {
                return Err(Error::Config(format!("{} cannot be empty", name)));
            }
        }

        if self.audio_extensions.is_empty() {
            return Err(Error::Config(
                "At least one audio extension must be configured".to_string(),
            ));
        }

        if self.retention.local_keep == 0 || self.retention.cloud_keep == 0 {
            return Err(Error::Config(
                "Retention counts must keep at least one snapshot".to_string(),
            ));
        }

        if self.remote_timeout.is_zero() || self.auth_timeout.is_zero() {
            return Err(Error::Config("Timeouts must be greater than zero".to_string()));
        }

        if let Some(oauth) = &self.oauth {
            oauth.validate()?;
        }

        Ok(())
    }

    /// Create every directory the engine writes into. Existing content is left alone.
    pub fn ensure_directories(&self) -> Result<()> {
        let mut dirs = vec![
            self.data_dir.clone(),
            self.backup_dir(),
            self.cache_dir.clone(),
            self.artwork_dir(),
        ];
        dirs.extend(self.cloud_dir.clone());

        for dir in dirs {
            std::fs::create_dir_all(&dir).map_err(|source| Error::Directory {
                path: dir.display().to_string(),
                source,
            })?;
        }
        Ok(())
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_tag_reader() -> Result<Arc<dyn TagReader>> {
    Ok(Arc::new(bridge_desktop::LoftyTagReader::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_tag_reader() -> Result<Arc<dyn TagReader>> {
    Err(Error::CapabilityMissing {
        capability: "TagReader".to_string(),
        message: "A TagReader implementation is required to index the library. \
                  Desktop: enable the 'desktop-shims' feature to use the lofty-based reader. \
                  Other hosts: inject a native tag reader."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_secure_store(cache_dir: &Path) -> Result<Arc<dyn SecureStore>> {
    Ok(Arc::new(bridge_desktop::FileSecureStore::new(
        cache_dir.join(TOKEN_CACHE_FILE_NAME),
    )))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_secure_store(_cache_dir: &Path) -> Result<Arc<dyn SecureStore>> {
    Err(Error::CapabilityMissing {
        capability: "SecureStore".to_string(),
        message: "A SecureStore implementation is required for credential persistence. \
                  Desktop: enable the 'desktop-shims' feature to use the token cache file."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Option<Arc<dyn HttpClient>> {
    Some(Arc::new(bridge_desktop::ReqwestHttpClient::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Option<Arc<dyn HttpClient>> {
    None
}

#[cfg(feature = "desktop-shims")]
fn provide_default_remote(cloud_dir: Option<&Path>) -> Option<Arc<dyn RemoteStorage>> {
    cloud_dir.map(|dir| {
        let remote: Arc<dyn RemoteStorage> =
            Arc::new(bridge_desktop::FolderRemoteStorage::new(dir));
        remote
    })
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_remote(_cloud_dir: Option<&Path>) -> Option<Arc<dyn RemoteStorage>> {
    None
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    music_dir: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    cloud_dir: Option<PathBuf>,
    audio_extensions: Option<Vec<String>>,
    retention: Option<RetentionPolicy>,
    remote_timeout: Option<Duration>,
    auth_timeout: Option<Duration>,
    event_buffer_size: Option<usize>,
    tag_reader: Option<Arc<dyn TagReader>>,
    secure_store: Option<Arc<dyn SecureStore>>,
    http_client: Option<Arc<dyn HttpClient>>,
    remote_storage: Option<Arc<dyn RemoteStorage>>,
    clock: Option<Arc<dyn Clock>>,
    oauth: Option<OAuthConfig>,
    remote_base_url: Option<String>,
}

impl CoreConfigBuilder {
    pub fn music_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.music_dir = Some(path.into());
        self
    }

    pub fn data_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    pub fn cache_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    pub fn cloud_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cloud_dir = Some(path.into());
        self
    }

    /// Replace the default extension set. Leading dots are stripped.
    pub fn audio_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.audio_extensions = Some(
            extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
        );
        self
    }

    pub fn retention(mut self, policy: RetentionPolicy) -> Self {
        self.retention = Some(policy);
        self
    }

    pub fn remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = Some(timeout);
        self
    }

    pub fn auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = Some(timeout);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn tag_reader(mut self, reader: Arc<dyn TagReader>) -> Self {
        self.tag_reader = Some(reader);
        self
    }

    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn remote_storage(mut self, remote: Arc<dyn RemoteStorage>) -> Self {
        self.remote_storage = Some(remote);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn oauth(mut self, oauth: OAuthConfig) -> Self {
        self.oauth = Some(oauth);
        self
    }

    pub fn remote_base_url(mut self, url: impl Into<String>) -> Self {
        self.remote_base_url = Some(url.into());
        self
    }

    /// Validate and assemble the configuration, filling platform defaults for
    /// bridges that were not injected.
    pub fn build(self) -> Result<CoreConfig> {
        let music_dir = self.music_dir.ok_or_else(|| {
            Error::Config("Music directory is required. Use .music_dir() to set it.".to_string())
        })?;

        let data_dir = self.data_dir.ok_or_else(|| {
            Error::Config("Data directory is required. Use .data_dir() to set it.".to_string())
        })?;

        let cache_dir = self.cache_dir.ok_or_else(|| {
            Error::Config("Cache directory is required. Use .cache_dir() to set it.".to_string())
        })?;

        let tag_reader = match self.tag_reader {
            Some(reader) => reader,
            None => provide_default_tag_reader()?,
        };

        let secure_store = match self.secure_store {
            Some(store) => store,
            None => provide_default_secure_store(&cache_dir)?,
        };

        let http_client = self.http_client.or_else(provide_default_http_client);
        let remote_storage = self
            .remote_storage
            .or_else(|| provide_default_remote(self.cloud_dir.as_deref()));

        let config = CoreConfig {
            music_dir,
            data_dir,
            cache_dir,
            cloud_dir: self.cloud_dir,
            audio_extensions: self.audio_extensions.unwrap_or_else(|| {
                DEFAULT_AUDIO_EXTENSIONS
                    .iter()
                    .map(|ext| ext.to_string())
                    .collect()
            }),
            retention: self.retention.unwrap_or_default(),
            remote_timeout: self.remote_timeout.unwrap_or(DEFAULT_REMOTE_TIMEOUT),
            auth_timeout: self.auth_timeout.unwrap_or(DEFAULT_AUTH_TIMEOUT),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            tag_reader,
            secure_store,
            http_client,
            remote_storage,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            oauth: self.oauth,
            remote_base_url: self.remote_base_url,
        };

        config.validate()?;

        Ok(config)
    }
}
