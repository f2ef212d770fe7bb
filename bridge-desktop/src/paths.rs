//! Platform default directories

use std::path::PathBuf;

use bridge_traits::error::{BridgeError, Result};

const APP_DIR: &str = "MusicPlayer";
const CLOUD_DATA_DIR: &str = "MusicPlayerData";

/// Default directory layout on a desktop host.
///
/// `data_dir` is the roaming location (metadata, playlists, backups) and
/// `cache_dir` the machine-local one (artwork cache, listing cache, token
/// cache). `cloud_dir` is set only when a synced cloud drive is found in the
/// home directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopPaths {
    pub music_dir: PathBuf,
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub cloud_dir: Option<PathBuf>,
}

impl DesktopPaths {
    pub fn detect() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| BridgeError::NotAvailable("home directory".to_string()))?;

        let music_dir = dirs::audio_dir().unwrap_or_else(|| home.join("Music"));
        let data_dir = dirs::data_dir()
            .ok_or_else(|| BridgeError::NotAvailable("roaming data directory".to_string()))?
            .join(APP_DIR);
        let cache_dir = dirs::data_local_dir()
            .ok_or_else(|| BridgeError::NotAvailable("local data directory".to_string()))?
            .join(APP_DIR);

        let cloud_dir = ["OneDrive", "Dropbox", "Google Drive"]
            .iter()
            .map(|name| home.join(name))
            .find(|candidate| candidate.is_dir())
            .map(|drive| drive.join(CLOUD_DATA_DIR));

        Ok(Self {
            music_dir,
            data_dir,
            cache_dir,
            cloud_dir,
        })
    }
}
