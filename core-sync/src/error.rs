use bridge_traits::error::BridgeError;
use core_auth::AuthError;
use core_backup::BackupError;
use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// The remote rejected the credential again after one refresh
    #[error("Remote rejected the credential for {path} after refresh")]
    TransferAuthExpired { path: String },

    #[error("Transfer of {path} failed: {reason}")]
    TransferFailed { path: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transfer of {path} timed out after {seconds}s")]
    Timeout { path: String, seconds: u64 },

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    pub(crate) fn from_bridge(path: &str, error: BridgeError) -> Self {
        match error {
            BridgeError::NotFound(_) => SyncError::NotFound(path.to_string()),
            e if e.is_auth_expired() => SyncError::TransferAuthExpired {
                path: path.to_string(),
            },
            e => SyncError::TransferFailed {
                path: path.to_string(),
                reason: e.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
