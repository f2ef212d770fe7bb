use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    #[error("Configuration error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] core_auth::AuthError),

    #[error("Sync error: {0}")]
    Sync(#[from] core_sync::SyncError),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::error::BridgeError),

    #[error("Backup error: {0}")]
    Backup(#[from] core_backup::BackupError),
}

impl CoreError {
    pub(crate) fn capability(capability: &str, message: impl Into<String>) -> Self {
        CoreError::CapabilityMissing {
            capability: capability.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
