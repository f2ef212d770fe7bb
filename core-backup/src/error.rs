use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Nothing to back up at {0}")]
    SourceMissing(String),

    #[error("Invalid backup prefix '{0}'")]
    InvalidPrefix(String),

    #[error("Failed to write backup {name}: {source}")]
    BackupWriteFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete backup {name}: {source}")]
    BackupDeleteFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Backup {0} is locked by another process")]
    FileLocked(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackupError {
    /// Classify a write failure, separating files held open elsewhere.
    pub(crate) fn write_failed(name: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            BackupError::FileLocked(name.to_string())
        } else {
            BackupError::BackupWriteFailed {
                name: name.to_string(),
                source,
            }
        }
    }

    /// Classify a delete failure, separating files held open elsewhere.
    pub(crate) fn delete_failed(name: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            BackupError::FileLocked(name.to_string())
        } else {
            BackupError::BackupDeleteFailed {
                name: name.to_string(),
                source,
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
