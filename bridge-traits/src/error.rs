use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unreadable file {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("Remote responded with status {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// HTTP-style status code used by remotes to signal an expired credential.
    pub const AUTH_EXPIRED_STATUS: u16 = 401;

    /// Whether this error means the credential used for the call is no longer accepted.
    pub fn is_auth_expired(&self) -> bool {
        matches!(
            self,
            BridgeError::Remote { status, .. } if *status == Self::AUTH_EXPIRED_STATUS
        )
    }

    /// Whether the failure comes from a file held open by another process.
    pub fn is_locked(&self) -> bool {
        match self {
            BridgeError::Io(e) => e.kind() == std::io::ErrorKind::PermissionDenied,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
