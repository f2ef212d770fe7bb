use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// No usable credential and no way to obtain one silently
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The token endpoint rejected the refresh token
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Secure storage unavailable: {0}")]
    SecureStorageUnavailable(String),

    #[error("Stored credential is corrupted: {0}")]
    TokenCorrupted(String),

    #[error("Authentication timed out after {0}s")]
    OperationTimeout(u64),
}

impl AuthError {
    /// Whether retrying later (or after user action) may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AuthError::TokenRefreshFailed(_)
                | AuthError::SecureStorageUnavailable(_)
                | AuthError::OperationTimeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
