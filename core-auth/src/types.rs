//! Credential types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds before the recorded expiry at which a token is treated as expired.
pub const EXPIRY_SKEW_SECS: i64 = 60;

/// Access credential for the remote, as cached between runs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// `None` when the issuer did not report a lifetime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }

    pub fn expiring_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    /// Expired at `now`, counting the skew. A credential without an expiry
    /// is used until the remote rejects it.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at - Duration::seconds(EXPIRY_SKEW_SECS),
            None => false,
        }
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Where the credential manager stands.
///
/// ```text
/// NoCredential -> SilentlyValid -> Expired -> Reauthenticating -> SilentlyValid
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialState {
    NoCredential,
    SilentlyValid,
    Expired,
    Reauthenticating,
}

impl CredentialState {
    pub fn is_usable(&self) -> bool {
        matches!(self, CredentialState::SilentlyValid)
    }
}

impl fmt::Display for CredentialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CredentialState::NoCredential => "no_credential",
            CredentialState::SilentlyValid => "silently_valid",
            CredentialState::Expired => "expired",
            CredentialState::Reauthenticating => "reauthenticating",
        };
        f.write_str(label)
    }
}
