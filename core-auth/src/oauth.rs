//! # Credential Refresh
//!
//! [`CredentialRefresher`] is the `RefreshCredential() -> Credential | AuthFailed`
//! capability used by the credential manager. [`OAuthRefresher`] implements it
//! with the OAuth 2.0 refresh-token grant (RFC 6749 §6) against a configured
//! token endpoint.
//!
//! The interactive authorization-code flow is out of scope; a first
//! credential is handed to the manager by the host.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bridge_traits::Clock;
use chrono::Duration as ChronoDuration;
use core_runtime::config::OAuthConfig;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{AuthError, Result};
use crate::types::Credential;

#[async_trait]
pub trait CredentialRefresher: Send + Sync {
    /// Obtain a fresh credential, given the current (expired) one if any.
    async fn refresh_credential(&self, current: Option<Credential>) -> Result<Credential>;
}

pub struct OAuthRefresher {
    http_client: Arc<dyn HttpClient>,
    config: OAuthConfig,
    clock: Arc<dyn Clock>,
    request_timeout: Option<Duration>,
}

impl OAuthRefresher {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        config: OAuthConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            http_client,
            config,
            clock,
            request_timeout: None,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    fn encode_form(&self, refresh_token: &str) -> Result<String> {
        let scope = self.config.scopes.join(" ");
        let mut params: Vec<(&str, &str)> = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &self.config.client_id),
        ];
        if let Some(secret) = &self.config.client_secret {
            params.push(("client_secret", secret));
        }
        if !scope.is_empty() {
            params.push(("scope", &scope));
        }

        serde_urlencoded::to_string(&params).map_err(|e| {
            AuthError::TokenRefreshFailed(format!("Failed to encode token request: {e}"))
        })
    }
}

#[async_trait]
impl CredentialRefresher for OAuthRefresher {
    #[instrument(skip(self, current), fields(endpoint = %self.config.token_endpoint))]
    async fn refresh_credential(&self, current: Option<Credential>) -> Result<Credential> {
        let refresh_token = current
            .and_then(|c| c.refresh_token)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::NotAuthenticated)?;

        let mut request = HttpRequest::new(HttpMethod::Post, self.config.token_endpoint.clone())
            .header("Accept", "application/json")
            .form(self.encode_form(&refresh_token)?);
        if let Some(timeout) = self.request_timeout {
            request = request.timeout(timeout);
        }

        debug!("Requesting refreshed access token");
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| AuthError::TokenRefreshFailed(e.to_string()))?;

        if !response.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            warn!(status = response.status, "Token endpoint rejected refresh");
            return Err(if matches!(response.status, 400 | 401) {
                AuthError::AuthFailed(format!(
                    "token endpoint returned {}: {body}",
                    response.status
                ))
            } else {
                AuthError::TokenRefreshFailed(format!(
                    "token endpoint returned {}: {body}",
                    response.status
                ))
            });
        }

        let token: TokenResponse = response.json().map_err(|e| {
            AuthError::TokenRefreshFailed(format!("Failed to parse token response: {e}"))
        })?;

        let expires_at = token
            .expires_in
            .map(|secs| self.clock.now() + ChronoDuration::seconds(secs));
        info!(expires_in = ?token.expires_in, "Access token refreshed");

        Ok(Credential {
            access_token: token.access_token,
            // Endpoints that do not rotate refresh tokens omit the field.
            refresh_token: token.refresh_token.or(Some(refresh_token)),
            expires_at,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}
