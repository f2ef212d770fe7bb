//! # Credential Manager
//!
//! Owns the cached remote credential and its state machine:
//!
//! ```text
//! NoCredential --(cache hit, not expired)--> SilentlyValid
//! SilentlyValid --(expiry reached / remote 401)--> Expired
//! Expired --(refresh started)--> Reauthenticating
//! Reauthenticating --(refresh ok)--> SilentlyValid
//! Reauthenticating --(refresh token rejected)--> NoCredential
//! Reauthenticating --(transient failure)--> Expired
//! ```
//!
//! All transitions happen under one async mutex, so concurrent transfers that
//! hit the same expired token trigger a single refresh.

use bridge_traits::Clock;
use core_runtime::config::DEFAULT_AUTH_TIMEOUT;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{AuthError, Result};
use crate::oauth::CredentialRefresher;
use crate::token_store::TokenStore;
use crate::types::{Credential, CredentialState};

struct Inner {
    state: CredentialState,
    credential: Option<Credential>,
    loaded: bool,
}

pub struct CredentialManager {
    token_store: TokenStore,
    refresher: Arc<dyn CredentialRefresher>,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
    timeout: Duration,
    inner: Mutex<Inner>,
}

impl CredentialManager {
    pub fn new(
        token_store: TokenStore,
        refresher: Arc<dyn CredentialRefresher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            token_store,
            refresher,
            clock,
            event_bus: None,
            timeout: DEFAULT_AUTH_TIMEOUT,
            inner: Mutex::new(Inner {
                state: CredentialState::NoCredential,
                credential: None,
                loaded: false,
            }),
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn emit(&self, event: AuthEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Auth(event)).ok();
        }
    }

    pub async fn state(&self) -> CredentialState {
        self.inner.lock().await.state
    }

    /// Read the token cache and settle the initial state.
    pub async fn load_cached(&self) -> Result<CredentialState> {
        let mut inner = self.inner.lock().await;
        self.ensure_loaded(&mut inner).await?;
        Ok(inner.state)
    }

    /// Accept a credential obtained outside the engine (interactive sign-in)
    /// and persist it.
    #[instrument(skip(self, credential))]
    pub async fn sign_in(&self, credential: Credential) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.token_store.save(&credential).await?;
        inner.state = self.state_for(&credential);
        inner.credential = Some(credential);
        inner.loaded = true;
        info!(state = %inner.state, "Credential accepted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.token_store.clear().await?;
        inner.credential = None;
        inner.state = CredentialState::NoCredential;
        inner.loaded = true;
        info!("Signed out");
        self.emit(AuthEvent::SignedOut);
        Ok(())
    }

    /// A usable access token, refreshing silently if the cached one expired.
    pub async fn access_token(&self) -> Result<String> {
        let mut inner = self.inner.lock().await;
        self.ensure_loaded(&mut inner).await?;

        let now = self.clock.now();
        let cached = inner.credential.as_ref().map(|credential| {
            (!credential.is_expired_at(now)).then(|| credential.access_token.clone())
        });

        match cached {
            None => {
                inner.state = CredentialState::NoCredential;
                Err(AuthError::NotAuthenticated)
            }
            Some(Some(token)) => {
                inner.state = CredentialState::SilentlyValid;
                Ok(token)
            }
            Some(None) => {
                debug!("Cached credential expired");
                inner.state = CredentialState::Expired;
                self.refresh_locked(&mut inner).await
            }
        }
    }

    /// The remote rejected `rejected_token`. Refresh unless another caller
    /// already replaced it, and return the token to retry with.
    pub async fn refresh_rejected(&self, rejected_token: &str) -> Result<String> {
        let mut inner = self.inner.lock().await;
        self.ensure_loaded(&mut inner).await?;

        if let Some(current) = &inner.credential {
            if current.access_token != rejected_token && inner.state.is_usable() {
                debug!("Token already refreshed by another caller");
                return Ok(current.access_token.clone());
            }
        }

        inner.state = CredentialState::Expired;
        self.refresh_locked(&mut inner).await
    }

    /// Refresh regardless of the cached token's expiry.
    pub async fn force_refresh(&self) -> Result<String> {
        let mut inner = self.inner.lock().await;
        self.ensure_loaded(&mut inner).await?;
        inner.state = CredentialState::Expired;
        self.refresh_locked(&mut inner).await
    }

    async fn ensure_loaded(&self, inner: &mut Inner) -> Result<()> {
        if inner.loaded {
            return Ok(());
        }
        let cached = self.token_store.load().await?;
        inner.loaded = true;
        inner.state = match &cached {
            Some(credential) => {
                self.emit(AuthEvent::CredentialLoaded);
                self.state_for(credential)
            }
            None => CredentialState::NoCredential,
        };
        inner.credential = cached;
        debug!(state = %inner.state, "Credential cache read");
        Ok(())
    }

    fn state_for(&self, credential: &Credential) -> CredentialState {
        if credential.is_expired_at(self.clock.now()) {
            CredentialState::Expired
        } else {
            CredentialState::SilentlyValid
        }
    }

    #[instrument(skip(self, inner))]
    async fn refresh_locked(&self, inner: &mut Inner) -> Result<String> {
        inner.state = CredentialState::Reauthenticating;
        self.emit(AuthEvent::TokenRefreshing);

        let outcome = tokio::time::timeout(
            self.timeout,
            self.refresher.refresh_credential(inner.credential.clone()),
        )
        .await
        .unwrap_or(Err(AuthError::OperationTimeout(self.timeout.as_secs())));

        let fresh = match outcome {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!(error = %e, "Credential refresh failed");
                if e.is_recoverable() {
                    inner.state = CredentialState::Expired;
                } else {
                    inner.state = CredentialState::NoCredential;
                    inner.credential = None;
                    if let Err(clear_err) = self.token_store.clear().await {
                        warn!(error = %clear_err, "Failed to clear rejected credential");
                    }
                }
                self.emit(AuthEvent::AuthError {
                    message: e.to_string(),
                    recoverable: e.is_recoverable(),
                });
                return Err(e);
            }
        };

        if let Err(e) = self.token_store.save(&fresh).await {
            warn!(error = %e, "Refreshed credential not cached, continuing in memory");
        }

        let token = fresh.access_token.clone();
        self.emit(AuthEvent::TokenRefreshed {
            expires_at: fresh.expires_at.map(|at| at.timestamp()),
        });
        inner.credential = Some(fresh);
        inner.state = CredentialState::SilentlyValid;
        info!("Credential refreshed");
        Ok(token)
    }
}
