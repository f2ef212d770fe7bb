//! # Core Authentication
//!
//! Remote credential handling: a cached [`Credential`], the
//! [`CredentialManager`] state machine that uses it silently and refreshes it
//! when it expires, and the OAuth refresh-token grant in [`OAuthRefresher`].

pub mod error;
pub mod manager;
pub mod oauth;
pub mod token_store;
pub mod types;

#[cfg(test)]
mod test_support;

pub use error::{AuthError, Result};
pub use manager::CredentialManager;
pub use oauth::{CredentialRefresher, OAuthRefresher};
pub use token_store::TokenStore;
pub use types::{Credential, CredentialState};
