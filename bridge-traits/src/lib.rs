//! # Host Bridge Traits
//!
//! Capability traits the sync engine needs from its host.
//!
//! ## Overview
//!
//! The engine core never talks to the network, a tag parser or a credential
//! store directly. Each of those concerns is a trait defined here and
//! implemented once per host (see `bridge-desktop`), which keeps the core
//! testable against mocks.
//!
//! ## Traits
//!
//! ### Library Input
//! - [`TagReader`](tags::TagReader) - Tag fields and embedded artwork of an audio file
//!
//! ### Remote Side
//! - [`RemoteStorage`](remote::RemoteStorage) - Opaque object store addressed by relative paths
//! - [`HttpClient`](http::HttpClient) - Async HTTP used by the HTTP remote and token refresh
//!
//! ### Security & Storage
//! - [`SecureStore`](storage::SecureStore) - Credential persistence between runs
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for snapshot naming and expiry checks
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Two cases carry
//! meaning for callers:
//!
//! - [`BridgeError::Remote`] with status `401` means the credential expired
//!   ([`BridgeError::is_auth_expired`])
//! - [`BridgeError::Unreadable`] means a file exists but could not be parsed
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! behind `Arc` across background jobs.
//!
//! ## Examples
//!
//! ### Implementing RemoteStorage
//!
//! ```ignore
//! use bridge_traits::remote::RemoteStorage;
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//! use bytes::Bytes;
//!
//! pub struct MemoryRemote;
//!
//! #[async_trait]
//! impl RemoteStorage for MemoryRemote {
//!     async fn fetch(&self, remote_path: &str, access_token: &str) -> Result<Option<Bytes>> {
//!         Ok(None)
//!     }
//!
//!     async fn put(&self, remote_path: &str, data: Bytes, access_token: &str) -> Result<()> {
//!         Ok(())
//!     }
//! }
//! ```

pub mod error;
pub mod http;
pub mod remote;
pub mod storage;
pub mod tags;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use remote::RemoteStorage;
pub use storage::SecureStore;
pub use tags::{EmbeddedArtwork, TagReader, TrackTags};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
