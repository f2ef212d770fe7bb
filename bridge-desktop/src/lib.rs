//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `TagReader` using `lofty`
//! - `RemoteStorage` over a locally synced cloud folder
//! - `HttpClient` using `reqwest`
//! - `SecureStore` as a JSON token cache file
//! - `DesktopPaths` for platform default directories via `dirs`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DesktopPaths, FolderRemoteStorage, LoftyTagReader};
//!
//! let paths = DesktopPaths::detect()?;
//! let reader = LoftyTagReader::new();
//! let remote = paths.cloud_dir.map(FolderRemoteStorage::new);
//! ```

mod folder_remote;
mod http;
mod paths;
mod secure_store;
mod tag_reader;

pub use folder_remote::FolderRemoteStorage;
pub use http::ReqwestHttpClient;
pub use paths::DesktopPaths;
pub use secure_store::FileSecureStore;
pub use tag_reader::LoftyTagReader;
