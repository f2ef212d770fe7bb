//! # Core Sync
//!
//! Everything that compares local state with a remote copy and moves data
//! between them:
//!
//! - [`diff`]: playlist and song classification (read-only)
//! - [`transfer`]: whole-artifact upload/download with a single
//!   refresh-and-retry on credential expiry
//! - [`song_sync`]: per-file copying of a song diff, cancellable between files
//! - [`http_remote`]: a plain HTTP [`RemoteStorage`](bridge_traits::RemoteStorage)
//! - [`status`]: the sync status view

pub mod diff;
pub mod error;
pub mod http_remote;
pub mod song_sync;
pub mod status;
pub mod transfer;

pub use diff::{diff_playlists, diff_songs, PlaylistDiff, SongDiff, SyncDecision};
pub use error::{Result, SyncError};
pub use http_remote::HttpRemoteStorage;
pub use song_sync::{CopyDirection, FailedCopy, SongSyncReport, SongSyncer};
pub use status::{compute_status, StatusSources, SyncStatus};
pub use transfer::{DownloadReceipt, TransferClient, UploadReceipt};
