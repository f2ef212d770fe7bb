//! # Backup Retention
//!
//! Timestamped snapshots of the engine's artifacts (metadata document,
//! playlist document, library listing, artwork directory) and bounded
//! retention per artifact prefix.
//!
//! The same [`RetentionManager`] type serves the local backup directory
//! (keep 10) and the cloud mirror folder (keep 2); only the directory and the
//! `keep` argument differ.

pub mod error;
pub mod retention;
pub mod snapshot;

pub use error::{BackupError, Result};
pub use retention::{
    CleanupReport, EnforceReport, FsSnapshotRemover, RetentionManager, SnapshotRemover,
};
pub use snapshot::{Snapshot, SnapshotKind};

/// Artifact prefixes used by the engine.
pub mod prefixes {
    pub const METADATA: &str = "metadata";
    pub const PLAYLISTS: &str = "playlists";
    pub const LIBRARY: &str = "library";
    pub const ARTWORK: &str = "artwork";
    /// Local playlist document replaced by a download
    pub const PLAYLIST_LOCAL: &str = "playlist_local";

    /// Prefixes mirrored to, and cleaned up in, the cloud folder.
    pub const CLOUD: &[&str] = &[LIBRARY, METADATA, PLAYLISTS, ARTWORK];
}
