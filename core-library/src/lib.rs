//! # Core Library
//!
//! Local library state for the engine:
//! - [`MetadataStore`] and [`MetadataIndexer`]: the path → tag record map and
//!   its reconciliation against the music folder
//! - [`PlaylistStore`]: named, ordered track lists
//! - [`LibraryCache`]: the sorted listing shown by the library browser
//! - [`ArtworkCache`]: cover images extracted from tags
//!
//! All documents are JSON, written atomically, and read leniently: a missing
//! or corrupt document loads as empty.

pub mod artwork;
pub mod document;
pub mod error;
pub mod indexer;
pub mod library_cache;
pub mod metadata_store;
pub mod models;
pub mod playlist_store;
pub mod scan;

pub use artwork::ArtworkCache;
pub use error::{LibraryError, Result};
pub use indexer::MetadataIndexer;
pub use library_cache::LibraryCache;
pub use metadata_store::MetadataStore;
pub use models::{LibraryEntry, MetadataMap, Playlists, RebuildSummary, TrackRecord};
pub use playlist_store::{PlaylistBuilder, PlaylistStore};
