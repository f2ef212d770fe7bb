//! # Event Bus System
//!
//! Decoupled notifications between the engine modules and the host, built on
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: one enum per domain (library, backup, sync, auth) wrapped
//!   in [`CoreEvent`]
//! - **EventBus**: cloneable broadcast sender
//! - **EventStream**: receiver wrapper with predicate filtering
//!
//! ```text
//! ┌──────────────┐    emit    ┌──────────┐  subscribe  ┌────────────┐
//! │ Indexer      ├───────────>│          ├────────────>│ Status bar │
//! ├──────────────┤            │ EventBus │             └────────────┘
//! │ Retention    ├───────────>│          │  subscribe  ┌────────────┐
//! ├──────────────┤            │          ├────────────>│ Sync view  │
//! │ Transfer     ├───────────>│          │             └────────────┘
//! └──────────────┘            └──────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{BackupEvent, CoreEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Backup(BackupEvent::SnapshotCreated {
//!         prefix: "metadata".to_string(),
//!         name: "metadata_backup_2024-05-01_12-00-00.json".to_string(),
//!     }))
//!     .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Backup(_)));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! `emit` fails only when nobody is subscribed; emitters ignore that case.
//! Slow subscribers get `RecvError::Lagged(n)` and can keep receiving;
//! `RecvError::Closed` means every sender was dropped.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published through the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Library(LibraryEvent),
    Backup(BackupEvent),
    Sync(SyncEvent),
    Auth(AuthEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Library(e) => e.description(),
            CoreEvent::Backup(e) => e.description(),
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Auth(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::AuthError { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Backup(BackupEvent::SnapshotFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Backup(BackupEvent::RetentionEnforced { failed, .. }) if *failed > 0 => {
                EventSeverity::Warning
            }
            CoreEvent::Library(LibraryEvent::TrackUnreadable { .. }) => EventSeverity::Warning,
            CoreEvent::Library(LibraryEvent::RebuildCompleted { .. }) => EventSeverity::Info,
            CoreEvent::Sync(SyncEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Auth(AuthEvent::TokenRefreshed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Library Events
// ============================================================================

/// Events from the metadata indexer and the playlist store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    RebuildStarted {
        root: String,
    },
    /// A file whose tags could not be read was indexed with a filename-only record.
    TrackUnreadable {
        path: String,
        reason: String,
    },
    RebuildCompleted {
        total: usize,
        new_count: usize,
        removed_count: usize,
    },
    PlaylistCreated {
        name: String,
    },
    PlaylistDeleted {
        name: String,
    },
    PlaylistSaved {
        name: String,
        track_count: usize,
    },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::RebuildStarted { .. } => "Library rebuild started",
            LibraryEvent::TrackUnreadable { .. } => "Track tags unreadable",
            LibraryEvent::RebuildCompleted { .. } => "Library rebuild completed",
            LibraryEvent::PlaylistCreated { .. } => "Playlist created",
            LibraryEvent::PlaylistDeleted { .. } => "Playlist deleted",
            LibraryEvent::PlaylistSaved { .. } => "Playlist saved",
        }
    }
}

// ============================================================================
// Backup Events
// ============================================================================

/// Events from the backup retention manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum BackupEvent {
    SnapshotCreated {
        prefix: String,
        name: String,
    },
    SnapshotFailed {
        prefix: String,
        message: String,
    },
    RetentionEnforced {
        prefix: String,
        kept: usize,
        deleted: usize,
        failed: usize,
    },
}

impl BackupEvent {
    fn description(&self) -> &str {
        match self {
            BackupEvent::SnapshotCreated { .. } => "Backup snapshot created",
            BackupEvent::SnapshotFailed { .. } => "Backup snapshot failed",
            BackupEvent::RetentionEnforced { .. } => "Backup retention enforced",
        }
    }
}

// ============================================================================
// Sync Events
// ============================================================================

/// Events from transfers and background sync jobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    Started {
        job_id: String,
        /// What the job does ("rebuild", "song_sync", "upload", ...)
        kind: String,
    },
    Progress {
        job_id: String,
        processed: u64,
        total: Option<u64>,
    },
    Uploaded {
        remote_path: String,
        bytes: u64,
    },
    Downloaded {
        remote_path: String,
        bytes: u64,
    },
    Completed {
        job_id: String,
        succeeded: u64,
        failed: u64,
    },
    Failed {
        job_id: String,
        message: String,
    },
    Cancelled {
        job_id: String,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Sync job started",
            SyncEvent::Progress { .. } => "Sync progress",
            SyncEvent::Uploaded { .. } => "Artifact uploaded",
            SyncEvent::Downloaded { .. } => "Artifact downloaded",
            SyncEvent::Completed { .. } => "Sync job completed",
            SyncEvent::Failed { .. } => "Sync job failed",
            SyncEvent::Cancelled { .. } => "Sync job cancelled",
        }
    }
}

// ============================================================================
// Authentication Events
// ============================================================================

/// Events from the credential manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// A cached credential was accepted without user interaction.
    CredentialLoaded,
    TokenRefreshing,
    TokenRefreshed {
        /// Unix epoch seconds, if the remote reported an expiry
        expires_at: Option<i64>,
    },
    SignedOut,
    AuthError {
        message: String,
        recoverable: bool,
    },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::CredentialLoaded => "Cached credential loaded",
            AuthEvent::TokenRefreshing => "Refreshing access token",
            AuthEvent::TokenRefreshed { .. } => "Token refreshed successfully",
            AuthEvent::SignedOut => "Credential cleared",
            AuthEvent::AuthError { .. } => "Authentication error",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel. Cheap to clone; every clone publishes into the
/// same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let backups_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Backup(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv`/`try_recv`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching event is currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
