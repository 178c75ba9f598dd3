//! # Event Bus System
//!
//! Typed events for the playlist sync engine on top of `tokio::sync::broadcast`.
//!
//! Every public operation of a playlist sync service publishes one event
//! when it finishes, so a host UI can refresh without polling. Subscribers
//! that only care about one playlist wrap their receiver in an
//! [`EventStream`] scoped with [`EventStream::for_playlist`].
//!
//! ## Usage
//!
//! ```rust
//! use bridge_traits::PlatformKind;
//! use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Sync(SyncEvent::Failed {
//!         playlist_id: 1,
//!         platform: PlatformKind::Spotify,
//!         message: "Not authenticated".to_string(),
//!     }))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Sync(SyncEvent::Failed { .. })));
//! # }
//! ```
//!
//! A lagging subscriber gets `RecvError::Lagged(n)` and may keep
//! receiving. Emitting with no subscribers returns `Err`; publishers in this
//! workspace ignore it.

use bridge_traits::PlatformKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

pub use crate::config::DEFAULT_EVENT_BUFFER_SIZE;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Playlist sync events
    Sync(SyncEvent),
    /// Library content events
    Library(LibraryEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
        }
    }

    /// Local playlist the event is about, if any
    pub fn playlist_id(&self) -> Option<i64> {
        match self {
            CoreEvent::Sync(SyncEvent::PreviewReady { playlist_id, .. })
            | CoreEvent::Sync(SyncEvent::Applied { playlist_id, .. })
            | CoreEvent::Sync(SyncEvent::SnapshotSaved { playlist_id, .. })
            | CoreEvent::Sync(SyncEvent::Failed { playlist_id, .. })
            | CoreEvent::Library(LibraryEvent::PlaylistImported { playlist_id, .. })
            | CoreEvent::Library(LibraryEvent::PlaylistExported { playlist_id, .. }) => {
                Some(*playlist_id)
            }
            CoreEvent::Library(LibraryEvent::TrackImported { .. }) => None,
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::Applied { success: false, .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::Applied { .. }) => EventSeverity::Info,
            CoreEvent::Library(LibraryEvent::PlaylistImported { .. })
            | CoreEvent::Library(LibraryEvent::PlaylistExported { .. }) => EventSeverity::Info,
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
// Sync Events
// ============================================================================

/// Events emitted while diffing and applying playlist changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// A change set was computed and cached for apply.
    PreviewReady {
        playlist_id: i64,
        platform: PlatformKind,
        platform_additions: usize,
        platform_removals: usize,
        library_additions: usize,
        library_removals: usize,
        /// True when the change set carries inline errors
        has_errors: bool,
    },
    /// A selection of changes was applied.
    Applied {
        playlist_id: i64,
        platform: PlatformKind,
        platform_added: usize,
        platform_removed: usize,
        library_added: usize,
        library_removed: usize,
        warnings: usize,
        success: bool,
    },
    /// The stored snapshot for a playlist link was replaced.
    SnapshotSaved {
        playlist_id: i64,
        platform: PlatformKind,
        platform_tracks: usize,
        library_tracks: usize,
    },
    /// A sync operation could not run at all.
    Failed {
        playlist_id: i64,
        platform: PlatformKind,
        message: String,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::PreviewReady { .. } => "Sync preview ready",
            SyncEvent::Applied { .. } => "Sync changes applied",
            SyncEvent::SnapshotSaved { .. } => "Sync snapshot saved",
            SyncEvent::Failed { .. } => "Sync failed",
        }
    }
}

// ============================================================================
// Library Events
// ============================================================================

/// Events related to library content changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    /// An external track was resolved to a local track.
    TrackImported {
        track_id: i64,
        platform: PlatformKind,
        title: String,
        artist: String,
        /// False when an existing track was matched and merged
        created: bool,
    },
    /// A remote playlist was imported into a local playlist.
    PlaylistImported {
        playlist_id: i64,
        platform: PlatformKind,
        external_playlist_id: String,
        imported: usize,
        failed: usize,
    },
    /// A local playlist was pushed to a platform.
    PlaylistExported {
        playlist_id: i64,
        platform: PlatformKind,
        external_playlist_id: String,
        exported: usize,
        skipped: usize,
    },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::TrackImported { .. } => "Track imported",
            LibraryEvent::PlaylistImported { .. } => "Playlist imported",
            LibraryEvent::PlaylistExported { .. } => "Playlist exported",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event broadcasting hub.
///
/// Cloning an `EventBus` yields another handle to the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// A subscriber that falls behind by more than `capacity` events receives
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    ///
    /// ```rust
    /// use core_runtime::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.subscriber_count(), 0);
    ///
    /// let _subscriber = event_bus.subscribe();
    /// assert_eq!(event_bus.subscriber_count(), 1);
    /// ```
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

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let sync_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Sync(_)));
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

    /// Only events matching `predicate` are returned by `recv()`/`try_recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Only events about `playlist_id`
    pub fn for_playlist(self, playlist_id: i64) -> Self {
        self.filter(move |event| event.playlist_id() == Some(playlist_id))
    }

    fn matches(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Next buffered matching event, `None` when nothing matching is buffered
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        use broadcast::error::TryRecvError;

        loop {
            let event = match self.receiver.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Lagged(n)) => return Some(Err(RecvError::Lagged(n))),
                Err(TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            };
            if self.matches(&event) {
                return Some(Ok(event));
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
