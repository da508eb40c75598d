//! # Event Bus System
//!
//! Typed, broadcast-based notifications between core components and the host,
//! built on `tokio::sync::broadcast`.
//!
//! ```text
//! ┌──────────────┐     emit      ┌───────────┐
//! │ LibrarySyncer├──────────────>│           │     subscribe    ┌────────────┐
//! └──────────────┘               │ EventBus  ├─────────────────>│ Subscriber │
//! ┌──────────────┐     emit      │ (broadcast│                  └────────────┘
//! │ UnifiedPlayer├──────────────>│  channel) │
//! └──────────────┘               └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Sync(SyncEvent::Started {
//!         run_id: "run-1".to_string(),
//!         source_id: "device".to_string(),
//!         scope: "full".to_string(),
//!     }))
//!     .ok();
//!
//! assert!(matches!(subscriber.recv().await, Ok(CoreEvent::Sync(_))));
//! # }
//! ```
//!
//! ## Event Types
//!
//! - [`SyncEvent`]: sync run lifecycle (`Started`, `Completed`, `Failed`)
//! - [`LibraryEvent`]: committed library deltas
//! - [`PlaybackEvent`]: player state transitions, item changes, sleep timer
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell behind and missed `n`
//!   events. Non-fatal.
//! - **`RecvError::Closed`**: every sender was dropped; treat as shutdown.
//!
//! Emitters ignore the "no subscribers" error with `.ok()`: events are
//! notifications, never part of a component's correctness.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Sync(SyncEvent),
    Library(LibraryEvent),
    Playback(PlaybackEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Playback(PlaybackEvent::SleepTimerFired) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

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

/// Library sync run lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    Started {
        run_id: String,
        source_id: String,
        /// `"full"` or `"scoped"`
        scope: String,
    },
    Completed {
        run_id: String,
        source_id: String,
        added: u64,
        updated: u64,
        deleted: u64,
        unchanged: u64,
        skipped: u64,
        duration_ms: u64,
    },
    /// The run failed or was cancelled; nothing was committed.
    Failed {
        run_id: String,
        source_id: String,
        message: String,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Sync started",
            SyncEvent::Completed { .. } => "Sync completed successfully",
            SyncEvent::Failed { .. } => "Sync failed",
        }
    }
}

// ============================================================================
// Library Events
// ============================================================================

/// Committed library changes, emitted after the sync transaction commits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    TrackAdded {
        track_id: String,
        content_uri: String,
        title: String,
    },
    TrackUpdated {
        track_id: String,
        content_uri: String,
    },
    TrackDeleted {
        track_id: String,
        content_uri: String,
    },
    /// Albums, artists and genres left without tracks were removed.
    EntitiesCollected {
        albums: u64,
        artists: u64,
        genres: u64,
    },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::TrackAdded { .. } => "Track added to library",
            LibraryEvent::TrackUpdated { .. } => "Track updated",
            LibraryEvent::TrackDeleted { .. } => "Track removed from library",
            LibraryEvent::EntitiesCollected { .. } => "Orphaned entities collected",
        }
    }
}

// ============================================================================
// Playback Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// The player entered a new state (`idle`, `ready`, `playing`, ...).
    StateChanged {
        state: String,
        item_id: Option<String>,
    },
    /// The current queue item changed.
    ItemChanged { item_id: String, index: usize },
    Seeked { position_ms: u64 },
    /// An item finished playing.
    Completed { item_id: String },
    Error { message: String },
    SleepTimerStarted { duration_ms: u64 },
    SleepTimerCancelled,
    SleepTimerFired,
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::StateChanged { .. } => "Player state changed",
            PlaybackEvent::ItemChanged { .. } => "Queue item changed",
            PlaybackEvent::Seeked { .. } => "Playback position moved",
            PlaybackEvent::Completed { .. } => "Item completed",
            PlaybackEvent::Error { .. } => "Playback error",
            PlaybackEvent::SleepTimerStarted { .. } => "Sleep timer started",
            PlaybackEvent::SleepTimerCancelled => "Sleep timer cancelled",
            PlaybackEvent::SleepTimerFired => "Sleep timer stopped playback",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus.
///
/// Cheap to clone; every clone publishes into the same channel. Slow
/// subscribers receive `RecvError::Lagged` but never block emitters.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a bus buffering at most `capacity` events per subscriber.
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
// Filtered Subscriptions
// ============================================================================

/// Event family, for subscribers that only care about one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    Sync,
    Library,
    Playback,
}

impl CoreEvent {
    pub fn category(&self) -> EventCategory {
        match self {
            CoreEvent::Sync(_) => EventCategory::Sync,
            CoreEvent::Library(_) => EventCategory::Library,
            CoreEvent::Playback(_) => EventCategory::Playback,
        }
    }
}

/// Subscription limited to some event categories.
///
/// ```rust
/// use core_runtime::events::{EventBus, EventCategory, EventStream};
///
/// let bus = EventBus::new(100);
/// let library_changes = EventStream::new(bus.subscribe(), &[EventCategory::Sync, EventCategory::Library]);
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    categories: Vec<EventCategory>,
}

impl EventStream {
    /// An empty category list accepts everything.
    pub fn new(receiver: Receiver<CoreEvent>, categories: &[EventCategory]) -> Self {
        Self {
            receiver,
            categories: categories.to_vec(),
        }
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.categories.is_empty() || self.categories.contains(&event.category())
    }

    /// Next accepted event. A lagged subscriber gets `Lagged(n)` once, then
    /// continues with the oldest retained event.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Next buffered accepted event, or `None` when nothing is buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        use broadcast::error::TryRecvError;

        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(Ok(event)),
                Ok(_) => {}
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Lagged(n)) => return Some(Err(RecvError::Lagged(n))),
                Err(TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("categories", &self.categories)
            .finish()
    }
}
