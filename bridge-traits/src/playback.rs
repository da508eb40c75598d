//! Native Player Surfaces
//!
//! The three native engine shapes the core drives. Each host implements the
//! one matching its platform; `core-playback` adapts it to a single engine
//! contract. Native events are delivered through a listener callback on a
//! host-owned thread.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Listener the host invokes for every native event.
pub type EventListener<E> = Box<dyn Fn(E) + Send + Sync>;

// ============================================================================
// Queue-based media session player (Media3/ExoPlayer style)
// ============================================================================

/// Item handed to the session player's native queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMediaItem {
    pub media_id: String,
    pub uri: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPlaybackState {
    Idle,
    Buffering,
    Ready,
    Ended,
}

/// Why the session player moved to another queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionReason {
    /// The previous item finished playing.
    Auto,
    /// An explicit seek to another item.
    Seek,
    Repeat,
    /// The queue itself was replaced.
    PlaylistChanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    PlaybackStateChanged(SessionPlaybackState),
    IsPlayingChanged(bool),
    MediaItemTransition {
        /// Index of the item now current.
        index: usize,
        reason: TransitionReason,
    },
    /// Duration of the current item became known.
    DurationKnown { index: usize, duration_ms: u64 },
    PlayerError { code: i32, message: String },
}

/// Media session player owning a native queue.
#[async_trait]
pub trait MediaSessionPlayer: Send + Sync {
    async fn set_media_items(&self, items: Vec<SessionMediaItem>, start_index: usize) -> Result<()>;

    async fn prepare(&self) -> Result<()>;

    async fn set_play_when_ready(&self, play_when_ready: bool) -> Result<()>;

    async fn seek_to(&self, index: usize, position_ms: u64) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// Enable or disable advancing to the next queue item on completion.
    async fn set_auto_advance(&self, enabled: bool) -> Result<()>;

    fn current_index(&self) -> usize;

    fn current_position_ms(&self) -> u64;

    fn set_listener(&self, listener: EventListener<SessionEvent>);
}

// ============================================================================
// Desktop native player (single media, VLC style)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DesktopEvent {
    Opening,
    Playing,
    Paused,
    Stopped,
    /// The media length became known.
    LengthChanged(u64),
    TimeChanged(u64),
    EndReached,
    EncounteredError(String),
}

/// Desktop player that plays one media at a time.
#[async_trait]
pub trait DesktopPlayer: Send + Sync {
    /// Open a media location, replacing whatever was loaded.
    async fn open(&self, uri: &str) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    async fn set_time(&self, position_ms: u64) -> Result<()>;

    fn time_ms(&self) -> u64;

    fn set_event_handler(&self, handler: EventListener<DesktopEvent>);
}

// ============================================================================
// OS player framework (AVPlayer style)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemStatus {
    Unknown,
    ReadyToPlay,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameworkEvent {
    ItemStatusChanged(ItemStatus),
    /// Periodic time observer callback.
    PeriodicTime(u64),
    DidPlayToEnd,
    FailedToPlayToEnd(String),
}

/// Player framework driven by item replacement and playback rate.
#[async_trait]
pub trait FrameworkPlayer: Send + Sync {
    /// Replace the current item; `None` clears it.
    async fn replace_current_item(&self, uri: Option<&str>) -> Result<()>;

    /// `1.0` plays, `0.0` pauses.
    async fn set_rate(&self, rate: f32) -> Result<()>;

    async fn seek(&self, position_ms: u64) -> Result<()>;

    fn current_time_ms(&self) -> u64;

    /// Duration of the current item once it is ready.
    fn item_duration_ms(&self) -> Option<u64>;

    fn add_observer(&self, observer: EventListener<FrameworkEvent>);
}
