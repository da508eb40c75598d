//! # Player Types
//!
//! Values published by the unified player. Observers receive whole
//! [`PlayerSnapshot`]s, so state, position and queue are always read
//! together.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Queue Types
// ============================================================================

/// One entry of the playback queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Library track id or any caller-chosen id
    pub id: String,
    pub content_uri: String,
    pub title: String,
    /// Known duration, if any; the engine may report it later
    pub duration_ms: Option<u64>,
}

impl QueueItem {
    pub fn new(
        id: impl Into<String>,
        content_uri: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            content_uri: content_uri.into(),
            title: title.into(),
            duration_ms: None,
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

// ============================================================================
// State Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum PlayerState {
    /// Nothing loaded, or stopped
    #[default]
    Idle,
    /// Item loaded, not yet playing
    Ready,
    Playing,
    Paused,
    /// The last item finished
    Ended,
    /// The engine failed; queue and position are kept
    Error(String),
}

impl PlayerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerState::Idle => "idle",
            PlayerState::Ready => "ready",
            PlayerState::Playing => "playing",
            PlayerState::Paused => "paused",
            PlayerState::Ended => "ended",
            PlayerState::Error(_) => "error",
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, PlayerState::Playing)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PlayerState::Error(_))
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerState::Error(reason) => write!(f, "error: {}", reason),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Consistent view of the player at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlayerSnapshot {
    pub state: PlayerState,
    pub position_ms: u64,
    /// Duration of the current item; 0 while unknown
    pub duration_ms: u64,
    pub queue: Arc<Vec<QueueItem>>,
    pub current_index: Option<usize>,
}

impl PlayerSnapshot {
    pub fn current_item(&self) -> Option<&QueueItem> {
        self.current_index.and_then(|i| self.queue.get(i))
    }

    pub fn has_next(&self) -> bool {
        self.current_index
            .map_or(false, |i| i + 1 < self.queue.len())
    }
}
