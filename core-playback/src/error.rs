//! # Playback Error Types
//!
//! Errors returned by player control operations and engine adapters.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Queue Errors
    // ========================================================================
    /// `load` was called with no items.
    #[error("Queue is empty")]
    EmptyQueue,

    /// Queue index does not exist.
    #[error("Queue index {index} out of range (queue length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Attempted operation when no item is loaded.
    #[error("No item loaded")]
    NoItemLoaded,

    // ========================================================================
    // Player State Errors
    // ========================================================================
    /// The player is in `Error`; only `load` leaves it.
    #[error("Player is in error state: {0}")]
    PlayerFailed(String),

    // ========================================================================
    // Engine Errors
    // ========================================================================
    /// The native engine rejected a command.
    #[error("Engine error: {0}")]
    Engine(String),

    /// The engine's event receiver was already handed out.
    #[error("Engine events already taken")]
    EventsTaken,

    /// Bridge call failed.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

impl PlaybackError {
    /// Returns `true` if the error came from the native engine rather than
    /// from a misuse of the player.
    pub fn is_engine_error(&self) -> bool {
        matches!(self, PlaybackError::Engine(_) | PlaybackError::Bridge(_))
    }

    /// Reason shown in `PlayerState::Error`.
    pub fn reason(&self) -> String {
        match self {
            PlaybackError::Engine(reason) => reason.clone(),
            PlaybackError::Bridge(e) => e.to_string(),
            other => other.to_string(),
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
