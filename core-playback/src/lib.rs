//! # Playback Module
//!
//! One player state machine over interchangeable native engines.
//!
//! ## Overview
//!
//! This module handles:
//! - The [`PlaybackEngine`] contract and its three native adapters
//! - [`UnifiedPlayer`], which owns the queue and publishes [`PlayerSnapshot`]s
//! - [`SleepTimer`] for stopping playback after a delay
//! - [`LyricsFollower`] for tracking the active synced-lyrics line

pub mod engine;
pub mod engines;
pub mod error;
pub mod lyrics_follow;
pub mod player;
pub mod sleep_timer;
pub mod types;

pub use engine::{EngineEvent, PlaybackEngine};
pub use engines::{DesktopEngine, FrameworkEngine, SessionEngine};
pub use error::{PlaybackError, Result};
pub use lyrics_follow::LyricsFollower;
pub use player::{PlayerConfig, UnifiedPlayer};
pub use sleep_timer::{PlaybackControl, SleepTimer};
pub use types::{PlayerSnapshot, PlayerState, QueueItem};
