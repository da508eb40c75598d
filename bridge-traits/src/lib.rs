//! # Host Bridge Traits
//!
//! Capabilities the core needs from the host platform but cannot implement
//! portably. Each host ships adapters for the traits it supports.
//!
//! ## Traits
//!
//! ### Media sources
//! - [`MediaStoreQuery`](media_store::MediaStoreQuery) - Device media index
//! - [`ContentObserver`](observer::ContentObserver) - Content change notifications
//! - [`RemoteCatalog`](catalog::RemoteCatalog) - Remote track listing
//!
//! ### Native players
//! - [`MediaSessionPlayer`](playback::MediaSessionPlayer) - Queue-based session player
//! - [`DesktopPlayer`](playback::DesktopPlayer) - Single-media desktop player
//! - [`FrameworkPlayer`](playback::FrameworkPlayer) - Item/rate player framework
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Wall-clock source for persisted timestamps
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Hosts convert
//! platform errors into it and keep the message actionable.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`. Listener callbacks may be invoked
//! from host threads at any time.

pub mod catalog;
pub mod error;
pub mod media_store;
pub mod observer;
pub mod playback;
pub mod time;

pub use error::BridgeError;

pub use catalog::{RemoteCatalog, RemoteTrack, RemoteTrackPage};
pub use media_store::{MediaStoreAudioRow, MediaStoreQuery, MediaStoreRows, MediaStoreVideoRow};
pub use observer::{ChangeCallback, ContentClass, ContentObserver, RegistrationId};
pub use playback::{
    DesktopEvent, DesktopPlayer, EventListener, FrameworkEvent, FrameworkPlayer, ItemStatus,
    MediaSessionPlayer, SessionEvent, SessionMediaItem, SessionPlaybackState, TransitionReason,
};
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
