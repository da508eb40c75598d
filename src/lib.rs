//! Workspace placeholder crate.
//!
//! This crate exposes feature flags that map to the individual workspace
//! crates (`core-service`, `core-sync`, `core-playback`, `core-metadata`).
//! Host applications can depend on `resonance-workspace` and enable the
//! documented features without wiring each crate individually.

#[cfg(feature = "service")]
pub use core_service as service;

#[cfg(feature = "sync")]
pub use core_sync as sync;

#[cfg(feature = "playback")]
pub use core_playback as playback;

#[cfg(feature = "lyrics")]
pub use core_metadata::lyrics;
