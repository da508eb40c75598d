//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by every core crate:
//! - Logging and tracing setup
//! - Configuration (`CoreConfig`) with scanner and engine selection
//! - Event bus
//!
//! Nothing in here knows about tracks or players beyond the event payloads.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
