//! # Playback Engine Contract
//!
//! The normalized control surface every native player adapter implements.
//! Native players differ in shape (a queue-owning session player, a
//! single-media desktop player, an item/rate framework player); adapters
//! hide that behind one command set and one event vocabulary.
//!
//! ## Events
//!
//! Native callbacks arrive on host threads. Adapters translate them into
//! [`EngineEvent`]s on an unbounded channel; the unified player is the only
//! consumer.
//!
//! ## Queue ownership
//!
//! Queue advancement belongs to the unified player. An adapter reports the
//! end of an item as [`EngineEvent::Completed`] and moves to another item only
//! when told to via [`PlaybackEngine::skip_to`].

use crate::error::{PlaybackError, Result};
use crate::types::QueueItem;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

/// Normalized native event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The item at `index` is ready and its duration is known
    Prepared { index: usize, duration_ms: u64 },
    Position(u64),
    /// The item at `index` played to its natural end
    Completed { index: usize },
    Error(String),
}

#[async_trait]
pub trait PlaybackEngine: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Replace the queue and prepare `items[start_index]`, paused at 0
    async fn load(&self, items: &[QueueItem], start_index: usize) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// Seek within the current item
    async fn seek(&self, position_ms: u64) -> Result<()>;

    /// Make `index` the current item at position 0, keeping play/pause
    async fn skip_to(&self, index: usize) -> Result<()>;

    /// Replace the queue while `items[current]` keeps playing
    async fn set_queue(&self, items: &[QueueItem], current: usize) -> Result<()>;

    fn position_ms(&self) -> u64;

    /// Hand out the event receiver. Only the first call succeeds.
    fn take_events(&self) -> Result<mpsc::UnboundedReceiver<EngineEvent>>;
}

#[async_trait]
impl<T: PlaybackEngine + ?Sized> PlaybackEngine for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn load(&self, items: &[QueueItem], start_index: usize) -> Result<()> {
        (**self).load(items, start_index).await
    }

    async fn play(&self) -> Result<()> {
        (**self).play().await
    }

    async fn pause(&self) -> Result<()> {
        (**self).pause().await
    }

    async fn stop(&self) -> Result<()> {
        (**self).stop().await
    }

    async fn seek(&self, position_ms: u64) -> Result<()> {
        (**self).seek(position_ms).await
    }

    async fn skip_to(&self, index: usize) -> Result<()> {
        (**self).skip_to(index).await
    }

    async fn set_queue(&self, items: &[QueueItem], current: usize) -> Result<()> {
        (**self).set_queue(items, current).await
    }

    fn position_ms(&self) -> u64 {
        (**self).position_ms()
    }

    fn take_events(&self) -> Result<mpsc::UnboundedReceiver<EngineEvent>> {
        (**self).take_events()
    }
}

/// Event channel shared by the adapters
pub(crate) struct EventChannel {
    tx: mpsc::UnboundedSender<EngineEvent>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<EngineEvent>>>,
}

impl EventChannel {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    pub(crate) fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
        }
    }

    pub(crate) fn take(&self) -> Result<mpsc::UnboundedReceiver<EngineEvent>> {
        self.rx.lock().take().ok_or(PlaybackError::EventsTaken)
    }
}

/// Handle given to native listener callbacks
#[derive(Clone)]
pub(crate) struct EventSender {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EventSender {
    pub(crate) fn send(&self, event: EngineEvent) {
        if self.tx.send(event).is_err() {
            trace!("Engine event dropped; player is gone");
        }
    }
}

/// Queue index check shared by the adapters
pub(crate) fn check_index(index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(PlaybackError::IndexOutOfRange { index, len })
    }
}
