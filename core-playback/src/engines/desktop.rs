//! Adapter over a single-media desktop player
//!
//! The native player knows one media at a time, so the adapter keeps the
//! queue's URIs and opens the current one on load and skip.

use crate::engine::{check_index, EngineEvent, EventChannel, PlaybackEngine};
use crate::error::{PlaybackError, Result};
use crate::types::QueueItem;
use async_trait::async_trait;
use bridge_traits::{DesktopEvent, DesktopPlayer};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

pub struct DesktopEngine {
    player: Arc<dyn DesktopPlayer>,
    events: EventChannel,
    uris: Mutex<Vec<String>>,
    current: Arc<AtomicUsize>,
    playing: AtomicBool,
}

impl DesktopEngine {
    pub fn new(player: Arc<dyn DesktopPlayer>) -> Self {
        let events = EventChannel::new();
        let current = Arc::new(AtomicUsize::new(0));

        let sender = events.sender();
        let index = Arc::clone(&current);
        player.set_event_handler(Box::new(move |event| {
            let index = index.load(Ordering::SeqCst);
            match event {
                DesktopEvent::LengthChanged(duration_ms) => {
                    sender.send(EngineEvent::Prepared { index, duration_ms })
                }
                DesktopEvent::TimeChanged(position_ms) => {
                    sender.send(EngineEvent::Position(position_ms))
                }
                DesktopEvent::EndReached => sender.send(EngineEvent::Completed { index }),
                DesktopEvent::EncounteredError(reason) => sender.send(EngineEvent::Error(reason)),
                other => debug!(event = ?other, "Ignoring desktop player event"),
            }
        }));

        Self {
            player,
            events,
            uris: Mutex::new(Vec::new()),
            current,
            playing: AtomicBool::new(false),
        }
    }

    fn uri_at(&self, index: usize) -> Result<String> {
        let uris = self.uris.lock();
        uris.get(index)
            .cloned()
            .ok_or(PlaybackError::IndexOutOfRange {
                index,
                len: uris.len(),
            })
    }
}

#[async_trait]
impl PlaybackEngine for DesktopEngine {
    fn name(&self) -> &'static str {
        "desktop"
    }

    async fn load(&self, items: &[QueueItem], start_index: usize) -> Result<()> {
        check_index(start_index, items.len())?;
        *self.uris.lock() = items.iter().map(|i| i.content_uri.clone()).collect();
        self.current.store(start_index, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);

        let uri = self.uri_at(start_index)?;
        Ok(self.player.open(&uri).await?)
    }

    async fn play(&self) -> Result<()> {
        self.player.play().await?;
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.player.pause().await?;
        self.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.player.stop().await?;
        self.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn seek(&self, position_ms: u64) -> Result<()> {
        Ok(self.player.set_time(position_ms).await?)
    }

    async fn skip_to(&self, index: usize) -> Result<()> {
        let uri = self.uri_at(index)?;
        self.current.store(index, Ordering::SeqCst);
        self.player.open(&uri).await?;
        if self.playing.load(Ordering::SeqCst) {
            self.player.play().await?;
        }
        Ok(())
    }

    async fn set_queue(&self, items: &[QueueItem], current: usize) -> Result<()> {
        check_index(current, items.len())?;
        *self.uris.lock() = items.iter().map(|i| i.content_uri.clone()).collect();
        self.current.store(current, Ordering::SeqCst);
        Ok(())
    }

    fn position_ms(&self) -> u64 {
        self.player.time_ms()
    }

    fn take_events(&self) -> Result<mpsc::UnboundedReceiver<EngineEvent>> {
        self.events.take()
    }
}
