//! Adapter over an item/rate player framework
//!
//! Playback is driven by replacing the current item and setting the rate
//! (`1.0` plays, `0.0` pauses). Readiness arrives as an item status; the
//! duration is read from the player at that point.

use crate::engine::{check_index, EngineEvent, EventChannel, PlaybackEngine};
use crate::error::{PlaybackError, Result};
use crate::types::QueueItem;
use async_trait::async_trait;
use bridge_traits::{FrameworkEvent, FrameworkPlayer, ItemStatus};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

const PLAYING_RATE: f32 = 1.0;
const PAUSED_RATE: f32 = 0.0;

pub struct FrameworkEngine {
    player: Arc<dyn FrameworkPlayer>,
    events: EventChannel,
    uris: Mutex<Vec<String>>,
    current: Arc<AtomicUsize>,
    playing: AtomicBool,
}

impl FrameworkEngine {
    pub fn new(player: Arc<dyn FrameworkPlayer>) -> Self {
        let events = EventChannel::new();
        let current = Arc::new(AtomicUsize::new(0));

        let sender = events.sender();
        let index = Arc::clone(&current);
        // Weak: the observer is owned by the player it reads from.
        let native = Arc::downgrade(&player);
        player.add_observer(Box::new(move |event| {
            let index = index.load(Ordering::SeqCst);
            match event {
                FrameworkEvent::ItemStatusChanged(ItemStatus::ReadyToPlay) => {
                    let duration_ms = native
                        .upgrade()
                        .and_then(|p| p.item_duration_ms())
                        .unwrap_or(0);
                    sender.send(EngineEvent::Prepared { index, duration_ms })
                }
                FrameworkEvent::ItemStatusChanged(ItemStatus::Failed(reason))
                | FrameworkEvent::FailedToPlayToEnd(reason) => {
                    sender.send(EngineEvent::Error(reason))
                }
                FrameworkEvent::PeriodicTime(position_ms) => {
                    sender.send(EngineEvent::Position(position_ms))
                }
                FrameworkEvent::DidPlayToEnd => sender.send(EngineEvent::Completed { index }),
                other => debug!(event = ?other, "Ignoring framework player event"),
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
impl PlaybackEngine for FrameworkEngine {
    fn name(&self) -> &'static str {
        "framework"
    }

    async fn load(&self, items: &[QueueItem], start_index: usize) -> Result<()> {
        check_index(start_index, items.len())?;
        *self.uris.lock() = items.iter().map(|i| i.content_uri.clone()).collect();
        self.current.store(start_index, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);

        let uri = self.uri_at(start_index)?;
        self.player.set_rate(PAUSED_RATE).await?;
        Ok(self.player.replace_current_item(Some(&uri)).await?)
    }

    async fn play(&self) -> Result<()> {
        self.player.set_rate(PLAYING_RATE).await?;
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.player.set_rate(PAUSED_RATE).await?;
        self.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.player.set_rate(PAUSED_RATE).await?;
        self.playing.store(false, Ordering::SeqCst);
        Ok(self.player.replace_current_item(None).await?)
    }

    async fn seek(&self, position_ms: u64) -> Result<()> {
        Ok(self.player.seek(position_ms).await?)
    }

    async fn skip_to(&self, index: usize) -> Result<()> {
        let uri = self.uri_at(index)?;
        self.current.store(index, Ordering::SeqCst);
        self.player.replace_current_item(Some(&uri)).await?;
        if self.playing.load(Ordering::SeqCst) {
            self.player.set_rate(PLAYING_RATE).await?;
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
        self.player.current_time_ms()
    }

    fn take_events(&self) -> Result<mpsc::UnboundedReceiver<EngineEvent>> {
        self.events.take()
    }
}
