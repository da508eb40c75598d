//! Adapter over a queue-owning media session player
//!
//! The native player receives the whole queue. Its own auto-advance is
//! switched off on every load; an automatic transition that happens anyway
//! is still reported as completion of the item that finished.

use crate::engine::{check_index, EngineEvent, EventChannel, PlaybackEngine};
use crate::error::Result;
use crate::types::QueueItem;
use async_trait::async_trait;
use bridge_traits::{
    MediaSessionPlayer, SessionEvent, SessionMediaItem, SessionPlaybackState, TransitionReason,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

pub struct SessionEngine {
    player: Arc<dyn MediaSessionPlayer>,
    events: EventChannel,
    current: Arc<AtomicUsize>,
    len: AtomicUsize,
}

impl SessionEngine {
    pub fn new(player: Arc<dyn MediaSessionPlayer>) -> Self {
        let events = EventChannel::new();
        let current = Arc::new(AtomicUsize::new(0));

        let sender = events.sender();
        let index = Arc::clone(&current);
        player.set_listener(Box::new(move |event| {
            if let Some(event) = translate(event, &index) {
                sender.send(event);
            }
        }));

        Self {
            player,
            events,
            current,
            len: AtomicUsize::new(0),
        }
    }
}

fn translate(event: SessionEvent, current: &AtomicUsize) -> Option<EngineEvent> {
    match event {
        SessionEvent::MediaItemTransition {
            index,
            reason: TransitionReason::Auto,
        } => {
            let finished = current.swap(index, Ordering::SeqCst);
            Some(EngineEvent::Completed { index: finished })
        }
        SessionEvent::MediaItemTransition { index, .. } => {
            current.store(index, Ordering::SeqCst);
            None
        }
        SessionEvent::PlaybackStateChanged(SessionPlaybackState::Ended) => {
            Some(EngineEvent::Completed {
                index: current.load(Ordering::SeqCst),
            })
        }
        SessionEvent::DurationKnown { index, duration_ms } => {
            Some(EngineEvent::Prepared { index, duration_ms })
        }
        SessionEvent::PlayerError { code, message } => Some(EngineEvent::Error(format!(
            "{} (code {})",
            message, code
        ))),
        other => {
            debug!(event = ?other, "Ignoring session event");
            None
        }
    }
}

fn session_items(items: &[QueueItem]) -> Vec<SessionMediaItem> {
    items
        .iter()
        .map(|item| SessionMediaItem {
            media_id: item.id.clone(),
            uri: item.content_uri.clone(),
            title: item.title.clone(),
        })
        .collect()
}

#[async_trait]
impl PlaybackEngine for SessionEngine {
    fn name(&self) -> &'static str {
        "media_session"
    }

    async fn load(&self, items: &[QueueItem], start_index: usize) -> Result<()> {
        check_index(start_index, items.len())?;
        self.player.set_auto_advance(false).await?;
        self.player.set_play_when_ready(false).await?;
        self.current.store(start_index, Ordering::SeqCst);
        self.len.store(items.len(), Ordering::SeqCst);
        self.player
            .set_media_items(session_items(items), start_index)
            .await?;
        self.player.prepare().await?;
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        Ok(self.player.set_play_when_ready(true).await?)
    }

    async fn pause(&self) -> Result<()> {
        Ok(self.player.set_play_when_ready(false).await?)
    }

    async fn stop(&self) -> Result<()> {
        Ok(self.player.stop().await?)
    }

    async fn seek(&self, position_ms: u64) -> Result<()> {
        let index = self.current.load(Ordering::SeqCst);
        Ok(self.player.seek_to(index, position_ms).await?)
    }

    async fn skip_to(&self, index: usize) -> Result<()> {
        check_index(index, self.len.load(Ordering::SeqCst))?;
        self.current.store(index, Ordering::SeqCst);
        Ok(self.player.seek_to(index, 0).await?)
    }

    async fn set_queue(&self, items: &[QueueItem], current: usize) -> Result<()> {
        check_index(current, items.len())?;
        let position = self.player.current_position_ms();
        self.current.store(current, Ordering::SeqCst);
        self.len.store(items.len(), Ordering::SeqCst);
        self.player
            .set_media_items(session_items(items), current)
            .await?;
        self.player.prepare().await?;
        Ok(self.player.seek_to(current, position).await?)
    }

    fn position_ms(&self) -> u64 {
        self.player.current_position_ms()
    }

    fn take_events(&self) -> Result<mpsc::UnboundedReceiver<EngineEvent>> {
        self.events.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_transition_completes_previous_item() {
        let current = AtomicUsize::new(2);
        let event = translate(
            SessionEvent::MediaItemTransition {
                index: 3,
                reason: TransitionReason::Auto,
            },
            &current,
        );

        assert_eq!(event, Some(EngineEvent::Completed { index: 2 }));
        assert_eq!(current.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_seek_transition_is_silent() {
        let current = AtomicUsize::new(0);
        let event = translate(
            SessionEvent::MediaItemTransition {
                index: 1,
                reason: TransitionReason::Seek,
            },
            &current,
        );

        assert_eq!(event, None);
        assert_eq!(current.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_error_keeps_native_code() {
        let current = AtomicUsize::new(0);
        let event = translate(
            SessionEvent::PlayerError {
                code: 4001,
                message: "Decoder init failed".to_string(),
            },
            &current,
        );

        assert_eq!(
            event,
            Some(EngineEvent::Error("Decoder init failed (code 4001)".to_string()))
        );
    }
}
