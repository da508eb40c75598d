//! Active lyric line tracking over the player's snapshot stream.

use crate::types::PlayerSnapshot;
use core_metadata::LyricsIndex;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::Stream;

/// Yields the active line index whenever it changes.
///
/// The first item is always yielded so a view can render its initial
/// highlight. `None` means no line is active yet, or (with
/// [`LyricsFollower::for_item`]) another item is playing.
pub struct LyricsFollower {
    snapshots: WatchStream<PlayerSnapshot>,
    lyrics: Arc<LyricsIndex>,
    item_id: Option<String>,
    last: Option<Option<usize>>,
}

impl LyricsFollower {
    pub fn new(snapshots: watch::Receiver<PlayerSnapshot>, lyrics: Arc<LyricsIndex>) -> Self {
        Self {
            snapshots: WatchStream::new(snapshots),
            lyrics,
            item_id: None,
            last: None,
        }
    }

    /// Only follow while the queue item with `item_id` is current
    pub fn for_item(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    fn active_line(&self, snapshot: &PlayerSnapshot) -> Option<usize> {
        if let Some(wanted) = &self.item_id {
            if snapshot.current_item().map(|item| &item.id) != Some(wanted) {
                return None;
            }
        }
        self.lyrics.index_at(snapshot.position_ms)
    }
}

impl Stream for LyricsFollower {
    type Item = Option<usize>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            let Some(snapshot) = ready!(Pin::new(&mut self.snapshots).poll_next(cx)) else {
                return Poll::Ready(None);
            };

            let active = self.active_line(&snapshot);
            if self.last != Some(active) {
                self.last = Some(active);
                return Poll::Ready(Some(active));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QueueItem;
    use tokio_stream::StreamExt;

    const LRC: &str = "[00:01.00]first\n[00:05.00]second\n[00:09.00]third";

    fn snapshot(position_ms: u64) -> PlayerSnapshot {
        PlayerSnapshot {
            position_ms,
            queue: Arc::new(vec![QueueItem::new("t1", "file:///t1.mp3", "T1")]),
            current_index: Some(0),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_yields_only_on_line_change() {
        let (tx, rx) = watch::channel(snapshot(0));
        let mut follower = LyricsFollower::new(rx, Arc::new(LyricsIndex::parse(LRC)));

        assert_eq!(follower.next().await, Some(None));

        tx.send_replace(snapshot(1_200));
        assert_eq!(follower.next().await, Some(Some(0)));

        // Still inside the first line
        tx.send_replace(snapshot(3_000));
        tx.send_replace(snapshot(4_000));
        tx.send_replace(snapshot(9_500));
        assert_eq!(follower.next().await, Some(Some(2)));

        drop(tx);
        assert_eq!(follower.next().await, None);
    }

    #[tokio::test]
    async fn test_other_item_has_no_active_line() {
        let (tx, rx) = watch::channel(snapshot(6_000));
        let mut follower =
            LyricsFollower::new(rx, Arc::new(LyricsIndex::parse(LRC))).for_item("t2");

        assert_eq!(follower.next().await, Some(None));

        let mut other = snapshot(6_000);
        other.queue = Arc::new(vec![QueueItem::new("t2", "file:///t2.mp3", "T2")]);
        tx.send_replace(other);
        assert_eq!(follower.next().await, Some(Some(1)));
    }
}
