//! # Sleep Timer
//!
//! Stops playback once a duration has elapsed on the monotonic clock.
//!
//! Each `start` bumps a generation counter and aborts the pending wait, so
//! a replaced timer can never fire. A wait that wakes after being replaced
//! sees a newer generation and exits without stopping anything.

use crate::error::Result;
use async_trait::async_trait;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// What the timer stops
#[async_trait]
pub trait PlaybackControl: Send + Sync {
    async fn stop(&self) -> Result<()>;
}

#[derive(Default)]
struct TimerState {
    generation: u64,
    deadline: Option<Instant>,
    task: Option<JoinHandle<()>>,
}

struct Inner {
    target: Arc<dyn PlaybackControl>,
    events: Option<EventBus>,
    state: Mutex<TimerState>,
}

impl Inner {
    fn emit(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.events {
            bus.emit(CoreEvent::Playback(event)).ok();
        }
    }

    async fn fire(&self, generation: u64) {
        {
            let mut state = self.state.lock();
            if state.generation != generation {
                debug!(generation, "Sleep timer superseded");
                return;
            }
            state.deadline = None;
            state.task = None;
        }

        info!("Sleep timer expired, stopping playback");
        if let Err(e) = self.target.stop().await {
            warn!(error = %e, "Sleep timer could not stop playback");
        }
        self.emit(PlaybackEvent::SleepTimerFired);
    }
}

#[derive(Clone)]
pub struct SleepTimer {
    inner: Arc<Inner>,
}

impl SleepTimer {
    pub fn new(target: Arc<dyn PlaybackControl>) -> Self {
        Self {
            inner: Arc::new(Inner {
                target,
                events: None,
                state: Mutex::new(TimerState::default()),
            }),
        }
    }

    /// Announce timer changes on `events`
    pub fn with_events(target: Arc<dyn PlaybackControl>, events: EventBus) -> Self {
        Self {
            inner: Arc::new(Inner {
                target,
                events: Some(events),
                state: Mutex::new(TimerState::default()),
            }),
        }
    }

    /// Arm the timer, replacing any pending one
    pub fn start(&self, duration_ms: u64) {
        let deadline = Instant::now() + Duration::from_millis(duration_ms);
        let mut state = self.inner.state.lock();

        state.generation += 1;
        if let Some(task) = state.task.take() {
            task.abort();
        }

        let generation = state.generation;
        let inner = Arc::clone(&self.inner);
        state.deadline = Some(deadline);
        state.task = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            inner.fire(generation).await;
        }));
        drop(state);

        debug!(duration_ms, generation, "Sleep timer armed");
        self.inner
            .emit(PlaybackEvent::SleepTimerStarted { duration_ms });
    }

    /// Disarm without stopping playback. No-op when inactive.
    pub fn cancel(&self) {
        let mut state = self.inner.state.lock();
        if state.deadline.is_none() {
            return;
        }

        state.generation += 1;
        state.deadline = None;
        if let Some(task) = state.task.take() {
            task.abort();
        }
        drop(state);

        debug!("Sleep timer cancelled");
        self.inner.emit(PlaybackEvent::SleepTimerCancelled);
    }

    /// Milliseconds until the timer fires
    pub fn remaining(&self) -> Option<u64> {
        self.inner.state.lock().deadline.map(|deadline| {
            deadline
                .saturating_duration_since(Instant::now())
                .as_millis() as u64
        })
    }

    pub fn is_active(&self) -> bool {
        self.inner.state.lock().deadline.is_some()
    }
}
