//! # Unified Player
//!
//! One player state machine over any [`PlaybackEngine`].
//!
//! ## State Machine
//!
//! ```text
//! Idle → Ready → Playing ⇄ Paused
//!          ↑        ↓
//!          │      Ended (last item completed)
//!          └── load ── Error(reason)
//! ```
//!
//! Every control operation and every engine event is applied under one
//! async mutex, and each applied change publishes a fresh
//! [`PlayerSnapshot`]. Observers therefore see transitions in the order of
//! the operations that caused them.
//!
//! ## Position
//!
//! While `Playing`, a ticker polls the engine position at the configured
//! interval. In any other state the ticker parks on the snapshot channel and
//! the published position holds still.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::{PlayerConfig, QueueItem, SessionEngine, UnifiedPlayer};
//!
//! let player = UnifiedPlayer::new(SessionEngine::new(native), PlayerConfig::default(), None)?;
//! player.load(vec![QueueItem::new("t1", "content://media/1", "Intro")], 0).await?;
//! player.play().await?;
//!
//! let mut snapshots = player.subscribe();
//! while snapshots.changed().await.is_ok() {
//!     println!("{:?}", snapshots.borrow().state);
//! }
//! ```

use crate::engine::{EngineEvent, PlaybackEngine};
use crate::error::{PlaybackError, Result};
use crate::sleep_timer::PlaybackControl;
use crate::types::{PlayerSnapshot, PlayerState, QueueItem};
use async_trait::async_trait;
use core_runtime::config::PlayerSettings;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

/// Player tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerConfig {
    /// Position publish interval while playing
    pub tick_interval: Duration,
    /// `skip_previous` restarts the current item past this position
    pub restart_threshold_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self::from(&PlayerSettings::default())
    }
}

impl From<&PlayerSettings> for PlayerConfig {
    fn from(settings: &PlayerSettings) -> Self {
        Self {
            tick_interval: settings.tick_interval(),
            restart_threshold_ms: settings.restart_threshold_ms,
        }
    }
}

// ============================================================================
// Internal state
// ============================================================================

#[derive(Default)]
struct Core {
    state: PlayerState,
    queue: Arc<Vec<QueueItem>>,
    index: Option<usize>,
    position_ms: u64,
    duration_ms: u64,
}

impl Core {
    fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            state: self.state.clone(),
            position_ms: self.position_ms,
            duration_ms: self.duration_ms,
            queue: Arc::clone(&self.queue),
            current_index: self.index,
        }
    }

    fn current_id(&self) -> Option<String> {
        self.index
            .and_then(|i| self.queue.get(i))
            .map(|item| item.id.clone())
    }

    fn clamp(&self, position_ms: u64) -> u64 {
        if self.duration_ms > 0 {
            position_ms.min(self.duration_ms)
        } else {
            position_ms
        }
    }

    /// Make `index` current at position 0
    fn select(&mut self, index: usize) {
        self.index = Some(index);
        self.position_ms = 0;
        self.duration_ms = self
            .queue
            .get(index)
            .and_then(|item| item.duration_ms)
            .unwrap_or(0);
    }

    /// Index of the loaded item, for operations that need one
    fn loaded_index(&self) -> Result<usize> {
        match (&self.state, self.index) {
            (PlayerState::Error(reason), _) => Err(PlaybackError::PlayerFailed(reason.clone())),
            (PlayerState::Idle, _) | (_, None) => Err(PlaybackError::NoItemLoaded),
            (_, Some(index)) => Ok(index),
        }
    }
}

struct Shared<E> {
    engine: E,
    core: Mutex<Core>,
    snapshot: watch::Sender<PlayerSnapshot>,
    events: Option<EventBus>,
    config: PlayerConfig,
}

impl<E: PlaybackEngine> Shared<E> {
    fn publish(&self, core: &Core) {
        self.snapshot.send_replace(core.snapshot());
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.events {
            bus.emit(CoreEvent::Playback(event)).ok();
        }
    }

    fn set_state(&self, core: &mut Core, state: PlayerState) {
        if core.state == state {
            return;
        }
        debug!(from = %core.state, to = %state, "Player state changed");
        if let PlayerState::Error(reason) = &state {
            self.emit(PlaybackEvent::Error {
                message: reason.clone(),
            });
        }
        core.state = state;
        self.emit(PlaybackEvent::StateChanged {
            state: core.state.as_str().to_string(),
            item_id: core.current_id(),
        });
    }

    /// Record an engine failure as `Error`, keeping queue and position
    fn fail(&self, core: &mut Core, error: PlaybackError) -> PlaybackError {
        if error.is_engine_error() {
            warn!(engine = self.engine.name(), error = %error, "Engine command failed");
            self.set_state(core, PlayerState::Error(error.reason()));
            self.publish(core);
        }
        error
    }

    fn item_changed(&self, core: &Core) {
        if let (Some(index), Some(item_id)) = (core.index, core.current_id()) {
            self.emit(PlaybackEvent::ItemChanged { item_id, index });
        }
    }

    async fn start_playback(&self, core: &mut Core) -> Result<()> {
        let index = match (&core.state, core.index) {
            (PlayerState::Playing, _) => return Ok(()),
            (PlayerState::Error(reason), _) => {
                return Err(PlaybackError::PlayerFailed(reason.clone()))
            }
            (_, None) => return Err(PlaybackError::NoItemLoaded),
            (_, Some(index)) => index,
        };

        match core.state {
            PlayerState::Idle => {
                let queue = Arc::clone(&core.queue);
                if let Err(e) = self.engine.load(&queue, index).await {
                    return Err(self.fail(core, e));
                }
                core.select(index);
            }
            PlayerState::Ended => {
                if let Err(e) = self.engine.seek(0).await {
                    return Err(self.fail(core, e));
                }
                core.position_ms = 0;
            }
            _ => {}
        }

        if let Err(e) = self.engine.play().await {
            return Err(self.fail(core, e));
        }
        self.set_state(core, PlayerState::Playing);
        self.publish(core);
        Ok(())
    }

    /// Move to `index`; an ended player comes back paused
    async fn advance(&self, core: &mut Core, index: usize) -> Result<()> {
        if let Err(e) = self.engine.skip_to(index).await {
            return Err(self.fail(core, e));
        }
        core.select(index);
        if core.state == PlayerState::Ended {
            self.set_state(core, PlayerState::Paused);
        }
        self.item_changed(core);
        self.publish(core);
        Ok(())
    }

    async fn finish_queue(&self, core: &mut Core) -> Result<()> {
        if core.state == PlayerState::Playing {
            if let Err(e) = self.engine.pause().await {
                return Err(self.fail(core, e));
            }
        }
        if core.duration_ms > 0 {
            core.position_ms = core.duration_ms;
        }
        self.set_state(core, PlayerState::Ended);
        self.publish(core);
        Ok(())
    }

    async fn on_engine_event(&self, event: EngineEvent) {
        let mut core = self.core.lock().await;

        match event {
            EngineEvent::Prepared { index, duration_ms } => {
                if core.index == Some(index) && duration_ms > 0 {
                    core.duration_ms = duration_ms;
                    self.publish(&core);
                }
            }
            EngineEvent::Position(position_ms) => {
                if core.state.is_playing() {
                    core.position_ms = core.clamp(position_ms);
                    self.publish(&core);
                }
            }
            EngineEvent::Completed { index } => {
                let active = matches!(
                    core.state,
                    PlayerState::Playing | PlayerState::Paused | PlayerState::Ready
                );
                if core.index != Some(index) || !active {
                    debug!(index, state = %core.state, "Ignoring stale completion");
                    return;
                }

                if let Some(item_id) = core.current_id() {
                    self.emit(PlaybackEvent::Completed { item_id });
                }

                let result = if index + 1 < core.queue.len() {
                    self.advance(&mut core, index + 1).await
                } else {
                    self.finish_queue(&mut core).await
                };
                if let Err(e) = result {
                    warn!(error = %e, "Could not advance after completion");
                }
            }
            EngineEvent::Error(reason) => {
                warn!(engine = self.engine.name(), %reason, "Engine reported an error");
                self.set_state(&mut core, PlayerState::Error(reason));
                self.publish(&core);
            }
        }
    }

    async fn refresh_position(&self) {
        let mut core = self.core.lock().await;
        if !core.state.is_playing() {
            return;
        }
        let position_ms = core.clamp(self.engine.position_ms());
        if position_ms != core.position_ms {
            core.position_ms = position_ms;
            self.publish(&core);
        }
    }
}

async fn forward_engine_events<E: PlaybackEngine>(
    shared: Arc<Shared<E>>,
    mut events: mpsc::UnboundedReceiver<EngineEvent>,
) {
    while let Some(event) = events.recv().await {
        shared.on_engine_event(event).await;
    }
}

async fn tick_position<E: PlaybackEngine>(shared: Arc<Shared<E>>) {
    let mut snapshots = shared.snapshot.subscribe();

    loop {
        if snapshots.wait_for(|s| s.state.is_playing()).await.is_err() {
            return;
        }

        let mut ticker = tokio::time::interval(shared.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => shared.refresh_position().await,
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if !snapshots.borrow_and_update().state.is_playing() {
                        break;
                    }
                }
            }
        }
    }
}

// ============================================================================
// Player
// ============================================================================

pub struct UnifiedPlayer<E: PlaybackEngine> {
    shared: Arc<Shared<E>>,
    tasks: Vec<JoinHandle<()>>,
}

impl<E: PlaybackEngine + 'static> UnifiedPlayer<E> {
    /// Take ownership of `engine` and start the event and position tasks.
    ///
    /// # Errors
    ///
    /// `EventsTaken` if the engine's events were already consumed.
    pub fn new(engine: E, config: PlayerConfig, events: Option<EventBus>) -> Result<Self> {
        let engine_events = engine.take_events()?;
        let (snapshot, _) = watch::channel(PlayerSnapshot::default());

        info!(engine = engine.name(), "Unified player ready");

        let shared = Arc::new(Shared {
            engine,
            core: Mutex::new(Core::default()),
            snapshot,
            events,
            config,
        });

        let tasks = vec![
            tokio::spawn(forward_engine_events(Arc::clone(&shared), engine_events)),
            tokio::spawn(tick_position(Arc::clone(&shared))),
        ];

        Ok(Self { shared, tasks })
    }

    pub fn engine_name(&self) -> &'static str {
        self.shared.engine.name()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.shared.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    /// Replace the queue and prepare `queue[start_index]`. The only way out
    /// of `Error`.
    #[instrument(skip(self, queue), fields(engine = self.engine_name(), len = queue.len()))]
    pub async fn load(&self, queue: Vec<QueueItem>, start_index: usize) -> Result<()> {
        if queue.is_empty() {
            return Err(PlaybackError::EmptyQueue);
        }
        if start_index >= queue.len() {
            return Err(PlaybackError::IndexOutOfRange {
                index: start_index,
                len: queue.len(),
            });
        }

        let shared = &self.shared;
        let mut core = shared.core.lock().await;
        core.queue = Arc::new(queue);
        core.select(start_index);

        let queue = Arc::clone(&core.queue);
        if let Err(e) = shared.engine.load(&queue, start_index).await {
            return Err(shared.fail(&mut core, e));
        }

        // A failed player re-enters through Idle so the transition is visible.
        if core.state.is_error() {
            shared.set_state(&mut core, PlayerState::Idle);
        }
        shared.set_state(&mut core, PlayerState::Ready);
        shared.item_changed(&core);
        shared.publish(&core);
        Ok(())
    }

    pub async fn play(&self) -> Result<()> {
        let mut core = self.shared.core.lock().await;
        self.shared.start_playback(&mut core).await
    }

    /// No-op unless playing
    pub async fn pause(&self) -> Result<()> {
        let shared = &self.shared;
        let mut core = shared.core.lock().await;
        if !core.state.is_playing() {
            return Ok(());
        }

        if let Err(e) = shared.engine.pause().await {
            return Err(shared.fail(&mut core, e));
        }
        core.position_ms = core.clamp(shared.engine.position_ms());
        shared.set_state(&mut core, PlayerState::Paused);
        shared.publish(&core);
        Ok(())
    }

    /// No-op unless paused
    pub async fn resume(&self) -> Result<()> {
        let mut core = self.shared.core.lock().await;
        if core.state != PlayerState::Paused {
            return Ok(());
        }
        self.shared.start_playback(&mut core).await
    }

    /// Stop playback and rewind, keeping the queue. No-op when idle or failed.
    pub async fn stop(&self) -> Result<()> {
        let shared = &self.shared;
        let mut core = shared.core.lock().await;
        if matches!(core.state, PlayerState::Idle | PlayerState::Error(_)) {
            return Ok(());
        }

        if let Err(e) = shared.engine.stop().await {
            return Err(shared.fail(&mut core, e));
        }
        core.position_ms = 0;
        shared.set_state(&mut core, PlayerState::Idle);
        shared.publish(&core);
        Ok(())
    }

    /// Seek within the current item, clamped to `[0, duration]`. Reaching the
    /// end this way does not end the item; only the engine's completion does.
    pub async fn seek_to(&self, position_ms: u64) -> Result<()> {
        let shared = &self.shared;
        let mut core = shared.core.lock().await;
        core.loaded_index()?;

        let target = core.clamp(position_ms);
        if let Err(e) = shared.engine.seek(target).await {
            return Err(shared.fail(&mut core, e));
        }
        core.position_ms = target;
        if core.state == PlayerState::Ended {
            shared.set_state(&mut core, PlayerState::Paused);
        }
        shared.emit(PlaybackEvent::Seeked {
            position_ms: target,
        });
        shared.publish(&core);
        Ok(())
    }

    /// Next item, or `Ended` at the last one
    pub async fn skip_next(&self) -> Result<()> {
        let shared = &self.shared;
        let mut core = shared.core.lock().await;
        let index = core.loaded_index()?;

        if index + 1 < core.queue.len() {
            shared.advance(&mut core, index + 1).await
        } else {
            shared.finish_queue(&mut core).await
        }
    }

    /// Restart the current item past the restart threshold or at the first
    /// item; otherwise go to the previous item
    pub async fn skip_previous(&self) -> Result<()> {
        let shared = &self.shared;
        let mut core = shared.core.lock().await;
        let index = core.loaded_index()?;

        if index == 0 || core.position_ms > shared.config.restart_threshold_ms {
            if let Err(e) = shared.engine.seek(0).await {
                return Err(shared.fail(&mut core, e));
            }
            core.position_ms = 0;
            if core.state == PlayerState::Ended {
                shared.set_state(&mut core, PlayerState::Paused);
            }
            shared.publish(&core);
            Ok(())
        } else {
            shared.advance(&mut core, index - 1).await
        }
    }

    /// Replace the queue. The current item keeps playing when the new queue
    /// contains it (matched by id); otherwise the first item is loaded.
    pub async fn set_queue(&self, items: Vec<QueueItem>) -> Result<()> {
        let shared = &self.shared;
        let mut core = shared.core.lock().await;
        if let PlayerState::Error(reason) = &core.state {
            return Err(PlaybackError::PlayerFailed(reason.clone()));
        }

        if items.is_empty() {
            if core.state != PlayerState::Idle {
                if let Err(e) = shared.engine.stop().await {
                    return Err(shared.fail(&mut core, e));
                }
            }
            shared.set_state(&mut core, PlayerState::Idle);
            core.queue = Arc::new(Vec::new());
            core.index = None;
            core.position_ms = 0;
            core.duration_ms = 0;
            shared.publish(&core);
            return Ok(());
        }

        let keep = core
            .current_id()
            .and_then(|id| items.iter().position(|item| item.id == id))
            .filter(|_| {
                matches!(
                    core.state,
                    PlayerState::Ready | PlayerState::Playing | PlayerState::Paused
                )
            });
        let queue = Arc::new(items);

        match keep {
            Some(index) => {
                if let Err(e) = shared.engine.set_queue(&queue, index).await {
                    return Err(shared.fail(&mut core, e));
                }
                core.queue = queue;
                core.index = Some(index);
            }
            None => {
                if let Err(e) = shared.engine.load(&queue, 0).await {
                    return Err(shared.fail(&mut core, e));
                }
                core.queue = queue;
                core.select(0);
                shared.set_state(&mut core, PlayerState::Ready);
                shared.item_changed(&core);
            }
        }
        shared.publish(&core);
        Ok(())
    }
}

impl<E: PlaybackEngine> Drop for UnifiedPlayer<E> {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[async_trait]
impl<E: PlaybackEngine + 'static> PlaybackControl for UnifiedPlayer<E> {
    async fn stop(&self) -> Result<()> {
        UnifiedPlayer::stop(self).await
    }
}
