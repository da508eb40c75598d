//! Core service façade and bootstrap.
//!
//! [`CoreService::start`] turns a validated [`CoreConfig`] into running
//! components: the library database, one scanner per configured source, the
//! library syncer (with its change loop when the host can report changes),
//! the unified player over the selected native engine, and a sleep timer
//! wired to that player. Every component shares one [`EventBus`].
//!
//! ```ignore
//! let service = CoreService::start(config).await?;
//!
//! let status = service.syncer().resync_all().await.wait().await;
//! service.player().load(queue, 0).await?;
//! service.sleep_timer().start(30 * 60 * 1000);
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::ContentClass;
use core_library::{create_pool, DatabaseConfig, LibraryStore};
use core_playback::{
    DesktopEngine, FrameworkEngine, PlaybackEngine, PlayerConfig, SessionEngine, SleepTimer,
    UnifiedPlayer,
};
use core_runtime::config::{CoreConfig, EngineKind, ScannerKind};
use core_runtime::events::{CoreEvent, EventBus, EventCategory, EventStream};
use core_runtime::logging::init_logging;
use core_sync::{
    ChangeObserver, ChangeSignals, FilesystemScanner, FsChangeObserver, LibraryScanner,
    LibrarySyncer, MediaStoreScanner, RemoteCatalogScanner, SyncConfig,
};
use futures::stream::select_all;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

const EVENT_CAPACITY: usize = 256;

/// Player over whichever engine the configuration selected
pub type Player = UnifiedPlayer<Arc<dyn PlaybackEngine>>;

/// Primary façade exposed to host applications.
pub struct CoreService {
    events: EventBus,
    store: LibraryStore,
    syncer: LibrarySyncer,
    player: Arc<Player>,
    sleep_timer: SleepTimer,
    change_loop: Option<JoinHandle<()>>,
}

impl CoreService {
    /// Build and start every component.
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration, a missing bridge for a selected
    /// scanner or engine, or when the database cannot be opened.
    #[instrument(skip(config), fields(db = %config.database_path.display(), engine = ?config.engine))]
    pub async fn start(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        if let Some(logging) = config.logging.clone() {
            if let Err(e) = init_logging(logging) {
                warn!(error = %e, "Logging already initialized; keeping existing subscriber");
            }
        }

        let pool = create_pool(DatabaseConfig::new(&config.database_path)).await?;
        let store = LibraryStore::new(pool, Arc::clone(&config.clock));
        let events = EventBus::new(EVENT_CAPACITY);

        let syncer = LibrarySyncer::new(
            store.clone(),
            build_scanners(&config)?,
            events.clone(),
            SyncConfig::from(&config.sync),
        )?;

        let player = Arc::new(UnifiedPlayer::new(
            build_engine(&config)?,
            PlayerConfig::from(&config.player),
            Some(events.clone()),
        )?);
        let sleep_timer = SleepTimer::with_events(player.clone(), events.clone());

        let change_loop = if config.can_watch_changes() {
            let signals = change_signals(&config)?;
            info!(streams = signals.len(), "Watching library sources for changes");
            Some(syncer.run_on_changes(select_all(signals)))
        } else {
            None
        };

        info!(
            sources = ?syncer.source_ids(),
            engine = player.engine_name(),
            "Core service started"
        );

        Ok(Self {
            events,
            store,
            syncer,
            player,
            sleep_timer,
            change_loop,
        })
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CoreEvent> {
        self.events.subscribe()
    }

    /// Events from the given components only; empty means all
    pub fn event_stream(&self, categories: &[EventCategory]) -> EventStream {
        EventStream::new(self.events.subscribe(), categories)
    }

    pub fn store(&self) -> &LibraryStore {
        &self.store
    }

    pub fn syncer(&self) -> &LibrarySyncer {
        &self.syncer
    }

    pub fn player(&self) -> &Arc<Player> {
        &self.player
    }

    pub fn sleep_timer(&self) -> &SleepTimer {
        &self.sleep_timer
    }

    /// Whether change notifications trigger resyncs
    pub fn is_watching(&self) -> bool {
        self.change_loop
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the change loop, cancel any sync run and the sleep timer, and
    /// stop playback.
    #[instrument(skip(self))]
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(handle) = self.change_loop.take() {
            handle.abort();
        }
        self.sleep_timer.cancel();
        self.syncer.cancel().await;
        self.player.stop().await?;
        self.store.pool().close().await;

        info!("Core service stopped");
        Ok(())
    }
}

impl Drop for CoreService {
    fn drop(&mut self) {
        if let Some(handle) = self.change_loop.take() {
            handle.abort();
        }
    }
}

fn build_scanners(config: &CoreConfig) -> Result<Vec<Arc<dyn LibraryScanner>>> {
    let mut scanners: Vec<Arc<dyn LibraryScanner>> = Vec::new();

    for kind in &config.scanners {
        match kind {
            ScannerKind::MediaStore => {
                let store = config.media_store.clone().ok_or_else(|| {
                    CoreError::capability_missing("MediaStoreQuery", "media store scanner selected")
                })?;
                scanners.push(Arc::new(MediaStoreScanner::new(kind.name(), store)));
            }
            ScannerKind::Filesystem { roots } => {
                scanners.push(Arc::new(FilesystemScanner::new(kind.name(), roots.clone())));
            }
            ScannerKind::RemoteCatalog => {
                for catalog in &config.remote_catalogs {
                    scanners.push(Arc::new(RemoteCatalogScanner::new(Arc::clone(catalog))));
                }
            }
        }
    }

    Ok(scanners)
}

fn build_engine(config: &CoreConfig) -> Result<Arc<dyn PlaybackEngine>> {
    let engine: Arc<dyn PlaybackEngine> = match config.engine {
        EngineKind::MediaSession => {
            let player = config.session_player.clone().ok_or_else(|| {
                CoreError::capability_missing("MediaSessionPlayer", "media session engine selected")
            })?;
            Arc::new(SessionEngine::new(player))
        }
        EngineKind::Desktop => {
            let player = config.desktop_player.clone().ok_or_else(|| {
                CoreError::capability_missing("DesktopPlayer", "desktop engine selected")
            })?;
            Arc::new(DesktopEngine::new(player))
        }
        EngineKind::Framework => {
            let player = config.framework_player.clone().ok_or_else(|| {
                CoreError::capability_missing("FrameworkPlayer", "framework engine selected")
            })?;
            Arc::new(FrameworkEngine::new(player))
        }
    };
    Ok(engine)
}

fn change_signals(config: &CoreConfig) -> Result<Vec<ChangeSignals>> {
    let mut signals = Vec::new();

    for kind in &config.scanners {
        match kind {
            ScannerKind::MediaStore => {
                if let Some(observer) = &config.content_observer {
                    signals.push(ChangeObserver::new(Arc::clone(observer)).observe(ContentClass::All)?);
                }
            }
            ScannerKind::Filesystem { roots } => signals.push(FsChangeObserver::watch(roots)?),
            ScannerKind::RemoteCatalog => {}
        }
    }

    Ok(signals)
}
