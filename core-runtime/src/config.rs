//! # Core Configuration Module
//!
//! Builder-based configuration for the library sync and playback core.
//!
//! ## Overview
//!
//! `CoreConfig` holds the host bridges and the settings every component is
//! constructed from. The builder validates fail-fast: a scanner or engine
//! variant selected without its bridge is rejected at `build()` with an
//! actionable [`Error::CapabilityMissing`].
//!
//! Scanner and engine variants are chosen here, once. Nothing downstream
//! inspects bridge types at runtime.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, EngineKind, ScannerKind};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/data/library.db")
//!     .scanner(ScannerKind::MediaStore)
//!     .media_store(Arc::new(HostMediaStore::new()))
//!     .content_observer(Arc::new(HostObserver::new()))
//!     .engine(EngineKind::MediaSession)
//!     .session_player(Arc::new(HostSessionPlayer::new()))
//!     .build()?;
//! ```
//!
//! A desktop host scanning folders:
//!
//! ```ignore
//! let config = CoreConfig::builder()
//!     .database_path("/home/ana/.local/share/resonance/library.db")
//!     .scanner(ScannerKind::Filesystem {
//!         roots: vec!["/home/ana/Music".into()],
//!     })
//!     .engine(EngineKind::Desktop)
//!     .desktop_player(Arc::new(VlcPlayer::new()))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::logging::LoggingConfig;
use bridge_traits::{
    Clock, ContentObserver, DesktopPlayer, FrameworkPlayer, MediaSessionPlayer, MediaStoreQuery,
    RemoteCatalog, SystemClock,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Library source variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScannerKind {
    /// Device media index (requires a `MediaStoreQuery` bridge).
    MediaStore,
    /// Local folders walked on disk.
    Filesystem { roots: Vec<PathBuf> },
    /// Every configured `RemoteCatalog` bridge.
    RemoteCatalog,
}

impl ScannerKind {
    pub fn name(&self) -> &'static str {
        match self {
            ScannerKind::MediaStore => "media_store",
            ScannerKind::Filesystem { .. } => "filesystem",
            ScannerKind::RemoteCatalog => "remote_catalog",
        }
    }
}

/// Native playback engine variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Queue-based mobile media session player.
    MediaSession,
    /// Desktop native player.
    Desktop,
    /// Mobile OS player framework.
    Framework,
}

/// Library sync tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Quiet period after a change signal before a resync starts
    pub debounce_ms: u64,
    /// Upper bound for a single source scan
    pub scan_timeout_secs: u64,
    /// Start the change-driven sync loop on service start
    pub watch_changes: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            scan_timeout_secs: 300,
            watch_changes: true,
        }
    }
}

impl SyncSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }
}

/// Unified player tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSettings {
    /// Position publish interval while playing
    pub tick_interval_ms: u64,
    /// `skip_previous` restarts the current item past this position
    pub restart_threshold_ms: u64,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 250,
            restart_threshold_ms: 3_000,
        }
    }
}

impl PlayerSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Core configuration.
///
/// Use [`CoreConfig::builder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite library database
    pub database_path: PathBuf,

    /// Active library sources, in registration order
    pub scanners: Vec<ScannerKind>,

    /// Active playback engine
    pub engine: EngineKind,

    pub media_store: Option<Arc<dyn MediaStoreQuery>>,
    pub content_observer: Option<Arc<dyn ContentObserver>>,
    pub remote_catalogs: Vec<Arc<dyn RemoteCatalog>>,

    pub session_player: Option<Arc<dyn MediaSessionPlayer>>,
    pub desktop_player: Option<Arc<dyn DesktopPlayer>>,
    pub framework_player: Option<Arc<dyn FrameworkPlayer>>,

    /// Wall clock for persisted timestamps
    pub clock: Arc<dyn Clock>,

    pub sync: SyncSettings,
    pub player: PlayerSettings,

    /// Logging setup applied by the service on start, if any
    pub logging: Option<LoggingConfig>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("scanners", &self.scanners)
            .field("engine", &self.engine)
            .field("media_store", &self.media_store.is_some())
            .field("content_observer", &self.content_observer.is_some())
            .field("remote_catalogs", &self.remote_catalogs.len())
            .field("session_player", &self.session_player.is_some())
            .field("desktop_player", &self.desktop_player.is_some())
            .field("framework_player", &self.framework_player.is_some())
            .field("sync", &self.sync)
            .field("player", &self.player)
            .field("logging", &self.logging)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Database path is not empty
    /// - At least one scanner is configured, each at most once
    /// - Every selected scanner and the selected engine have their bridge
    /// - Timing settings are non-zero
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.scanners.is_empty() {
            return Err(Error::Config(
                "At least one scanner must be configured. Use .scanner() to add one.".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for scanner in &self.scanners {
            if !seen.insert(scanner.name()) {
                return Err(Error::Config(format!(
                    "Scanner '{}' configured more than once",
                    scanner.name()
                )));
            }

            match scanner {
                ScannerKind::MediaStore if self.media_store.is_none() => {
                    return Err(capability_missing(
                        "MediaStoreQuery",
                        "The media store scanner needs the host's media index. \
                         Inject a MediaStoreQuery implementation or remove the scanner.",
                    ));
                }
                ScannerKind::Filesystem { roots } if roots.is_empty() => {
                    return Err(Error::Config(
                        "Filesystem scanner requires at least one root directory".to_string(),
                    ));
                }
                ScannerKind::RemoteCatalog if self.remote_catalogs.is_empty() => {
                    return Err(capability_missing(
                        "RemoteCatalog",
                        "The remote catalog scanner needs at least one RemoteCatalog. \
                         Inject one with .remote_catalog() or remove the scanner.",
                    ));
                }
                _ => {}
            }
        }

        let engine_ready = match self.engine {
            EngineKind::MediaSession => self.session_player.is_some(),
            EngineKind::Desktop => self.desktop_player.is_some(),
            EngineKind::Framework => self.framework_player.is_some(),
        };
        if !engine_ready {
            let capability = match self.engine {
                EngineKind::MediaSession => "MediaSessionPlayer",
                EngineKind::Desktop => "DesktopPlayer",
                EngineKind::Framework => "FrameworkPlayer",
            };
            return Err(capability_missing(
                capability,
                "The selected playback engine has no native player. \
                 Inject the matching player bridge or select another engine.",
            ));
        }

        if self.sync.scan_timeout_secs == 0 {
            return Err(Error::Config(
                "Scan timeout must be greater than 0 seconds".to_string(),
            ));
        }

        if self.player.tick_interval_ms == 0 {
            return Err(Error::Config(
                "Player tick interval must be greater than 0 ms".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether a content observer can drive change-triggered syncs.
    pub fn can_watch_changes(&self) -> bool {
        self.sync.watch_changes
            && self.scanners.iter().any(|scanner| match scanner {
                ScannerKind::MediaStore => self.content_observer.is_some(),
                ScannerKind::Filesystem { .. } => true,
                ScannerKind::RemoteCatalog => false,
            })
    }
}

fn capability_missing(capability: &str, message: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    scanners: Vec<ScannerKind>,
    engine: Option<EngineKind>,
    media_store: Option<Arc<dyn MediaStoreQuery>>,
    content_observer: Option<Arc<dyn ContentObserver>>,
    remote_catalogs: Vec<Arc<dyn RemoteCatalog>>,
    session_player: Option<Arc<dyn MediaSessionPlayer>>,
    desktop_player: Option<Arc<dyn DesktopPlayer>>,
    framework_player: Option<Arc<dyn FrameworkPlayer>>,
    clock: Option<Arc<dyn Clock>>,
    sync: Option<SyncSettings>,
    player: Option<PlayerSettings>,
    logging: Option<LoggingConfig>,
}

impl CoreConfigBuilder {
    /// Sets the SQLite database path. Use `":memory:"` for a throwaway store.
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Adds a library source.
    pub fn scanner(mut self, kind: ScannerKind) -> Self {
        self.scanners.push(kind);
        self
    }

    pub fn engine(mut self, kind: EngineKind) -> Self {
        self.engine = Some(kind);
        self
    }

    pub fn media_store(mut self, store: Arc<dyn MediaStoreQuery>) -> Self {
        self.media_store = Some(store);
        self
    }

    pub fn content_observer(mut self, observer: Arc<dyn ContentObserver>) -> Self {
        self.content_observer = Some(observer);
        self
    }

    /// Adds a remote catalog; may be called several times.
    pub fn remote_catalog(mut self, catalog: Arc<dyn RemoteCatalog>) -> Self {
        self.remote_catalogs.push(catalog);
        self
    }

    pub fn session_player(mut self, player: Arc<dyn MediaSessionPlayer>) -> Self {
        self.session_player = Some(player);
        self
    }

    pub fn desktop_player(mut self, player: Arc<dyn DesktopPlayer>) -> Self {
        self.desktop_player = Some(player);
        self
    }

    pub fn framework_player(mut self, player: Arc<dyn FrameworkPlayer>) -> Self {
        self.framework_player = Some(player);
        self
    }

    /// Overrides the wall clock (defaults to [`SystemClock`]).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn sync_settings(mut self, settings: SyncSettings) -> Self {
        self.sync = Some(settings);
        self
    }

    pub fn player_settings(mut self, settings: PlayerSettings) -> Self {
        self.player = Some(settings);
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Builds and validates the final `CoreConfig`.
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let engine = self.engine.ok_or_else(|| {
            Error::Config("Playback engine is required. Use .engine() to select one.".to_string())
        })?;

        let config = CoreConfig {
            database_path,
            scanners: self.scanners,
            engine,
            media_store: self.media_store,
            content_observer: self.content_observer,
            remote_catalogs: self.remote_catalogs,
            session_player: self.session_player,
            desktop_player: self.desktop_player,
            framework_player: self.framework_player,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            sync: self.sync.unwrap_or_default(),
            player: self.player.unwrap_or_default(),
            logging: self.logging,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{DesktopEvent, EventListener};

    struct NullDesktopPlayer;

    #[async_trait]
    impl DesktopPlayer for NullDesktopPlayer {
        async fn open(&self, _uri: &str) -> BridgeResult<()> {
            Ok(())
        }
        async fn play(&self) -> BridgeResult<()> {
            Ok(())
        }
        async fn pause(&self) -> BridgeResult<()> {
            Ok(())
        }
        async fn stop(&self) -> BridgeResult<()> {
            Ok(())
        }
        async fn set_time(&self, _position_ms: u64) -> BridgeResult<()> {
            Ok(())
        }
        fn time_ms(&self) -> u64 {
            0
        }
        fn set_event_handler(&self, _handler: EventListener<DesktopEvent>) {}
    }

    fn desktop_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .database_path("/tmp/library.db")
            .scanner(ScannerKind::Filesystem {
                roots: vec![PathBuf::from("/tmp/music")],
            })
            .engine(EngineKind::Desktop)
            .desktop_player(Arc::new(NullDesktopPlayer))
    }

    #[test]
    fn test_builder_applies_defaults() {
        let config = desktop_builder().build().unwrap();

        assert_eq!(config.engine, EngineKind::Desktop);
        assert_eq!(config.sync, SyncSettings::default());
        assert_eq!(config.player.tick_interval_ms, 250);
        assert_eq!(config.player.restart_threshold_ms, 3_000);
        assert!(config.logging.is_none());
        assert!(config.can_watch_changes());
    }

    #[test]
    fn test_missing_database_path() {
        let result = CoreConfig::builder()
            .engine(EngineKind::Desktop)
            .desktop_player(Arc::new(NullDesktopPlayer))
            .build();

        match result {
            Err(Error::Config(message)) => assert!(message.contains("Database path")),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_missing_engine_bridge_is_capability_error() {
        let result = CoreConfig::builder()
            .database_path("/tmp/library.db")
            .scanner(ScannerKind::Filesystem {
                roots: vec![PathBuf::from("/tmp/music")],
            })
            .engine(EngineKind::Framework)
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "FrameworkPlayer")
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_media_store_scanner_requires_bridge() {
        let result = desktop_builder().scanner(ScannerKind::MediaStore).build();

        assert!(matches!(
            result,
            Err(Error::CapabilityMissing { ref capability, .. }) if capability == "MediaStoreQuery"
        ));
    }

    #[test]
    fn test_remote_scanner_requires_catalog() {
        let result = desktop_builder().scanner(ScannerKind::RemoteCatalog).build();
        assert!(matches!(result, Err(Error::CapabilityMissing { .. })));
    }

    #[test]
    fn test_duplicate_scanner_rejected() {
        let result = desktop_builder()
            .scanner(ScannerKind::Filesystem {
                roots: vec![PathBuf::from("/srv/music")],
            })
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_filesystem_scanner_requires_roots() {
        let result = CoreConfig::builder()
            .database_path("/tmp/library.db")
            .scanner(ScannerKind::Filesystem { roots: vec![] })
            .engine(EngineKind::Desktop)
            .desktop_player(Arc::new(NullDesktopPlayer))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_tick_interval_rejected() {
        let result = desktop_builder()
            .player_settings(PlayerSettings {
                tick_interval_ms: 0,
                restart_threshold_ms: 3_000,
            })
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_settings_serde_round_trip() {
        let kind = ScannerKind::Filesystem {
            roots: vec![PathBuf::from("/music")],
        };
        let json = serde_json::to_string(&kind).unwrap();
        assert!(json.contains("\"kind\":\"filesystem\""));
        assert_eq!(serde_json::from_str::<ScannerKind>(&json).unwrap(), kind);

        let settings: SyncSettings =
            serde_json::from_str(r#"{"debounce_ms":100,"scan_timeout_secs":5,"watch_changes":false}"#)
                .unwrap();
        assert_eq!(settings.debounce(), Duration::from_millis(100));
        assert_eq!(settings.scan_timeout(), Duration::from_secs(5));
    }
}
