//! # Library Syncer
//!
//! Reconciles the persisted library with every registered scanner.
//!
//! ## Workflow
//!
//! For each source a run:
//! 1. Takes the source's lock, so full and scoped runs of one source never
//!    overlap
//! 2. Scans the source into a complete [`MediaSnapshot`](crate::MediaSnapshot)
//!    (bounded by the scan timeout)
//! 3. Diffs it against the persisted fingerprints
//! 4. Applies the change set in one transaction
//! 5. Records the run in the sync history and announces it on the event bus
//!
//! A scan failure, timeout or cancellation leaves the store untouched for
//! that source.
//!
//! ## Joining and cancellation
//!
//! A full resync requested while another is in flight joins it: both callers
//! get a stream over the same run. When every stream of a run is dropped the
//! run is cancelled before it commits.

use crate::diff::{diff, DiffScope, PersistedFingerprints};
use crate::error::{Result, SyncError};
use crate::job::{SyncJob, SyncScope, SyncStats, SyncStatus};
use crate::scanner::{LibraryScanner, ScanOutcome};
use core_library::repositories::{SqliteSyncRunRepository, SyncRunRepository};
use core_library::{AppliedChanges, LibraryStore};
use core_runtime::config::SyncSettings;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent, SyncEvent};
use futures::{FutureExt, Stream, StreamExt};
use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Syncer tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Quiet period after a change signal before a resync starts
    pub debounce: Duration,
    /// Upper bound for one source scan
    pub scan_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::from(&SyncSettings::default())
    }
}

impl From<&SyncSettings> for SyncConfig {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            debounce: settings.debounce(),
            scan_timeout: settings.scan_timeout(),
        }
    }
}

// ============================================================================
// Status stream
// ============================================================================

/// Cancels its run when the last subscriber lets go
struct RunHandle {
    cancel: CancellationToken,
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Status of one run: `Syncing`, then exactly one terminal status, then the
/// end of the stream.
///
/// Holding the stream keeps the run alive.
pub struct SyncStatusStream {
    inner: WatchStream<SyncStatus>,
    run: Arc<RunHandle>,
    announced: bool,
    finished: bool,
}

impl SyncStatusStream {
    fn new(status: watch::Receiver<SyncStatus>, run: Arc<RunHandle>) -> Self {
        Self {
            inner: WatchStream::new(status),
            run,
            announced: false,
            finished: false,
        }
    }

    /// Drive the run to its terminal status
    pub async fn wait(mut self) -> SyncStatus {
        let mut last = SyncStatus::cancelled();
        while let Some(status) = self.next().await {
            last = status;
        }
        last
    }
}

impl Stream for SyncStatusStream {
    type Item = SyncStatus;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<SyncStatus>> {
        if self.finished {
            return Poll::Ready(None);
        }
        if !self.announced {
            self.announced = true;
            return Poll::Ready(Some(SyncStatus::Syncing));
        }

        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(status)) if status.is_terminal() => {
                    self.finished = true;
                    return Poll::Ready(Some(status));
                }
                Poll::Ready(Some(_)) => continue,
                Poll::Ready(None) => {
                    self.finished = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

// ============================================================================
// Syncer
// ============================================================================

/// The full run currently in flight
struct ActiveRun {
    handle: Weak<RunHandle>,
    cancel: CancellationToken,
    status: watch::Receiver<SyncStatus>,
}

/// What a run scans
#[derive(Clone)]
enum Target {
    All,
    Uris(Arc<HashSet<String>>),
}

impl Target {
    fn scope(&self) -> SyncScope {
        match self {
            Target::All => SyncScope::Full,
            Target::Uris(_) => SyncScope::Scoped,
        }
    }
}

struct Inner {
    store: LibraryStore,
    runs: Arc<dyn SyncRunRepository>,
    scanners: Vec<Arc<dyn LibraryScanner>>,
    locks: HashMap<String, Arc<Mutex<()>>>,
    events: EventBus,
    config: SyncConfig,
    status: watch::Sender<SyncStatus>,
    active_full: Mutex<Option<ActiveRun>>,
}

/// Cheap to clone; clones share runs, locks and status.
#[derive(Clone)]
pub struct LibrarySyncer {
    inner: Arc<Inner>,
}

impl LibrarySyncer {
    /// # Errors
    ///
    /// `DuplicateSource` when two scanners report the same source id.
    pub fn new(
        store: LibraryStore,
        scanners: Vec<Arc<dyn LibraryScanner>>,
        events: EventBus,
        config: SyncConfig,
    ) -> Result<Self> {
        let runs = Arc::new(SqliteSyncRunRepository::new(store.pool().clone()));
        Self::with_history(store, runs, scanners, events, config)
    }

    /// Like [`LibrarySyncer::new`] with an explicit sync history
    pub fn with_history(
        store: LibraryStore,
        runs: Arc<dyn SyncRunRepository>,
        scanners: Vec<Arc<dyn LibraryScanner>>,
        events: EventBus,
        config: SyncConfig,
    ) -> Result<Self> {
        let mut locks = HashMap::new();
        for scanner in &scanners {
            let source_id = scanner.source_id().to_string();
            if locks.contains_key(&source_id) {
                return Err(SyncError::DuplicateSource(source_id));
            }
            locks.insert(source_id, Arc::new(Mutex::new(())));
        }

        info!(sources = scanners.len(), "Library syncer ready");

        let (status, _) = watch::channel(SyncStatus::Idle);
        Ok(Self {
            inner: Arc::new(Inner {
                store,
                runs,
                scanners,
                locks,
                events,
                config,
                status,
                active_full: Mutex::new(None),
            }),
        })
    }

    pub fn source_ids(&self) -> Vec<&str> {
        self.inner.scanners.iter().map(|s| s.source_id()).collect()
    }

    /// Last status of any run
    pub fn status(&self) -> SyncStatus {
        self.inner.status.borrow().clone()
    }

    /// Every status change of any run
    pub fn watch_status(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status.subscribe()
    }

    /// Rescan every source. Joins the full run already in flight, if any.
    pub async fn resync_all(&self) -> SyncStatusStream {
        let mut active = self.inner.active_full.lock().await;

        if let Some(run) = active.as_ref() {
            if let Some(handle) = run.handle.upgrade() {
                if !run.status.borrow().is_terminal() {
                    debug!("Joining in-flight full resync");
                    return SyncStatusStream::new(run.status.clone(), handle);
                }
            }
        }

        let (stream, cancel, status) = self.spawn_run(Target::All);
        *active = Some(ActiveRun {
            handle: Arc::downgrade(&stream.run),
            cancel,
            status,
        });
        stream
    }

    /// Rescan only `uris` in every source that owns them. Never deletes a
    /// URI the scanner did not report as gone.
    pub fn resync_by_uris(&self, uris: HashSet<String>) -> SyncStatusStream {
        let (stream, _, _) = self.spawn_run(Target::Uris(Arc::new(uris)));
        stream
    }

    /// Cancel the in-flight full run. Nothing it has not committed yet is
    /// written.
    pub async fn cancel(&self) {
        if let Some(run) = self.inner.active_full.lock().await.as_ref() {
            info!("Cancelling full resync");
            run.cancel.cancel();
        }
    }

    /// Coalescing loop: after a signal, wait the debounce period, absorb the
    /// signals that arrived meanwhile and run one full resync. Ends when the
    /// signal stream ends; abort the handle to stop it earlier.
    pub fn run_on_changes<S>(&self, signals: S) -> JoinHandle<()>
    where
        S: Stream<Item = ()> + Send + 'static,
    {
        let syncer = self.clone();
        let debounce = self.inner.config.debounce;

        tokio::spawn(async move {
            let mut signals = Box::pin(signals);

            while signals.next().await.is_some() {
                tokio::time::sleep(debounce).await;

                let mut coalesced = 0;
                while let Some(Some(())) = signals.next().now_or_never() {
                    coalesced += 1;
                }
                debug!(coalesced, "Change signals coalesced");

                match syncer.resync_all().await.wait().await {
                    SyncStatus::Failed(reason) => warn!(%reason, "Change-driven resync failed"),
                    status => debug!(%status, "Change-driven resync finished"),
                }
            }

            debug!("Change signal stream ended");
        })
    }

    fn spawn_run(
        &self,
        target: Target,
    ) -> (SyncStatusStream, CancellationToken, watch::Receiver<SyncStatus>) {
        let cancel = CancellationToken::new();
        let (tx, rx) = watch::channel(SyncStatus::Syncing);
        let handle = Arc::new(RunHandle {
            cancel: cancel.clone(),
        });

        self.inner.status.send_replace(SyncStatus::Syncing);

        let inner = Arc::clone(&self.inner);
        let token = cancel.clone();
        tokio::spawn(async move {
            let status = inner.run(target, token).await;
            inner.status.send_replace(status.clone());
            tx.send_replace(status);
        });

        (SyncStatusStream::new(rx.clone(), handle), cancel, rx)
    }
}

impl Inner {
    #[instrument(skip_all, fields(scope = %target.scope()))]
    async fn run(&self, target: Target, cancel: CancellationToken) -> SyncStatus {
        let mut total = SyncStats::default();
        let mut first_failure: Option<SyncError> = None;

        for scanner in &self.scanners {
            match self.sync_source(scanner.as_ref(), &target, &cancel).await {
                Ok(stats) => total.merge(stats),
                Err(SyncError::Cancelled) => return SyncStatus::cancelled(),
                Err(e) => {
                    error!(source_id = scanner.source_id(), error = %e, "Source sync failed");
                    first_failure.get_or_insert(e);
                }
            }
        }

        match first_failure {
            Some(e) => SyncStatus::from_error(&e),
            None => {
                info!(
                    added = total.added,
                    updated = total.updated,
                    deleted = total.deleted,
                    unchanged = total.unchanged,
                    skipped = total.skipped,
                    "Sync finished"
                );
                SyncStatus::Success(total)
            }
        }
    }

    #[instrument(skip_all, fields(source_id = scanner.source_id()))]
    async fn sync_source(
        &self,
        scanner: &dyn LibraryScanner,
        target: &Target,
        cancel: &CancellationToken,
    ) -> Result<SyncStats> {
        let source_id = scanner.source_id();
        let lock = self
            .locks
            .get(source_id)
            .cloned()
            .ok_or_else(|| SyncError::unavailable(source_id, "source not registered"))?;

        let _guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SyncError::Cancelled),
            guard = lock.lock() => guard,
        };

        let scope = target.scope();
        let job = SyncJob::start(source_id, scope, self.store.now_ms());
        self.runs.insert(job.record()).await?;
        self.emit(CoreEvent::Sync(SyncEvent::Started {
            run_id: job.id().to_string(),
            source_id: source_id.to_string(),
            scope: scope.as_str().to_string(),
        }));

        match self.reconcile(scanner, target, cancel).await {
            Ok((stats, applied)) => {
                let run_id = job.id().to_string();
                let duration_ms = job.elapsed_ms();
                self.runs
                    .finish(&job.complete(stats, self.store.now_ms()))
                    .await?;

                self.announce(&applied);
                self.emit(CoreEvent::Sync(SyncEvent::Completed {
                    run_id,
                    source_id: source_id.to_string(),
                    added: stats.added,
                    updated: stats.updated,
                    deleted: stats.deleted,
                    unchanged: stats.unchanged,
                    skipped: stats.skipped,
                    duration_ms,
                }));
                Ok(stats)
            }
            Err(e) => {
                let run_id = job.id().to_string();
                if let Err(history) = self.runs.finish(&job.fail(&e, self.store.now_ms())).await {
                    warn!(error = %history, "Could not record failed run");
                }
                self.emit(CoreEvent::Sync(SyncEvent::Failed {
                    run_id,
                    source_id: source_id.to_string(),
                    message: SyncStatus::from_error(&e).to_string(),
                }));
                Err(e)
            }
        }
    }

    /// Scan, diff and commit one source
    async fn reconcile(
        &self,
        scanner: &dyn LibraryScanner,
        target: &Target,
        cancel: &CancellationToken,
    ) -> Result<(SyncStats, AppliedChanges)> {
        let source_id = scanner.source_id();
        let outcome = self.scan(scanner, target, cancel).await?;
        outcome.snapshot.validate()?;

        let persisted = PersistedFingerprints {
            tracks: self.store.track_fingerprints(source_id).await?,
            videos: self.store.video_fingerprints(source_id).await?,
        };
        let scope = match target {
            Target::All => DiffScope::Full,
            Target::Uris(_) => DiffScope::Uris {
                missing: &outcome.missing,
            },
        };
        let delta = diff(source_id, &outcome.snapshot, &persisted, scope);

        debug!(
            writes = delta.changes.write_count(),
            unchanged = delta.unchanged,
            "Snapshot diffed"
        );

        // Dropping the apply future rolls its transaction back.
        let applied = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SyncError::Cancelled),
            applied = self.store.apply(&delta.changes) => applied?,
        };

        let stats = SyncStats {
            added: applied.added(),
            updated: applied.updated(),
            deleted: applied.deleted(),
            unchanged: delta.unchanged,
            skipped: outcome.skipped as u64,
        };
        Ok((stats, applied))
    }

    async fn scan(
        &self,
        scanner: &dyn LibraryScanner,
        target: &Target,
        cancel: &CancellationToken,
    ) -> Result<ScanOutcome> {
        let timeout = self.config.scan_timeout;
        let scan = async {
            match target {
                Target::All => scanner.scan_all().await,
                Target::Uris(uris) => scanner.scan_by_uris(uris).await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SyncError::Cancelled),
            result = tokio::time::timeout(timeout, scan) => match result {
                Ok(outcome) => outcome,
                Err(_) => Err(SyncError::Timeout {
                    source_id: scanner.source_id().to_string(),
                    secs: timeout.as_secs(),
                }),
            },
        }
    }

    fn announce(&self, applied: &AppliedChanges) {
        for track in &applied.tracks_added {
            self.emit(CoreEvent::Library(LibraryEvent::TrackAdded {
                track_id: track.track_id.clone(),
                content_uri: track.content_uri.clone(),
                title: track.title.clone(),
            }));
        }
        for track in &applied.tracks_updated {
            self.emit(CoreEvent::Library(LibraryEvent::TrackUpdated {
                track_id: track.track_id.clone(),
                content_uri: track.content_uri.clone(),
            }));
        }
        for track in &applied.tracks_deleted {
            self.emit(CoreEvent::Library(LibraryEvent::TrackDeleted {
                track_id: track.track_id.clone(),
                content_uri: track.content_uri.clone(),
            }));
        }

        let collected = applied.albums_collected + applied.artists_collected + applied.genres_collected;
        if collected > 0 {
            self.emit(CoreEvent::Library(LibraryEvent::EntitiesCollected {
                albums: applied.albums_collected,
                artists: applied.artists_collected,
                genres: applied.genres_collected,
            }));
        }
    }

    fn emit(&self, event: CoreEvent) {
        // No subscribers is not an error for the syncer.
        self.events.emit(event).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn handle() -> Arc<RunHandle> {
        Arc::new(RunHandle {
            cancel: CancellationToken::new(),
        })
    }

    #[tokio::test]
    async fn test_stream_announces_syncing_then_one_terminal() {
        let (tx, rx) = watch::channel(SyncStatus::Syncing);
        let mut statuses = SyncStatusStream::new(rx, handle());

        assert_eq!(statuses.next().await, Some(SyncStatus::Syncing));
        tx.send_replace(SyncStatus::Success(SyncStats::default()));
        assert_eq!(
            statuses.next().await,
            Some(SyncStatus::Success(SyncStats::default()))
        );
        assert_eq!(statuses.next().await, None);
    }

    #[tokio::test]
    async fn test_late_subscriber_still_sees_syncing_first() {
        let (_tx, rx) = watch::channel(SyncStatus::Failed("offline".to_string()));
        let statuses: Vec<_> = SyncStatusStream::new(rx, handle()).collect().await;

        assert_eq!(
            statuses,
            vec![SyncStatus::Syncing, SyncStatus::Failed("offline".to_string())]
        );
    }

    #[tokio::test]
    async fn test_dropping_last_stream_cancels_run() {
        let run = handle();
        let token = run.cancel.clone();
        let (_tx, rx) = watch::channel(SyncStatus::Syncing);

        let first = SyncStatusStream::new(rx.clone(), Arc::clone(&run));
        let second = SyncStatusStream::new(rx, run);

        drop(first);
        assert!(!token.is_cancelled());
        drop(second);
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_config_from_settings() {
        let settings = SyncSettings {
            debounce_ms: 40,
            scan_timeout_secs: 2,
            watch_changes: false,
        };
        let config = SyncConfig::from(&settings);
        assert_eq!(config.debounce, Duration::from_millis(40));
        assert_eq!(config.scan_timeout, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_change_loop_ends_with_signals() {
        let pool = core_library::create_test_pool().await.unwrap();
        let store = LibraryStore::new(pool, Arc::new(bridge_traits::SystemClock));
        let syncer = LibrarySyncer::new(
            store,
            Vec::new(),
            EventBus::default(),
            SyncConfig {
                debounce: Duration::from_millis(1),
                scan_timeout: Duration::from_secs(1),
            },
        )
        .unwrap();

        syncer.run_on_changes(stream::iter(vec![(), ()])).await.unwrap();

        assert_eq!(syncer.status(), SyncStatus::Success(SyncStats::default()));
    }
}
