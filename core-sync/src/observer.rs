//! # Change Observers
//!
//! Turn host content notifications into [`ChangeSignals`]: an infinite,
//! payload-free stream that ends only when its producer goes away.
//!
//! The channel behind every stream holds a single pending signal, so a
//! burst of notifications collapses into one. Debouncing belongs to the
//! syncer's change loop.

use crate::error::{Result, SyncError};
use bridge_traits::{ContentClass, ContentObserver, RegistrationId};
use futures::Stream;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// Producer half of a signal channel
#[derive(Clone)]
pub struct SignalSender {
    tx: mpsc::Sender<()>,
}

impl SignalSender {
    /// Record that the source may have changed. Never blocks; a signal that
    /// is already pending absorbs this one.
    pub fn notify(&self) {
        if self.tx.try_send(()).is_err() {
            debug!("Change signal already pending");
        }
    }
}

/// Stream of change signals, keeping its source registration alive
pub struct ChangeSignals {
    inner: ReceiverStream<()>,
    _guard: Option<Box<dyn Send>>,
}

impl ChangeSignals {
    /// Manually driven signals
    pub fn channel() -> (SignalSender, ChangeSignals) {
        let (tx, rx) = mpsc::channel(1);
        (
            SignalSender { tx },
            ChangeSignals {
                inner: ReceiverStream::new(rx),
                _guard: None,
            },
        )
    }

    fn with_guard(mut self, guard: impl Send + 'static) -> Self {
        self._guard = Some(Box::new(guard));
        self
    }
}

impl Stream for ChangeSignals {
    type Item = ();

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<()>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Unregisters a host callback on drop
pub struct ObserverRegistration {
    observer: Arc<dyn ContentObserver>,
    id: RegistrationId,
}

impl Drop for ObserverRegistration {
    fn drop(&mut self) {
        debug!(registration = self.id.0, "Unregistering content observer");
        self.observer.unregister(self.id);
    }
}

/// Signals from the host content observer
pub struct ChangeObserver {
    observer: Arc<dyn ContentObserver>,
}

impl ChangeObserver {
    pub fn new(observer: Arc<dyn ContentObserver>) -> Self {
        Self { observer }
    }

    /// Register for changes of one content class. Dropping the returned
    /// stream unregisters the callback.
    pub fn observe(&self, class: ContentClass) -> Result<ChangeSignals> {
        let (sender, signals) = ChangeSignals::channel();
        let id = self
            .observer
            .register(class, Box::new(move || sender.notify()))?;

        info!(class = class.as_str(), registration = id.0, "Observing content changes");

        Ok(signals.with_guard(ObserverRegistration {
            observer: Arc::clone(&self.observer),
            id,
        }))
    }
}

/// Signals from filesystem notifications under the scan roots
pub struct FsChangeObserver;

impl FsChangeObserver {
    /// Watch every existing root recursively. Roots that do not exist are
    /// skipped; with none left the stream never yields.
    pub fn watch(roots: &[PathBuf]) -> Result<ChangeSignals> {
        let (sender, signals) = ChangeSignals::channel();

        let mut watcher: RecommendedWatcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| match res {
                Ok(event) if is_content_change(&event.kind) => sender.notify(),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Filesystem watch error"),
            })?;

        let mut watched = 0;
        for root in roots {
            if !root.exists() {
                debug!(root = %root.display(), "Not watching missing root");
                continue;
            }
            watcher
                .watch(root, RecursiveMode::Recursive)
                .map_err(SyncError::from)?;
            watched += 1;
        }

        info!(roots = watched, "Watching filesystem for changes");
        Ok(signals.with_guard(watcher))
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::ChangeCallback;
    use futures::{FutureExt, StreamExt};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeObserver {
        callbacks: Mutex<Vec<(RegistrationId, ChangeCallback)>>,
        unregistered: Mutex<Vec<RegistrationId>>,
    }

    impl FakeObserver {
        fn fire(&self) {
            for (_, callback) in self.callbacks.lock().unwrap().iter() {
                callback();
            }
        }
    }

    impl ContentObserver for FakeObserver {
        fn register(
            &self,
            _class: ContentClass,
            callback: ChangeCallback,
        ) -> bridge_traits::error::Result<RegistrationId> {
            let mut callbacks = self.callbacks.lock().unwrap();
            let id = RegistrationId(callbacks.len() as u64 + 1);
            callbacks.push((id, callback));
            Ok(id)
        }

        fn unregister(&self, id: RegistrationId) {
            self.unregistered.lock().unwrap().push(id);
        }
    }

    #[tokio::test]
    async fn test_burst_collapses_into_one_signal() {
        let host = Arc::new(FakeObserver::default());
        let observer = ChangeObserver::new(host.clone());
        let mut signals = observer.observe(ContentClass::Audio).unwrap();

        host.fire();
        host.fire();
        host.fire();

        assert_eq!(signals.next().await, Some(()));
        assert!(signals.next().now_or_never().is_none());

        host.fire();
        assert_eq!(signals.next().await, Some(()));
    }

    #[tokio::test]
    async fn test_drop_unregisters() {
        let host = Arc::new(FakeObserver::default());
        let signals = ChangeObserver::new(host.clone())
            .observe(ContentClass::All)
            .unwrap();

        drop(signals);

        assert_eq!(*host.unregistered.lock().unwrap(), vec![RegistrationId(1)]);
        host.fire();
    }

    #[tokio::test]
    async fn test_manual_channel_ends_with_sender() {
        let (sender, mut signals) = ChangeSignals::channel();
        sender.notify();
        drop(sender);

        assert_eq!(signals.next().await, Some(()));
        assert_eq!(signals.next().await, None);
    }

    #[test]
    fn test_content_change_kinds() {
        use notify::event::{AccessKind, CreateKind};
        assert!(is_content_change(&EventKind::Create(CreateKind::File)));
        assert!(!is_content_change(&EventKind::Access(AccessKind::Any)));
    }
}
