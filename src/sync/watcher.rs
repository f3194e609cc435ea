//! Watcher lifecycle: owns the OS subscription and the worker thread that
//! applies events to the store.
//!
//! `notify` delivers events on its own thread; the callback only forwards them
//! over a channel. One worker thread drains that channel and also runs the
//! periodic reconciliation pass, so live events and reconciliation never touch
//! the store at the same time. The store itself sits behind a mutex so callers
//! (the `sync` command, tests) can share it with a running watcher.

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::dispatcher::Dispatcher;
use super::event::{FsEvent, RenamePairing};
use super::filter::EligibilityFilter;
use super::reconciler::{Reconciler, SyncReport};
use crate::config::validate_notes_dir;
use crate::error::{SyncError, WatchError};
use crate::store::RecordStore;

/// How long the worker sleeps between checks when periodic reconciliation is off.
const IDLE_POLL: Duration = Duration::from_secs(3600);

enum WorkerMsg {
    Fs(notify::Result<notify::Event>),
    Stop,
}

struct RunningWatcher {
    // Dropping this ends the OS subscription.
    watcher: RecommendedWatcher,
    tx: Sender<WorkerMsg>,
    handle: JoinHandle<()>,
}

/// Starts and stops live synchronization of one notes directory.
pub struct WatcherManager<S: RecordStore + Send + 'static> {
    notes_dir: PathBuf,
    store: Arc<Mutex<S>>,
    dispatcher: Dispatcher,
    reconcile_every: Option<Duration>,
    running: Option<RunningWatcher>,
}

impl<S: RecordStore + Send + 'static> WatcherManager<S> {
    pub fn new(notes_dir: impl Into<PathBuf>, store: Arc<Mutex<S>>, filter: EligibilityFilter) -> Self {
        Self {
            notes_dir: notes_dir.into(),
            store,
            dispatcher: Dispatcher::new(filter),
            reconcile_every: None,
            running: None,
        }
    }

    /// Run a reconciliation pass on the worker thread every `interval`.
    /// A zero interval disables periodic passes.
    pub fn with_reconcile_interval(mut self, interval: Duration) -> Self {
        self.reconcile_every = (!interval.is_zero()).then_some(interval);
        self
    }

    pub fn notes_dir(&self) -> &Path {
        &self.notes_dir
    }

    pub fn store(&self) -> &Arc<Mutex<S>> {
        &self.store
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Validate the notes directory, subscribe to recursive change
    /// notifications, and spawn the worker.
    ///
    /// Fails without side effects if the directory is missing or not a
    /// directory, or if the watcher is already running.
    pub fn start(&mut self) -> Result<(), WatchError> {
        if self.running.is_some() {
            return Err(WatchError::AlreadyRunning);
        }
        let root = validate_notes_dir(&self.notes_dir)?;

        let (tx, rx) = mpsc::channel::<WorkerMsg>();
        let event_tx = tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            // The worker is gone during shutdown; late events are dropped.
            let _ = event_tx.send(WorkerMsg::Fs(res));
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        let worker = Worker {
            store: Arc::clone(&self.store),
            dispatcher: self.dispatcher.clone(),
            reconciler: Reconciler::new(root.clone(), self.dispatcher.filter().clone()),
            reconcile_every: self.reconcile_every,
        };
        let handle = thread::Builder::new()
            .name("notewatch-watcher".into())
            .spawn(move || worker.run(rx))
            .map_err(WatchError::Spawn)?;

        info!(dir = %root.display(), interval = ?self.reconcile_every, "watching notes directory");
        self.running = Some(RunningWatcher { watcher, tx, handle });
        Ok(())
    }

    /// Unsubscribe and wait for the worker to finish the event it is handling.
    /// Stopping a stopped watcher is a no-op.
    pub fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        drop(running.watcher);
        let _ = running.tx.send(WorkerMsg::Stop);
        if running.handle.join().is_err() {
            error!("watcher thread panicked");
        }
        info!(dir = %self.notes_dir.display(), "stopped watching notes directory");
    }

    /// Run one reconciliation pass on the calling thread, holding the store lock.
    pub fn reconcile_now(&self) -> Result<SyncReport, SyncError> {
        let root = self
            .notes_dir
            .canonicalize()
            .map_err(|_| SyncError::RootUnavailable(self.notes_dir.clone()))?;
        let reconciler = Reconciler::new(root, self.dispatcher.filter().clone());
        let mut store = lock(&self.store);
        reconciler.sync(&mut *store)
    }
}

impl<S: RecordStore + Send + 'static> Drop for WatcherManager<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Worker<S> {
    store: Arc<Mutex<S>>,
    dispatcher: Dispatcher,
    reconciler: Reconciler,
    reconcile_every: Option<Duration>,
}

impl<S: RecordStore> Worker<S> {
    fn run(self, rx: mpsc::Receiver<WorkerMsg>) {
        debug!("watcher worker started");
        let mut pairing = RenamePairing::new();
        let mut next_reconcile = self.reconcile_every.map(|every| Instant::now() + every);

        loop {
            let wake_at = match (next_reconcile, pairing.next_deadline()) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
            let wait = wake_at
                .map(|at| at.saturating_duration_since(Instant::now()))
                .unwrap_or(IDLE_POLL);

            match rx.recv_timeout(wait) {
                Ok(WorkerMsg::Fs(Ok(event))) => {
                    let events = pairing.translate(&event, Instant::now());
                    self.apply(&events);
                }
                Ok(WorkerMsg::Fs(Err(e))) => {
                    warn!(error = %e, "filesystem notification error");
                }
                Ok(WorkerMsg::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }

            // Checked on every turn: a steady event stream never times out.
            let now = Instant::now();
            self.apply(&pairing.expire(now));
            if let (Some(every), Some(at)) = (self.reconcile_every, next_reconcile) {
                if now >= at {
                    if let Err(e) = self.reconciler.sync(&mut *lock(&self.store)) {
                        error!(error = %e, "periodic reconciliation failed");
                    }
                    next_reconcile = Some(Instant::now() + every);
                }
            }
        }

        self.apply(&pairing.flush());
        debug!("watcher worker exiting");
    }

    fn apply(&self, events: &[FsEvent]) {
        if events.is_empty() {
            return;
        }
        let mut store = lock(&self.store);
        for fs_event in events {
            let outcome = self.dispatcher.dispatch(&mut *store, fs_event);
            debug!(?fs_event, ?outcome, "dispatched event");
        }
    }
}

/// A panic while holding the lock leaves the store usable; every write is
/// its own transaction.
fn lock<S>(store: &Mutex<S>) -> MutexGuard<'_, S> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}
