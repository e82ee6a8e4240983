//! Live query snapshots driven by store change notifications.
//!
//! # Responsibility
//! - Deliver a fresh initial snapshot to every new observation.
//! - Re-read and re-deliver after each commit on the observed table.
//!
//! # Invariants
//! - Read, compare and deliver run under the observation lock, as does
//!   disposal; no snapshot is handed out once `dispose` has returned.
//! - A delivered snapshot never reflects an older revision than the
//!   previous one, and never equals the previous one.
//! - A failed read ends the stream with exactly one `ObservationFailure`.

use crate::repo::{PlayerQuery, RepoError};
use crate::store::{ListenerId, PlayerStore, Snapshot};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

static NEXT_OBSERVATION_ID: AtomicU64 = AtomicU64::new(1);

/// Terminal error of a snapshot stream.
#[derive(Debug)]
pub struct ObservationFailure {
    pub cause: RepoError,
}

impl Display for ObservationFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "observation failed: {}", self.cause)
    }
}

impl Error for ObservationFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.cause)
    }
}

/// Item yielded by a [`SnapshotStream`].
pub type SnapshotItem = Result<Snapshot, ObservationFailure>;

/// Entry point for live queries over one store.
#[derive(Clone)]
pub struct QueryObserver {
    store: Arc<dyn PlayerStore>,
}

impl QueryObserver {
    pub fn new(store: Arc<dyn PlayerStore>) -> Self {
        Self { store }
    }

    /// Starts a cold observation of `query`.
    ///
    /// The initial snapshot is already queued when this returns.
    pub fn observe(&self, query: PlayerQuery) -> SnapshotStream {
        let (outbox, inbox) = mpsc::unbounded_channel();
        let observation = Arc::new(Observation {
            id: NEXT_OBSERVATION_ID.fetch_add(1, Ordering::Relaxed),
            query,
            store: Arc::downgrade(&self.store),
            disposed: AtomicBool::new(false),
            state: Mutex::new(ObservationState {
                outbox: Some(outbox),
                listener: None,
                last: None,
            }),
        });

        let table = observation.query.table();
        let weak_observation = Arc::downgrade(&observation);
        let listener = self.store.notifier().subscribe(move |event| {
            if event.table != table {
                return;
            }
            if let Some(observation) = weak_observation.upgrade() {
                observation.refresh();
            }
        });
        {
            let mut state = observation.state.lock();
            if state.outbox.is_some() {
                state.listener = Some(listener);
            } else {
                // A racing refresh already failed and closed the observation.
                self.store.notifier().unsubscribe(listener);
            }
        }

        info!(
            "event=observe_start module=query_observer status=ok observation_id={} backend={} query={:?}",
            observation.id,
            self.store.backend_name(),
            observation.query
        );
        observation.refresh();

        SnapshotStream { observation, inbox }
    }
}

struct ObservationState {
    /// `None` once the observation is disposed or failed.
    outbox: Option<mpsc::UnboundedSender<SnapshotItem>>,
    listener: Option<ListenerId>,
    last: Option<Snapshot>,
}

struct Observation {
    id: u64,
    query: PlayerQuery,
    store: Weak<dyn PlayerStore>,
    disposed: AtomicBool,
    state: Mutex<ObservationState>,
}

impl Observation {
    fn refresh(&self) {
        let mut state = self.state.lock();
        if state.outbox.is_none() {
            return;
        }
        let Some(store) = self.store.upgrade() else {
            return;
        };

        match store.read(&self.query) {
            Ok(snapshot) => {
                if let Some(last) = state.last.as_mut() {
                    if snapshot.revision < last.revision {
                        return;
                    }
                    if snapshot == *last {
                        last.revision = snapshot.revision;
                        debug!(
                            "event=observe_refresh module=query_observer status=unchanged observation_id={} revision={}",
                            self.id, snapshot.revision
                        );
                        return;
                    }
                }

                debug!(
                    "event=observe_refresh module=query_observer status=ok observation_id={} revision={} rows={}",
                    self.id,
                    snapshot.revision,
                    snapshot.len()
                );
                state.last = Some(snapshot.clone());
                let delivered = state
                    .outbox
                    .as_ref()
                    .map_or(false, |outbox| outbox.send(Ok(snapshot)).is_ok());
                if !delivered {
                    self.close(&mut state, store.as_ref());
                }
            }
            Err(cause) => {
                warn!(
                    "event=observe_refresh module=query_observer status=error observation_id={} error={}",
                    self.id, cause
                );
                if let Some(outbox) = state.outbox.as_ref() {
                    let _ = outbox.send(Err(ObservationFailure { cause }));
                }
                self.close(&mut state, store.as_ref());
            }
        }
    }

    fn dispose(&self) {
        let mut state = self.state.lock();
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        match self.store.upgrade() {
            Some(store) => self.close(&mut state, store.as_ref()),
            None => {
                state.outbox = None;
                state.listener = None;
            }
        }
        info!(
            "event=observe_stop module=query_observer status=ok observation_id={}",
            self.id
        );
    }

    fn close(&self, state: &mut ObservationState, store: &dyn PlayerStore) {
        state.outbox = None;
        if let Some(listener) = state.listener.take() {
            store.notifier().unsubscribe(listener);
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

/// Live sequence of snapshots for one query.
///
/// Yields the initial snapshot, then one snapshot per relevant change.
/// Returns `None` after disposal or after the terminal failure item.
/// Dropping the stream disposes it.
pub struct SnapshotStream {
    observation: Arc<Observation>,
    inbox: mpsc::UnboundedReceiver<SnapshotItem>,
}

impl SnapshotStream {
    /// Waits for the next snapshot.
    pub async fn next(&mut self) -> Option<SnapshotItem> {
        if self.observation.is_disposed() {
            return None;
        }
        let item = self.inbox.recv().await;
        self.filter_disposed(item)
    }

    /// Returns an already delivered snapshot without waiting.
    pub fn try_next(&mut self) -> Option<SnapshotItem> {
        if self.observation.is_disposed() {
            return None;
        }
        let item = self.inbox.try_recv().ok();
        self.filter_disposed(item)
    }

    /// Blocks the current thread until the next snapshot.
    ///
    /// # Panics
    /// Panics when called from inside an async runtime; use `next().await`.
    pub fn blocking_next(&mut self) -> Option<SnapshotItem> {
        if self.observation.is_disposed() {
            return None;
        }
        let item = self.inbox.blocking_recv();
        self.filter_disposed(item)
    }

    /// Drains every snapshot delivered so far.
    pub fn drain(&mut self) -> Vec<SnapshotItem> {
        std::iter::from_fn(|| self.try_next()).collect()
    }

    /// Stops the observation. Safe to call repeatedly.
    pub fn dispose(&self) {
        self.observation.dispose();
    }

    /// Handle that can dispose this stream from another thread.
    pub fn disposer(&self) -> StreamDisposer {
        StreamDisposer {
            observation: Arc::clone(&self.observation),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.observation.is_disposed()
    }

    fn filter_disposed(&self, item: Option<SnapshotItem>) -> Option<SnapshotItem> {
        if self.observation.is_disposed() {
            None
        } else {
            item
        }
    }
}

impl Drop for SnapshotStream {
    fn drop(&mut self) {
        self.observation.dispose();
    }
}

/// Cloneable disposal handle for a [`SnapshotStream`].
#[derive(Clone)]
pub struct StreamDisposer {
    observation: Arc<Observation>,
}

impl StreamDisposer {
    pub fn dispose(&self) {
        self.observation.dispose();
    }
}
