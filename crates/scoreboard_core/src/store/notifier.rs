//! Change notification fan-out for committed writes.
//!
//! Listeners are stored as `Arc<dyn Fn(&ChangeEvent)>` and the list is
//! snapshotted on emit:
//!   - a listener removed during emission still sees the current event,
//!   - a listener added during emission waits for the next one.
//!
//! The lock is never held while listeners run, so a listener may call
//! `subscribe`/`unsubscribe` on the same notifier.

use super::ChangeEvent;
use log::warn;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Handle returned by [`ChangeNotifier::subscribe`].
pub type ListenerId = u64;

type Listener = dyn Fn(&ChangeEvent) + Send + Sync;

/// Typed synchronous notifier owned by each store backend.
pub struct ChangeNotifier {
    listeners: Mutex<Vec<(ListenerId, Arc<Listener>)>>,
    next_id: AtomicU64,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers `listener` for every subsequent commit.
    pub fn subscribe(&self, listener: impl Fn(&ChangeEvent) + Send + Sync + 'static) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: ListenerId) {
        self.listeners.lock().retain(|(listener_id, _)| *listener_id != id);
    }

    /// Delivers `event` to every registered listener.
    ///
    /// A panicking listener is logged and skipped; the remaining listeners
    /// still run.
    pub fn emit(&self, event: &ChangeEvent) {
        let snapshot: Vec<(ListenerId, Arc<Listener>)> = self
            .listeners
            .lock()
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect();

        for (id, listener) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!(
                    "event=change_notify module=store status=error listener_id={id} revision={} error_code=listener_panicked",
                    event.revision
                );
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}
