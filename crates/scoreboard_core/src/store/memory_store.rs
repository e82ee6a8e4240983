//! In-memory store backend.
//!
//! Writers are serialized by `writer` and run on a private copy of the
//! table; the copy replaces the committed table in one short exclusive
//! section, so readers keep going while a unit of work runs.

use super::{ChangeEvent, ChangeNotifier, PlayerStore, Snapshot, WorkFn, WriteOutcome};
use crate::repo::{
    MemoryPlayerRepository, MemoryTable, PlayerQuery, RepoError, RepoResult, PLAYER_TABLE,
};
use log::debug;
use parking_lot::{Mutex, RwLock};

struct Committed {
    table: MemoryTable,
    revision: u64,
}

pub struct MemoryStore {
    committed: RwLock<Committed>,
    writer: Mutex<()>,
    read_failure: Mutex<Option<String>>,
    notifier: ChangeNotifier,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            committed: RwLock::new(Committed {
                table: MemoryTable::default(),
                revision: 0,
            }),
            writer: Mutex::new(()),
            read_failure: Mutex::new(None),
            notifier: ChangeNotifier::new(),
        }
    }

    /// Makes every subsequent read fail with `RepoError::Unavailable`.
    ///
    /// Fault injection for tests; not part of the supported API.
    #[doc(hidden)]
    pub fn fail_reads(&self, message: impl Into<String>) {
        *self.read_failure.lock() = Some(message.into());
    }

    /// Undoes [`MemoryStore::fail_reads`].
    #[doc(hidden)]
    pub fn restore_reads(&self) {
        *self.read_failure.lock() = None;
    }

    pub fn len(&self) -> usize {
        self.committed.read().table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.read().table.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn write(&self, work: &mut WorkFn<'_>) -> RepoResult<WriteOutcome> {
        let outcome = {
            let _writer = self.writer.lock();
            let mut working = self.committed.read().table.clone();

            let mut repo = MemoryPlayerRepository::new(&mut working);
            work(&mut repo)?;
            let changed_rows = repo.changed_rows();

            let mut committed = self.committed.write();
            if changed_rows > 0 {
                committed.table = working;
                committed.revision += 1;
            }
            WriteOutcome {
                revision: committed.revision,
                changed_rows,
            }
        };

        debug!(
            "event=store_write module=store status=ok backend=memory revision={} changed_rows={}",
            outcome.revision, outcome.changed_rows
        );
        if outcome.changed_rows > 0 {
            self.notifier.emit(&ChangeEvent {
                revision: outcome.revision,
                table: PLAYER_TABLE,
                changed_rows: outcome.changed_rows,
            });
        }
        Ok(outcome)
    }

    fn read(&self, query: &PlayerQuery) -> RepoResult<Snapshot> {
        if let Some(message) = self.read_failure.lock().clone() {
            return Err(RepoError::Unavailable(message));
        }
        let committed = self.committed.read();
        Ok(Snapshot {
            revision: committed.revision,
            players: committed.table.fetch(query),
        })
    }

    fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    fn revision(&self) -> u64 {
        self.committed.read().revision
    }
}
