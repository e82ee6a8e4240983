//! Store backends behind one narrow capability trait.
//!
//! # Responsibility
//! - Execute a unit of work atomically with exclusive write access.
//! - Execute read-only player queries against committed state.
//! - Announce every committed write through a [`ChangeNotifier`].
//!
//! # Invariants
//! - At most one unit of work runs per store at any instant.
//! - Readers never observe a partially applied unit of work.
//! - `revision` grows by one for each commit that changed rows and is
//!   published to listeners after the store lock is released.

pub mod memory_store;
pub mod notifier;
pub mod sqlite_store;

pub use memory_store::MemoryStore;
pub use notifier::{ChangeNotifier, ListenerId};
pub use sqlite_store::SqliteStore;

use crate::config::{CoreConfig, StoreBackend};
use crate::db::DbResult;
use crate::model::player::Player;
use crate::repo::{PlayerQuery, PlayerRepository, RepoResult};
use std::sync::Arc;

/// Body of a unit of work as seen by a backend.
pub type WorkFn<'w> = dyn FnMut(&mut dyn PlayerRepository) -> RepoResult<()> + 'w;

/// Signal published after a write commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub revision: u64,
    pub table: &'static str,
    pub changed_rows: u64,
}

/// Result of one committed unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Store revision after the commit.
    pub revision: u64,
    pub changed_rows: u64,
}

/// Query result materialized at one store revision.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub revision: u64,
    pub players: Vec<Player>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

/// Two snapshots are equal when they hold the same players, whatever the
/// revision they were read at.
impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.players == other.players
    }
}

impl Eq for Snapshot {}

/// Capabilities every store backend provides.
pub trait PlayerStore: Send + Sync {
    /// Short backend label used in log events.
    fn backend_name(&self) -> &'static str;

    /// Runs `work` inside one transaction.
    ///
    /// Commits when `work` returns `Ok`, rolls back every effect otherwise.
    /// A panic inside `work` also leaves committed state untouched.
    fn write(&self, work: &mut WorkFn<'_>) -> RepoResult<WriteOutcome>;

    /// Evaluates `query` against the latest committed state.
    fn read(&self, query: &PlayerQuery) -> RepoResult<Snapshot>;

    /// Notifier fired after each commit that changed at least one row.
    fn notifier(&self) -> &ChangeNotifier;

    /// Revision of the latest commit.
    fn revision(&self) -> u64;
}

/// Opens the backend selected by `config`.
pub fn open_store(config: &CoreConfig) -> DbResult<Arc<dyn PlayerStore>> {
    let store: Arc<dyn PlayerStore> = match (config.backend, config.database_path.as_ref()) {
        (StoreBackend::Memory, _) => Arc::new(MemoryStore::new()),
        (StoreBackend::Sqlite, Some(path)) => Arc::new(SqliteStore::open(path)?),
        (StoreBackend::Sqlite, None) => Arc::new(SqliteStore::open_in_memory()?),
    };
    Ok(store)
}
