//! SQLite store backend.
//!
//! One connection guarded by a `parking_lot::Mutex` serves both reads and
//! writes, so a read can only run before or after a whole transaction.

use super::{ChangeEvent, ChangeNotifier, PlayerStore, Snapshot, WorkFn, WriteOutcome};
use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::repo::{PlayerQuery, PlayerRepository, RepoResult, SqlitePlayerRepository, PLAYER_TABLE};
use log::{debug, warn};
use parking_lot::Mutex;
use rusqlite::{Connection, TransactionBehavior};
use std::path::Path;

struct SqliteState {
    conn: Connection,
    revision: u64,
}

pub struct SqliteStore {
    state: Mutex<SqliteState>,
    notifier: ChangeNotifier,
}

impl SqliteStore {
    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    /// Opens a fresh, private in-memory database.
    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            state: Mutex::new(SqliteState { conn, revision: 0 }),
            notifier: ChangeNotifier::new(),
        }
    }
}

impl PlayerStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn write(&self, work: &mut WorkFn<'_>) -> RepoResult<WriteOutcome> {
        let outcome = {
            let mut state = self.state.lock();
            let tx = state
                .conn
                .transaction_with_behavior(TransactionBehavior::Immediate)?;

            let mut repo = SqlitePlayerRepository::new(&tx);
            let result = work(&mut repo);
            let changed_rows = repo.changed_rows();

            match result {
                Ok(()) => tx.commit()?,
                Err(err) => {
                    if let Err(rollback_err) = tx.rollback() {
                        warn!(
                            "event=store_write module=store status=error backend=sqlite error_code=rollback_failed error={rollback_err}"
                        );
                    }
                    return Err(err);
                }
            }

            if changed_rows > 0 {
                state.revision += 1;
            }
            WriteOutcome {
                revision: state.revision,
                changed_rows,
            }
        };

        debug!(
            "event=store_write module=store status=ok backend=sqlite revision={} changed_rows={}",
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
        let state = self.state.lock();
        let players = SqlitePlayerRepository::new(&state.conn).fetch_players(query)?;
        Ok(Snapshot {
            revision: state.revision,
            players,
        })
    }

    fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    fn revision(&self) -> u64 {
        self.state.lock().revision
    }
}
