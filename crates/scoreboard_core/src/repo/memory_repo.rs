//! In-memory player repository used by the memory store backend.
//!
//! # Invariants
//! - Ids are assigned from a monotonic counter and never reused.
//! - Query results follow the same rules as the SQLite backend.

use crate::model::player::{Player, PlayerId};
use crate::repo::player_repo::{PlayerRepository, RepoError, RepoResult};
use crate::repo::query::PlayerQuery;
use std::collections::BTreeMap;

/// Row storage for the memory backend.
///
/// Cloned at the start of each write so a failed unit of work can be
/// discarded without touching the committed table.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    rows: BTreeMap<PlayerId, Player>,
    last_id: PlayerId,
}

impl MemoryTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn fetch(&self, query: &PlayerQuery) -> Vec<Player> {
        query.apply(self.rows.values())
    }
}

/// Repository over a working copy of a `MemoryTable`.
pub struct MemoryPlayerRepository<'t> {
    table: &'t mut MemoryTable,
    changed_rows: u64,
}

impl<'t> MemoryPlayerRepository<'t> {
    pub fn new(table: &'t mut MemoryTable) -> Self {
        Self {
            table,
            changed_rows: 0,
        }
    }

    pub fn changed_rows(&self) -> u64 {
        self.changed_rows
    }
}

impl PlayerRepository for MemoryPlayerRepository<'_> {
    fn count_players(&self) -> RepoResult<u64> {
        Ok(self.table.rows.len() as u64)
    }

    fn fetch_players(&self, query: &PlayerQuery) -> RepoResult<Vec<Player>> {
        Ok(self.table.fetch(query))
    }

    fn get_player(&self, id: PlayerId) -> RepoResult<Option<Player>> {
        Ok(self.table.rows.get(&id).cloned())
    }

    fn insert_player(&mut self, player: &mut Player) -> RepoResult<PlayerId> {
        player.validate()?;

        let id = match player.id {
            Some(id) if self.table.rows.contains_key(&id) => {
                return Err(RepoError::InvalidData(format!(
                    "player id {id} already exists"
                )));
            }
            Some(id) => id,
            None => self.table.last_id + 1,
        };

        self.table.last_id = self.table.last_id.max(id);
        player.id = Some(id);
        self.table.rows.insert(id, player.clone());
        self.changed_rows += 1;
        Ok(id)
    }

    fn update_player(&mut self, player: &Player) -> RepoResult<()> {
        player.validate()?;
        let id = player.require_id()?;

        let slot = self.table.rows.get_mut(&id).ok_or(RepoError::NotFound(id))?;
        *slot = player.clone();
        self.changed_rows += 1;
        Ok(())
    }

    fn delete_player(&mut self, id: PlayerId) -> RepoResult<bool> {
        let removed = self.table.rows.remove(&id).is_some();
        if removed {
            self.changed_rows += 1;
        }
        Ok(removed)
    }

    fn delete_all_players(&mut self) -> RepoResult<u64> {
        let removed = self.table.rows.len() as u64;
        self.table.rows.clear();
        self.changed_rows += removed;
        Ok(removed)
    }
}
