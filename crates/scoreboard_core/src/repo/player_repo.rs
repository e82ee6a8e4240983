//! Player repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide the CRUD surface a unit of work sees inside a transaction.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths call `Player::validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - `changed_rows` counts every row touched through this handle.

use crate::db::DbError;
use crate::model::player::{Player, PlayerId, PlayerValidationError};
use crate::repo::query::PlayerQuery;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const PLAYER_SELECT_SQL: &str = "SELECT id, name, score FROM player";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by every store backend.
#[derive(Debug)]
pub enum RepoError {
    Validation(PlayerValidationError),
    Db(DbError),
    NotFound(PlayerId),
    InvalidData(String),
    /// A unit of work gave up on its own.
    Aborted(String),
    /// The backend cannot serve the request right now.
    Unavailable(String),
}

impl RepoError {
    pub fn aborted(message: impl Into<String>) -> Self {
        Self::Aborted(message.into())
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "player not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted player data: {message}"),
            Self::Aborted(message) => write!(f, "unit of work aborted: {message}"),
            Self::Unavailable(message) => write!(f, "store unavailable: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_)
            | Self::InvalidData(_)
            | Self::Aborted(_)
            | Self::Unavailable(_) => None,
        }
    }
}

impl From<PlayerValidationError> for RepoError {
    fn from(value: PlayerValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Transactional handle handed to units of work.
///
/// Backends wrap one open transaction; nothing done through this handle is
/// visible to readers before the owning store commits it.
pub trait PlayerRepository {
    fn count_players(&self) -> RepoResult<u64>;
    fn fetch_players(&self, query: &PlayerQuery) -> RepoResult<Vec<Player>>;
    fn get_player(&self, id: PlayerId) -> RepoResult<Option<Player>>;
    /// Inserts `player` and writes the assigned id back into it.
    fn insert_player(&mut self, player: &mut Player) -> RepoResult<PlayerId>;
    fn update_player(&mut self, player: &Player) -> RepoResult<()>;
    /// Returns `false` when no player had this id.
    fn delete_player(&mut self, id: PlayerId) -> RepoResult<bool>;
    fn delete_all_players(&mut self) -> RepoResult<u64>;
}

/// SQLite-backed player repository.
///
/// Accepts a plain connection or a `rusqlite::Transaction` through deref.
pub struct SqlitePlayerRepository<'conn> {
    conn: &'conn Connection,
    changed_rows: u64,
}

impl<'conn> SqlitePlayerRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            changed_rows: 0,
        }
    }

    /// Rows inserted, updated or deleted through this handle so far.
    pub fn changed_rows(&self) -> u64 {
        self.changed_rows
    }
}

impl PlayerRepository for SqlitePlayerRepository<'_> {
    fn count_players(&self) -> RepoResult<u64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM player;", [], |row| row.get::<_, i64>(0))?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative player count `{count}`")))
    }

    fn fetch_players(&self, query: &PlayerQuery) -> RepoResult<Vec<Player>> {
        let (tail, bind_values) = query.sql_tail();
        let mut stmt = self.conn.prepare(&format!("{PLAYER_SELECT_SQL}{tail};"))?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut players = Vec::new();

        while let Some(row) = rows.next()? {
            players.push(parse_player_row(row)?);
        }

        Ok(players)
    }

    fn get_player(&self, id: PlayerId) -> RepoResult<Option<Player>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PLAYER_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_player_row(row)?));
        }

        Ok(None)
    }

    fn insert_player(&mut self, player: &mut Player) -> RepoResult<PlayerId> {
        player.validate()?;

        self.conn.execute(
            "INSERT INTO player (id, name, score) VALUES (?1, ?2, ?3);",
            params![player.id, player.name.as_str(), player.score],
        )?;

        let id = self.conn.last_insert_rowid();
        player.id = Some(id);
        self.changed_rows += 1;
        Ok(id)
    }

    fn update_player(&mut self, player: &Player) -> RepoResult<()> {
        player.validate()?;
        let id = player.require_id()?;

        let changed = self.conn.execute(
            "UPDATE player SET name = ?1, score = ?2 WHERE id = ?3;",
            params![player.name.as_str(), player.score, id],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        self.changed_rows += changed as u64;
        Ok(())
    }

    fn delete_player(&mut self, id: PlayerId) -> RepoResult<bool> {
        let changed = self.conn.execute("DELETE FROM player WHERE id = ?1;", [id])?;
        self.changed_rows += changed as u64;
        Ok(changed > 0)
    }

    fn delete_all_players(&mut self) -> RepoResult<u64> {
        let changed = self.conn.execute("DELETE FROM player;", [])? as u64;
        self.changed_rows += changed;
        Ok(changed)
    }
}

fn parse_player_row(row: &Row<'_>) -> RepoResult<Player> {
    let player = Player {
        id: Some(row.get("id")?),
        name: row.get("name")?,
        score: row.get("score")?,
    };
    player.validate().map_err(|err| {
        RepoError::InvalidData(format!("player {:?} failed validation: {err}", player.id))
    })?;
    Ok(player)
}
