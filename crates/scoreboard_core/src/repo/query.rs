//! Read-only query specification for players.

use crate::model::player::Player;
use rusqlite::types::Value;
use std::cmp::Ordering;

/// Name of the table every player query reads from.
pub const PLAYER_TABLE: &str = "player";

/// Result ordering for player queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PlayerOrdering {
    /// Insertion order.
    #[default]
    ById,
    /// Name ascending, then id.
    ByName,
    /// Score descending, then name, then id.
    ByScore,
}

impl PlayerOrdering {
    fn sql(self) -> &'static str {
        match self {
            Self::ById => "id ASC",
            Self::ByName => "name ASC, id ASC",
            Self::ByScore => "score DESC, name ASC, id ASC",
        }
    }

    /// Compares two players the way the SQL `ORDER BY` clause does.
    pub fn compare(self, left: &Player, right: &Player) -> Ordering {
        match self {
            Self::ById => left.id.cmp(&right.id),
            Self::ByName => left
                .name
                .cmp(&right.name)
                .then_with(|| left.id.cmp(&right.id)),
            Self::ByScore => right
                .score
                .cmp(&left.score)
                .then_with(|| left.name.cmp(&right.name))
                .then_with(|| left.id.cmp(&right.id)),
        }
    }
}

/// Immutable description of which players to read and in which order.
///
/// Cheap to clone and safe to reuse across any number of observations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PlayerQuery {
    pub ordering: PlayerOrdering,
    /// Keeps players whose score is at least this value.
    pub min_score: Option<i64>,
    pub limit: Option<u32>,
}

impl PlayerQuery {
    /// All players in insertion order.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn ordered_by(mut self, ordering: PlayerOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn with_min_score(mut self, min_score: i64) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Table whose commits can change this query's result.
    pub fn table(&self) -> &'static str {
        PLAYER_TABLE
    }

    /// Returns whether `player` passes the query filter.
    pub fn matches(&self, player: &Player) -> bool {
        self.min_score.map_or(true, |min| player.score >= min)
    }

    /// Applies filter, ordering and limit to an in-memory row set.
    pub fn apply<'a>(&self, players: impl IntoIterator<Item = &'a Player>) -> Vec<Player> {
        let mut selected: Vec<Player> = players
            .into_iter()
            .filter(|player| self.matches(player))
            .cloned()
            .collect();
        selected.sort_by(|left, right| self.ordering.compare(left, right));
        if let Some(limit) = self.limit {
            selected.truncate(limit as usize);
        }
        selected
    }

    /// Builds the `WHERE`/`ORDER BY`/`LIMIT` tail and its bind values.
    pub(crate) fn sql_tail(&self) -> (String, Vec<Value>) {
        let mut sql = String::from(" WHERE 1 = 1");
        let mut bind_values = Vec::new();

        if let Some(min_score) = self.min_score {
            sql.push_str(" AND score >= ?");
            bind_values.push(Value::Integer(min_score));
        }

        sql.push_str(" ORDER BY ");
        sql.push_str(self.ordering.sql());

        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
        }

        (sql, bind_values)
    }
}
