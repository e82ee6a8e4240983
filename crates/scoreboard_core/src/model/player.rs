//! Player domain model.
//!
//! # Responsibility
//! - Define the record stored in the `player` table.
//! - Validate field ranges before any backend persists a player.
//!
//! # Invariants
//! - `id` is `None` until the first insert and never changes afterwards.
//! - `name` is never blank.
//! - `score` stays within `PLAYER_SCORE_RANGE`.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::ops::RangeInclusive;

/// Row identifier assigned by the store on first insert.
pub type PlayerId = i64;

/// Inclusive range of valid player scores.
pub const PLAYER_SCORE_RANGE: RangeInclusive<i64> = 0..=1000;

const PLAYER_NAMES: &[&str] = &[
    "Arthur", "Anita", "Barbara", "Bernard", "Clément", "Chiara", "David", "Dean", "Éric",
    "Elena", "Fatima", "Frederik", "Gilbert", "Georgette", "Henriette", "Hassan", "Ignacio",
    "Irene", "Julie", "Jack", "Karl", "Kristel", "Louis", "Liz", "Masashi", "Mary", "Noam",
    "Nicole", "Ophelie", "Oleg", "Pascal", "Patricia", "Quentin", "Quinn", "Raoul", "Rachel",
    "Stephan", "Susie", "Tristan", "Tatiana", "Ursule", "Urbain", "Victor", "Violette",
    "Wilhelm", "Wilhelmina", "Xavier", "Xiu", "Yves", "Yasmine", "Zoé", "Zaid",
];

/// Validation failures for player fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerValidationError {
    BlankName,
    ScoreOutOfRange(i64),
    /// Updates and deletes need a persisted player.
    MissingId,
}

impl Display for PlayerValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "player name must not be blank"),
            Self::ScoreOutOfRange(score) => write!(
                f,
                "player score {score} is outside {}..={}",
                PLAYER_SCORE_RANGE.start(),
                PLAYER_SCORE_RANGE.end()
            ),
            Self::MissingId => write!(f, "player has not been persisted yet"),
        }
    }
}

impl Error for PlayerValidationError {}

/// A scoreboard entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Player {
    /// `None` before the first insert.
    pub id: Option<PlayerId>,
    pub name: String,
    pub score: i64,
}

impl Player {
    /// Creates an unsaved player.
    pub fn new(name: impl Into<String>, score: i64) -> Self {
        Self {
            id: None,
            name: name.into(),
            score,
        }
    }

    /// Creates an unsaved player with a random name and score.
    pub fn random(rng: &mut impl Rng) -> Self {
        Self::new(Self::random_name(rng), Self::random_score(rng))
    }

    /// Picks a name from the built-in name list.
    pub fn random_name(rng: &mut impl Rng) -> String {
        PLAYER_NAMES
            .choose(rng)
            .copied()
            .unwrap_or("Anonymous")
            .to_string()
    }

    /// Returns a multiple of ten within `PLAYER_SCORE_RANGE`.
    pub fn random_score(rng: &mut impl Rng) -> i64 {
        10 * rng.gen_range(0..=100)
    }

    /// Checks field invariants shared by every backend.
    pub fn validate(&self) -> Result<(), PlayerValidationError> {
        if self.name.trim().is_empty() {
            return Err(PlayerValidationError::BlankName);
        }
        if !PLAYER_SCORE_RANGE.contains(&self.score) {
            return Err(PlayerValidationError::ScoreOutOfRange(self.score));
        }
        Ok(())
    }

    /// Returns the persisted id or `MissingId`.
    pub fn require_id(&self) -> Result<PlayerId, PlayerValidationError> {
        self.id.ok_or(PlayerValidationError::MissingId)
    }
}
