//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the transactional handle units of work operate on.
//! - Isolate SQL details from coordination and observation code.
//!
//! # Invariants
//! - Repository writes must enforce `Player::validate()` before persistence.
//! - Every backend applies `PlayerQuery` with identical filter and order rules.

pub mod memory_repo;
pub mod player_repo;
pub mod query;

pub use memory_repo::{MemoryPlayerRepository, MemoryTable};
pub use player_repo::{PlayerRepository, RepoError, RepoResult, SqlitePlayerRepository};
pub use query::{PlayerOrdering, PlayerQuery, PLAYER_TABLE};
