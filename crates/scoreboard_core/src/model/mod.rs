//! Domain model for scoreboard players.
//!
//! # Responsibility
//! - Define the canonical player record shared by every store backend.
//! - Provide the random generators used by seeding and refresh operations.
//!
//! # Invariants
//! - A persisted player is identified by a stable integer `PlayerId`.
//! - Deletion is a hard delete; ids are never reused by SQLite `AUTOINCREMENT`.

pub mod player;
