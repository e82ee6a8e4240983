//! Core of the scoreboard player store.
//!
//! Writes go through a single-writer [`WriteCoordinator`]; reads are pushed
//! to callers as live [`SnapshotStream`]s re-evaluated after every commit.
//! Both work over any [`PlayerStore`] backend.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use config::{ConfigError, CoreConfig, StoreBackend, SEED_PLAYER_COUNT, STRESS_REPETITIONS};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::player::{Player, PlayerId, PlayerValidationError, PLAYER_SCORE_RANGE};
pub use repo::{
    PlayerOrdering, PlayerQuery, PlayerRepository, RepoError, RepoResult, SqlitePlayerRepository,
};
pub use service::players::{delete_all_players, refresh_players, refresh_players_with, Players};
pub use service::query_observer::{
    ObservationFailure, QueryObserver, SnapshotItem, SnapshotStream, StreamDisposer,
};
pub use service::write_coordinator::{Completion, UnitOfWork, WriteCoordinator, WriteFailure};
pub use store::{
    open_store, ChangeEvent, MemoryStore, PlayerStore, Snapshot, SqliteStore, WriteOutcome,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
