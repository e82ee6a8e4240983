//! Player use-case façade.
//!
//! # Responsibility
//! - Expose the "delete all", "refresh" and "stress test" write actions.
//! - Expose live player lists for display code.
//!
//! # Invariants
//! - Every write goes through the one `WriteCoordinator` owned here.
//! - A refresh is one transaction, including its per-player score updates.

use crate::config::{CoreConfig, SEED_PLAYER_COUNT, STRESS_REPETITIONS};
use crate::model::player::Player;
use crate::repo::{PlayerQuery, PlayerRepository, RepoResult};
use crate::service::query_observer::{QueryObserver, SnapshotStream};
use crate::service::write_coordinator::{Completion, WriteCoordinator};
use crate::store::PlayerStore;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;

/// Removes every player.
pub fn delete_all_players(repo: &mut dyn PlayerRepository) -> RepoResult<()> {
    repo.delete_all_players()?;
    Ok(())
}

/// Seeds an empty table, otherwise shuffles it a little.
///
/// Uses the thread-local RNG and the default seed size.
pub fn refresh_players(repo: &mut dyn PlayerRepository) -> RepoResult<()> {
    refresh_players_with(repo, &mut rand::thread_rng(), SEED_PLAYER_COUNT)
}

/// Refresh rule with an explicit RNG and seed size.
///
/// - Empty table: insert `seed_count` random players.
/// - Otherwise three independent coin flips: insert one random player;
///   delete one player picked uniformly (no-op on an empty table); give
///   each remaining player a new random score with probability ½.
pub fn refresh_players_with<R: Rng>(
    repo: &mut dyn PlayerRepository,
    rng: &mut R,
    seed_count: usize,
) -> RepoResult<()> {
    if repo.count_players()? == 0 {
        for _ in 0..seed_count {
            let mut player = Player::random(rng);
            repo.insert_player(&mut player)?;
        }
        return Ok(());
    }

    if rng.gen_bool(0.5) {
        let mut player = Player::random(rng);
        repo.insert_player(&mut player)?;
    }

    if rng.gen_bool(0.5) {
        let players = repo.fetch_players(&PlayerQuery::all())?;
        if let Some(id) = players.choose(rng).and_then(|player| player.id) {
            repo.delete_player(id)?;
        }
    }

    for mut player in repo.fetch_players(&PlayerQuery::all())? {
        if !rng.gen_bool(0.5) {
            continue;
        }
        let score = Player::random_score(rng);
        // Only write rows whose score actually changes.
        if score != player.score {
            player.score = score;
            repo.update_player(&player)?;
        }
    }

    Ok(())
}

/// High-level operations on the players store.
pub struct Players {
    coordinator: WriteCoordinator,
    observer: QueryObserver,
    seed_count: usize,
    stress_repetitions: usize,
}

impl Players {
    /// Builds the façade with default seed and stress sizes.
    pub fn new(store: Arc<dyn PlayerStore>) -> std::io::Result<Self> {
        Self::with_sizes(store, SEED_PLAYER_COUNT, STRESS_REPETITIONS)
    }

    /// Builds the façade with the sizes from `config`.
    pub fn with_config(store: Arc<dyn PlayerStore>, config: &CoreConfig) -> std::io::Result<Self> {
        Self::with_sizes(store, config.seed_player_count, config.stress_repetitions)
    }

    fn with_sizes(
        store: Arc<dyn PlayerStore>,
        seed_count: usize,
        stress_repetitions: usize,
    ) -> std::io::Result<Self> {
        Ok(Self {
            observer: QueryObserver::new(Arc::clone(&store)),
            coordinator: WriteCoordinator::new(store)?,
            seed_count,
            stress_repetitions,
        })
    }

    pub fn delete_all(&self) -> Completion {
        self.coordinator.submit(delete_all_players)
    }

    pub fn refresh(&self) -> Completion {
        let seed_count = self.seed_count;
        self.coordinator.submit(move |repo: &mut dyn PlayerRepository| {
            refresh_players_with(repo, &mut rand::thread_rng(), seed_count)
        })
    }

    /// Runs the refresh the configured number of times, one transaction per run.
    pub fn stress_test(&self) -> Completion {
        self.stress_test_runs(self.stress_repetitions)
    }

    /// Runs the refresh `runs` times with the configured seed size.
    pub fn stress_test_runs(&self, runs: usize) -> Completion {
        let seed_count = self.seed_count;
        self.coordinator
            .submit_batch(runs, move |repo: &mut dyn PlayerRepository| {
                refresh_players_with(repo, &mut rand::thread_rng(), seed_count)
            })
    }

    /// Live list of the players selected by `query`.
    pub fn observe_players(&self, query: PlayerQuery) -> SnapshotStream {
        self.observer.observe(query)
    }
}
