use scoreboard_core::{
    open_store, CoreConfig, MemoryStore, PlayerQuery, PlayerStore, Players, SqliteStore,
    StoreBackend, PLAYER_SCORE_RANGE, SEED_PLAYER_COUNT,
};
use std::sync::Arc;

fn assert_valid_players(store: &dyn PlayerStore) {
    for player in store.read(&PlayerQuery::all()).unwrap().players {
        assert!(player.id.is_some());
        assert!(!player.name.trim().is_empty());
        assert!(PLAYER_SCORE_RANGE.contains(&player.score));
        assert_eq!(player.score % 10, 0);
    }
}

#[test]
fn refresh_on_empty_store_seeds_eight_players() {
    let store: Arc<dyn PlayerStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let players = Players::new(Arc::clone(&store)).unwrap();

    players.refresh().wait().unwrap();

    assert_eq!(store.read(&PlayerQuery::all()).unwrap().len(), SEED_PLAYER_COUNT);
    assert_valid_players(store.as_ref());
}

#[test]
fn delete_all_then_observe_starts_empty() {
    let store: Arc<dyn PlayerStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let players = Players::new(Arc::clone(&store)).unwrap();
    players.refresh().wait().unwrap();
    assert_eq!(store.read(&PlayerQuery::all()).unwrap().len(), 8);

    players.delete_all().wait().unwrap();

    let mut stream = players.observe_players(PlayerQuery::all());
    assert!(stream.try_next().unwrap().unwrap().is_empty());
}

#[test]
fn stress_test_keeps_every_player_valid() {
    for store in [
        Arc::new(SqliteStore::open_in_memory().unwrap()) as Arc<dyn PlayerStore>,
        Arc::new(MemoryStore::new()) as Arc<dyn PlayerStore>,
    ] {
        let players = Players::new(Arc::clone(&store)).unwrap();
        players.stress_test().wait().unwrap();

        // Seeded on the first run, then at most one insert per run.
        let count = store.read(&PlayerQuery::all()).unwrap().len();
        assert!(count <= SEED_PLAYER_COUNT + 49, "count {count}");
        assert_valid_players(store.as_ref());
    }
}

#[test]
fn observed_list_follows_refreshes() {
    let store: Arc<dyn PlayerStore> = Arc::new(MemoryStore::new());
    let players = Players::new(Arc::clone(&store)).unwrap();
    let mut stream = players.observe_players(PlayerQuery::all());
    assert!(stream.try_next().unwrap().unwrap().is_empty());

    for _ in 0..10 {
        players.refresh().wait().unwrap();
    }
    players.delete_all().wait().unwrap();

    let deliveries = stream.drain();
    assert!(!deliveries.is_empty());
    let last = deliveries.into_iter().last().unwrap().unwrap();
    assert!(last.is_empty());
    assert_eq!(last, store.read(&PlayerQuery::all()).unwrap());
}

#[test]
fn stress_with_explicit_run_count_uses_configured_seed_size() {
    let config = CoreConfig {
        backend: StoreBackend::Memory,
        seed_player_count: 3,
        ..CoreConfig::default()
    };
    let store = open_store(&config).unwrap();
    let players = Players::with_config(Arc::clone(&store), &config).unwrap();

    players.stress_test_runs(1).wait().unwrap();
    assert_eq!(store.read(&PlayerQuery::all()).unwrap().len(), 3);

    // Later runs only nudge the table by one player at most.
    players.stress_test_runs(4).wait().unwrap();
    let count = store.read(&PlayerQuery::all()).unwrap().len();
    assert!(count <= 3 + 4, "count {count}");
    assert_valid_players(store.as_ref());

    players.delete_all().wait().unwrap();
    players.stress_test_runs(0).wait().unwrap();
    assert!(store.read(&PlayerQuery::all()).unwrap().is_empty());
}

#[test]
fn config_selects_backend_and_sizes() {
    let dir = tempfile::tempdir().unwrap();
    let config = CoreConfig {
        backend: StoreBackend::Sqlite,
        database_path: Some(dir.path().join("players.sqlite3")),
        seed_player_count: 3,
        stress_repetitions: 2,
        ..CoreConfig::default()
    };
    config.validate().unwrap();

    let store = open_store(&config).unwrap();
    assert_eq!(store.backend_name(), "sqlite");
    let players = Players::with_config(Arc::clone(&store), &config).unwrap();
    players.refresh().wait().unwrap();
    assert_eq!(store.read(&PlayerQuery::all()).unwrap().len(), 3);
    drop(players);
    drop(store);

    // Data survives reopening the file.
    let reopened = open_store(&config).unwrap();
    assert_eq!(reopened.read(&PlayerQuery::all()).unwrap().len(), 3);

    let memory = open_store(&CoreConfig {
        backend: StoreBackend::Memory,
        ..CoreConfig::default()
    })
    .unwrap();
    assert_eq!(memory.backend_name(), "memory");
}
