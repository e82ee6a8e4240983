use scoreboard_core::{
    MemoryStore, Player, PlayerOrdering, PlayerQuery, PlayerRepository, PlayerStore, QueryObserver,
    RepoError, Snapshot, SqliteStore, WriteCoordinator,
};
use std::sync::{Arc, Barrier};
use std::time::Duration;

fn stores() -> Vec<Arc<dyn PlayerStore>> {
    vec![
        Arc::new(SqliteStore::open_in_memory().unwrap()),
        Arc::new(MemoryStore::new()),
    ]
}

fn insert(name: &'static str, score: i64) -> impl Fn(&mut dyn PlayerRepository) -> Result<(), RepoError> + Send + Sync {
    move |repo: &mut dyn PlayerRepository| {
        repo.insert_player(&mut Player::new(name, score))?;
        Ok(())
    }
}

fn names(snapshot: &Snapshot) -> Vec<&str> {
    snapshot.players.iter().map(|player| player.name.as_str()).collect()
}

#[test]
fn first_snapshot_is_delivered_immediately() {
    for store in stores() {
        let observer = QueryObserver::new(Arc::clone(&store));
        let mut stream = observer.observe(PlayerQuery::all());

        let first = stream.try_next().unwrap().unwrap();
        assert!(first.is_empty());
        assert!(stream.try_next().is_none());
    }
}

#[test]
fn two_observations_without_writes_start_equal() {
    for store in stores() {
        let coordinator = WriteCoordinator::new(Arc::clone(&store)).unwrap();
        coordinator.submit(insert("Arthur", 100)).wait().unwrap();
        let observer = QueryObserver::new(Arc::clone(&store));

        let mut first = observer.observe(PlayerQuery::all());
        let mut second = observer.observe(PlayerQuery::all());

        assert_eq!(
            first.try_next().unwrap().unwrap(),
            second.try_next().unwrap().unwrap()
        );
    }
}

#[test]
fn inserted_player_appears_exactly_once() {
    for store in stores() {
        let coordinator = WriteCoordinator::new(Arc::clone(&store)).unwrap();
        coordinator.submit(insert("Arthur", 100)).wait().unwrap();

        let mut stream = QueryObserver::new(Arc::clone(&store)).observe(PlayerQuery::all());
        let snapshot = stream.try_next().unwrap().unwrap();
        assert_eq!(names(&snapshot), vec!["Arthur"]);
    }
}

#[test]
fn each_commit_delivers_a_new_snapshot() {
    for store in stores() {
        let coordinator = WriteCoordinator::new(Arc::clone(&store)).unwrap();
        let mut stream = QueryObserver::new(Arc::clone(&store))
            .observe(PlayerQuery::all().ordered_by(PlayerOrdering::ByScore));
        assert!(stream.try_next().unwrap().unwrap().is_empty());

        coordinator.submit(insert("Arthur", 100)).wait().unwrap();
        coordinator.submit(insert("Anita", 900)).wait().unwrap();

        let deliveries: Vec<Snapshot> = stream
            .drain()
            .into_iter()
            .map(|item| item.unwrap())
            .collect();
        assert_eq!(deliveries.len(), 2);
        assert_eq!(names(&deliveries[0]), vec!["Arthur"]);
        assert_eq!(names(&deliveries[1]), vec!["Anita", "Arthur"]);
        assert!(deliveries[0].revision < deliveries[1].revision);
    }
}

#[test]
fn unchanged_result_is_not_redelivered() {
    for store in stores() {
        let coordinator = WriteCoordinator::new(Arc::clone(&store)).unwrap();
        coordinator.submit(insert("Arthur", 100)).wait().unwrap();
        let mut stream = QueryObserver::new(Arc::clone(&store)).observe(PlayerQuery::all());
        stream.try_next().unwrap().unwrap();

        // Rewrites the same score: a real commit with an identical result.
        coordinator
            .submit(|repo: &mut dyn PlayerRepository| {
                for player in repo.fetch_players(&PlayerQuery::all())? {
                    repo.update_player(&player)?;
                }
                Ok(())
            })
            .wait()
            .unwrap();

        assert!(stream.try_next().is_none());
    }
}

#[test]
fn writes_outside_the_filter_are_not_redelivered() {
    let store: Arc<dyn PlayerStore> = Arc::new(MemoryStore::new());
    let coordinator = WriteCoordinator::new(Arc::clone(&store)).unwrap();
    let mut stream =
        QueryObserver::new(Arc::clone(&store)).observe(PlayerQuery::all().with_min_score(500));
    stream.try_next().unwrap().unwrap();

    coordinator.submit(insert("Low", 100)).wait().unwrap();
    assert!(stream.try_next().is_none());

    coordinator.submit(insert("High", 900)).wait().unwrap();
    let snapshot = stream.try_next().unwrap().unwrap();
    assert_eq!(names(&snapshot), vec!["High"]);
}

#[test]
fn writes_from_other_writers_are_observed() {
    let store: Arc<dyn PlayerStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let mut stream = QueryObserver::new(Arc::clone(&store)).observe(PlayerQuery::all());
    stream.try_next().unwrap().unwrap();

    store
        .write(&mut |repo: &mut dyn PlayerRepository| {
            repo.insert_player(&mut Player::new("Direct", 10))?;
            Ok(())
        })
        .unwrap();

    let snapshot = stream.try_next().unwrap().unwrap();
    assert_eq!(names(&snapshot), vec!["Direct"]);
}

#[test]
fn rolled_back_write_does_not_notify() {
    for store in stores() {
        let coordinator = WriteCoordinator::new(Arc::clone(&store)).unwrap();
        let mut stream = QueryObserver::new(Arc::clone(&store)).observe(PlayerQuery::all());
        stream.try_next().unwrap().unwrap();

        coordinator
            .submit(|repo: &mut dyn PlayerRepository| {
                repo.insert_player(&mut Player::new("Ghost", 10))?;
                Err(RepoError::aborted("rollback"))
            })
            .wait()
            .unwrap_err();

        assert!(stream.try_next().is_none());
    }
}

#[test]
fn dispose_stops_delivery_and_is_idempotent() {
    for store in stores() {
        let coordinator = WriteCoordinator::new(Arc::clone(&store)).unwrap();
        let mut stream = QueryObserver::new(Arc::clone(&store)).observe(PlayerQuery::all());

        coordinator.submit(insert("Arthur", 10)).wait().unwrap();
        stream.dispose();
        stream.dispose();
        coordinator.submit(insert("Anita", 20)).wait().unwrap();

        assert!(stream.is_disposed());
        // Even the snapshots queued before disposal are withheld.
        assert!(stream.try_next().is_none());
        assert_eq!(store.notifier().listener_count(), 0);
    }
}

#[test]
fn dropping_stream_releases_its_listener() {
    let store: Arc<dyn PlayerStore> = Arc::new(MemoryStore::new());
    let observer = QueryObserver::new(Arc::clone(&store));
    let stream = observer.observe(PlayerQuery::all());
    assert_eq!(store.notifier().listener_count(), 1);

    drop(stream);
    assert_eq!(store.notifier().listener_count(), 0);
}

#[test]
fn dispose_during_inflight_notification_never_delivers_afterwards() {
    for store in stores() {
        let coordinator = WriteCoordinator::new(Arc::clone(&store)).unwrap();
        let observer = QueryObserver::new(Arc::clone(&store));

        // Listeners run in subscription order: the gate either holds the
        // notification before the observation re-reads, or right after it
        // queued the new snapshot.
        for gate_first in [true, false] {
            let notified = Arc::new(Barrier::new(2));
            let disposed = Arc::new(Barrier::new(2));
            let subscribe_gate = || {
                let (notified, disposed) = (Arc::clone(&notified), Arc::clone(&disposed));
                store.notifier().subscribe(move |_| {
                    notified.wait();
                    disposed.wait();
                })
            };

            let early_gate = gate_first.then(&subscribe_gate);
            let mut stream = observer.observe(PlayerQuery::all());
            stream.try_next().unwrap().unwrap();
            let gate = early_gate.unwrap_or_else(&subscribe_gate);
            let disposer = stream.disposer();

            let completion = coordinator.submit(insert("Racer", 10));
            notified.wait();
            disposer.dispose();
            disposed.wait();
            completion.wait().unwrap();
            store.notifier().unsubscribe(gate);

            assert!(stream.try_next().is_none());
            assert!(stream.blocking_next().is_none());
        }
        assert_eq!(store.notifier().listener_count(), 0);
    }
}

#[test]
fn direct_store_writes_bump_revision_and_notify_on_every_backend() {
    for store in stores() {
        let mut stream = QueryObserver::new(Arc::clone(&store)).observe(PlayerQuery::all());
        stream.try_next().unwrap().unwrap();

        let outcome = store
            .write(&mut |repo: &mut dyn PlayerRepository| {
                repo.insert_player(&mut Player::new("Outsider", 10))?;
                Ok(())
            })
            .unwrap();

        assert_eq!(outcome.changed_rows, 1);
        assert_eq!(outcome.revision, 1);
        let delivered = stream.try_next().unwrap().unwrap();
        assert_eq!(names(&delivered), ["Outsider"]);
        assert_eq!(delivered.revision, store.revision());
    }
}

#[test]
fn failed_read_terminates_stream_once() {
    let memory = Arc::new(MemoryStore::new());
    let store: Arc<dyn PlayerStore> = memory.clone();
    let coordinator = WriteCoordinator::new(Arc::clone(&store)).unwrap();
    let mut stream = QueryObserver::new(Arc::clone(&store)).observe(PlayerQuery::all());
    stream.try_next().unwrap().unwrap();

    memory.fail_reads("disk unplugged");
    coordinator.submit(insert("Arthur", 10)).wait().unwrap();

    let failure = stream.try_next().unwrap().unwrap_err();
    assert!(matches!(failure.cause, RepoError::Unavailable(_)));
    assert!(stream.try_next().is_none());

    memory.restore_reads();
    coordinator.submit(insert("Anita", 10)).wait().unwrap();
    assert!(stream.blocking_next().is_none());
    assert_eq!(store.notifier().listener_count(), 0);
}

#[test]
fn failed_initial_read_yields_failure_then_ends() {
    let memory = Arc::new(MemoryStore::new());
    memory.fail_reads("not ready");
    let store: Arc<dyn PlayerStore> = memory;

    let mut stream = QueryObserver::new(Arc::clone(&store)).observe(PlayerQuery::all());
    assert!(stream.try_next().unwrap().is_err());
    assert!(stream.blocking_next().is_none());
    assert_eq!(store.notifier().listener_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn snapshots_can_be_awaited() {
    let store: Arc<dyn PlayerStore> = Arc::new(MemoryStore::new());
    let coordinator = WriteCoordinator::new(Arc::clone(&store)).unwrap();
    let mut stream = QueryObserver::new(Arc::clone(&store)).observe(PlayerQuery::all());

    assert!(stream.next().await.unwrap().unwrap().is_empty());
    coordinator.submit(insert("Arthur", 10)).await.unwrap();

    let snapshot = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(names(&snapshot), vec!["Arthur"]);
}

#[test]
fn snapshot_revisions_are_monotonic_under_many_writers() {
    let store: Arc<dyn PlayerStore> = Arc::new(MemoryStore::new());
    let mut stream = QueryObserver::new(Arc::clone(&store)).observe(PlayerQuery::all());

    let writers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..25 {
                    store
                        .write(&mut |repo: &mut dyn PlayerRepository| {
                            repo.insert_player(&mut Player::new("Writer", 10))?;
                            Ok(())
                        })
                        .unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let revisions: Vec<u64> = stream
        .drain()
        .into_iter()
        .map(|item| item.unwrap().revision)
        .collect();
    assert!(revisions.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(revisions.last().copied(), Some(100));
}
