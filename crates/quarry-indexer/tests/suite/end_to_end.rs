//! Whole-system scenarios driving the queue, the worker pool, and the
//! change feed together.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::support::{symbol_id, Fixture};

const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

#[test]
fn editing_a_header_rewrites_only_its_shard() {
    let fixture = Fixture::new();
    let command = fixture.add_unit(
        "/project/a.cpp",
        "#include \"a.h\"\nint main() {}",
        &[("/project/a.h", "void helper();")],
    );
    let indexer = fixture.indexer();
    indexer.index(command.clone()).unwrap();

    let snapshot = indexer.composite().rebuild();
    assert!(snapshot.lookup(symbol_id(Path::new("/project/a.cpp"))).is_some());
    assert!(snapshot.lookup(symbol_id(Path::new("/project/a.h"))).is_some());

    fixture
        .fs
        .write(PathBuf::from("/project/a.h"), b"void helper(int);".to_vec());
    fixture.analyzer.clear_logs();
    indexer.index(command).unwrap();

    // The main file's digest is unchanged, so the analyzer skipped
    // re-collecting it and its shard was not rewritten.
    assert!(fixture
        .analyzer
        .skipped()
        .contains(&PathBuf::from("/project/a.cpp")));
    assert_eq!(fixture.storage.writes_for(Path::new("/project/a.cpp")), 1);
    assert_eq!(fixture.storage.writes_for(Path::new("/project/a.h")), 2);

    // The untouched main-file slabs still serve queries: its reference to
    // the header symbol survives the header's shard replacement.
    let snapshot = indexer.composite().rebuild();
    let header_id = symbol_id(Path::new("/project/a.h"));
    assert!(snapshot.lookup(header_id).is_some());
    assert!(
        !snapshot.references(header_id).is_empty(),
        "reference from a.cpp must survive"
    );
}

#[test]
fn changed_files_batch_drives_indexing_through_the_queue() {
    let fixture = Fixture::new();
    fixture.add_unit("/project/a.cpp", "a", &[("/project/a.h", "ah")]);
    fixture.add_unit("/project/b.cpp", "b", &[]);

    let indexer = fixture.indexer();
    indexer.enqueue(vec![
        PathBuf::from("/project/a.cpp"),
        PathBuf::from("/project/b.cpp"),
    ]);
    assert!(indexer.block_until_idle(IDLE_TIMEOUT));

    // Workers went idle, so the rebuild throttle has published.
    let snapshot = indexer.snapshot();
    assert!(snapshot.lookup(symbol_id(Path::new("/project/a.cpp"))).is_some());
    assert!(snapshot.lookup(symbol_id(Path::new("/project/a.h"))).is_some());
    assert!(snapshot.lookup(symbol_id(Path::new("/project/b.cpp"))).is_some());

    let stats = indexer.queue_stats();
    assert_eq!(stats.enqueued, 3, "one reconciliation task plus two TUs");
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.active, 0);
}

#[test]
fn analyzer_crash_isolates_to_its_tu() {
    let fixture = Fixture::new();
    fixture.add_unit("/project/a.cpp", "a", &[]);
    fixture.add_unit("/project/b.cpp", "b", &[]);
    fixture.add_unit("/project/c.cpp", "c", &[]);
    fixture.analyzer.fail_on(PathBuf::from("/project/b.cpp"));

    let indexer = fixture.indexer();
    indexer.enqueue(vec![
        PathBuf::from("/project/a.cpp"),
        PathBuf::from("/project/b.cpp"),
        PathBuf::from("/project/c.cpp"),
    ]);
    assert!(indexer.block_until_idle(IDLE_TIMEOUT));

    let snapshot = indexer.snapshot();
    assert!(snapshot.lookup(symbol_id(Path::new("/project/a.cpp"))).is_some());
    assert!(snapshot.lookup(symbol_id(Path::new("/project/c.cpp"))).is_some());
    assert!(
        snapshot.lookup(symbol_id(Path::new("/project/b.cpp"))).is_none(),
        "failed TU contributes nothing"
    );
    assert!(fixture
        .analyzer
        .analyzed()
        .contains(&PathBuf::from("/project/b.cpp")));
}

#[test]
fn compilation_database_changes_flow_through_the_watch_feed() {
    let fixture = Fixture::new();
    fixture.add_unit("/project/a.cpp", "a", &[]);
    let indexer = fixture.indexer();

    fixture
        .cdb
        .notify_changed(vec![PathBuf::from("/project/a.cpp")]);

    // The feed is consumed asynchronously; wait for the work to appear
    // before waiting for it to drain.
    let deadline = Instant::now() + IDLE_TIMEOUT;
    while fixture.analyzer.analyzed().is_empty() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(indexer.block_until_idle(IDLE_TIMEOUT));

    let snapshot = indexer.snapshot();
    assert!(snapshot.lookup(symbol_id(Path::new("/project/a.cpp"))).is_some());
}

#[test]
fn stats_are_observable_without_blocking_workers() {
    let fixture = Fixture::new();
    fixture.add_unit("/project/a.cpp", "a", &[]);
    let indexer = fixture.indexer();
    let mut stats_rx = indexer.subscribe_stats();

    indexer.enqueue(vec![PathBuf::from("/project/a.cpp")]);
    assert!(indexer.block_until_idle(IDLE_TIMEOUT));

    let mut saw_completion = false;
    while let Ok(stats) = stats_rx.try_recv() {
        if stats.completed > 0 {
            saw_completion = true;
        }
    }
    assert!(saw_completion, "progress events must reach subscribers");
}

#[test]
fn restart_restores_queries_before_any_reanalysis() {
    let fixture = Fixture::new();
    let command = fixture.add_unit("/project/a.cpp", "a", &[("/project/a.h", "ah")]);
    {
        let indexer = fixture.indexer();
        indexer.index(command).unwrap();
    }

    // New process, same storage: enqueue the project and make the analyzer
    // refuse to run. Queries must still see the persisted data.
    fixture
        .analyzer
        .fail_on(PathBuf::from("/project/a.cpp"));
    let indexer = fixture.indexer();
    indexer.enqueue(vec![PathBuf::from("/project/a.cpp")]);
    assert!(indexer.block_until_idle(IDLE_TIMEOUT));

    let snapshot = indexer.snapshot();
    assert!(snapshot.lookup(symbol_id(Path::new("/project/a.cpp"))).is_some());
    assert!(snapshot.lookup(symbol_id(Path::new("/project/a.h"))).is_some());
}
