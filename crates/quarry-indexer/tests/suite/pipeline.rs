//! Per-TU pipeline behavior: digest-driven idempotence, freshness, error
//! recovery, and failure isolation.

use std::path::{Path, PathBuf};

use quarry_core::ContentDigest;
use quarry_indexer::IndexerError;
use quarry_store::ShardStorage;

use super::support::{symbol_id, Fixture};

#[test]
fn reindexing_unchanged_content_is_a_no_op() {
    let fixture = Fixture::new();
    let command = fixture.add_unit("/project/a.cpp", "int main() {}", &[("/project/a.h", "x")]);
    let indexer = fixture.indexer();

    indexer.index(command.clone()).unwrap();
    let writes_after_first = fixture.storage.write_log().len();
    assert_eq!(writes_after_first, 2, "main file and header each get a shard");

    indexer.index(command).unwrap();
    assert_eq!(
        fixture.storage.write_log().len(),
        writes_after_first,
        "unchanged TU must not rewrite any shard"
    );
    // The analyzer ran, but the filter told it to collect nothing.
    assert_eq!(fixture.analyzer.analyzed().len(), 2);
    assert!(fixture
        .analyzer
        .skipped()
        .contains(&PathBuf::from("/project/a.cpp")));
}

#[test]
fn changed_content_replaces_the_shard_digest() {
    let fixture = Fixture::new();
    let command = fixture.add_unit("/project/a.cpp", "int main() {}", &[]);
    let indexer = fixture.indexer();
    indexer.index(command.clone()).unwrap();

    fixture
        .fs
        .write(PathBuf::from("/project/a.cpp"), b"int main() { return 1; }".to_vec());
    indexer.index(command).unwrap();

    let shard = fixture
        .storage
        .load_shard(Path::new("/project/a.cpp"))
        .unwrap()
        .expect("shard exists");
    assert_eq!(
        shard.digest,
        ContentDigest::from_bytes(b"int main() { return 1; }")
    );
    assert_eq!(fixture.storage.writes_for(Path::new("/project/a.cpp")), 2);
}

#[test]
fn clean_rerun_replaces_a_provisional_shard() {
    let fixture = Fixture::new();
    let command = fixture.add_unit("/project/a.cpp", "int main() {}", &[]);
    let main = Path::new("/project/a.cpp");
    let indexer = fixture.indexer();

    fixture.analyzer.set_broken(main, true);
    indexer.index(command.clone()).unwrap();
    let shard = fixture.storage.load_shard(main).unwrap().unwrap();
    assert!(shard.had_errors, "broken TU stores a provisional shard");

    // Same digest, but the TU now compiles cleanly: the shard is replaced.
    fixture.analyzer.set_broken(main, false);
    indexer.index(command.clone()).unwrap();
    let shard = fixture.storage.load_shard(main).unwrap().unwrap();
    assert!(!shard.had_errors);
    assert_eq!(fixture.storage.writes_for(main), 2);

    // And once clean, an identical run goes back to being a no-op.
    indexer.index(command).unwrap();
    assert_eq!(fixture.storage.writes_for(main), 2);
}

#[test]
fn provisional_results_are_still_merged() {
    let fixture = Fixture::new();
    let command = fixture.add_unit("/project/a.cpp", "borked", &[]);
    fixture.analyzer.set_broken(Path::new("/project/a.cpp"), true);

    let indexer = fixture.indexer();
    indexer.index(command).unwrap();

    let snapshot = indexer.composite().rebuild();
    assert!(
        snapshot.lookup(symbol_id(Path::new("/project/a.cpp"))).is_some(),
        "a TU with compile errors still contributes provisional symbols"
    );
}

#[test]
fn unreadable_main_file_fails_only_that_task() {
    let fixture = Fixture::new();
    let missing = fixture.add_unit("/project/gone.cpp", "", &[]);
    fixture.fs.remove(Path::new("/project/gone.cpp"));
    let fine = fixture.add_unit("/project/fine.cpp", "int x;", &[]);

    let indexer = fixture.indexer();
    let err = indexer.index(missing).unwrap_err();
    assert!(matches!(err, IndexerError::Unreadable { .. }));

    indexer.index(fine).unwrap();
    assert_eq!(fixture.storage.writes_for(Path::new("/project/fine.cpp")), 1);
}

#[test]
fn storage_failure_keeps_the_in_memory_merge() {
    let fixture = Fixture::new();
    let command = fixture.add_unit("/project/a.cpp", "int main() {}", &[]);
    let indexer = fixture.indexer();

    fixture.storage.fail_writes(true);
    indexer.index(command).unwrap();

    // Nothing persisted, but queries still see the fresh result.
    assert!(fixture
        .storage
        .load_shard(Path::new("/project/a.cpp"))
        .unwrap()
        .is_none());
    let snapshot = indexer.composite().rebuild();
    assert!(snapshot
        .lookup(symbol_id(Path::new("/project/a.cpp")))
        .is_some());
}

#[test]
fn header_shards_never_carry_the_compile_command() {
    let fixture = Fixture::new();
    let command = fixture.add_unit(
        "/project/a.cpp",
        "#include \"a.h\"",
        &[("/project/a.h", "void helper();")],
    );
    let indexer = fixture.indexer();
    indexer.index(command.clone()).unwrap();

    let main_shard = fixture
        .storage
        .load_shard(Path::new("/project/a.cpp"))
        .unwrap()
        .unwrap();
    assert_eq!(main_shard.command.as_ref(), Some(&command));
    assert_eq!(
        main_shard.sources,
        vec![PathBuf::from("/project/a.cpp"), PathBuf::from("/project/a.h")]
    );

    let header_shard = fixture
        .storage
        .load_shard(Path::new("/project/a.h"))
        .unwrap()
        .unwrap();
    assert!(header_shard.command.is_none());
    assert!(header_shard.sources.is_empty());
}
