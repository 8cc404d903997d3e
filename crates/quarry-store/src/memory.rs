use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::StoreError;
use crate::shard::{Shard, ShardStorage};

/// In-memory shard storage for tests and embedders without a disk cache.
///
/// Keeps a journal of every store so tests can assert which paths were
/// (re)written — the cheapest way to verify idempotence end to end.
#[derive(Default)]
pub struct MemoryShardStorage {
    shards: Mutex<HashMap<PathBuf, Shard>>,
    write_log: Mutex<Vec<PathBuf>>,
    fail_writes: Mutex<bool>,
}

impl MemoryShardStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every path passed to `store_shard`, in order.
    pub fn write_log(&self) -> Vec<PathBuf> {
        self.write_log.lock().clone()
    }

    pub fn writes_for(&self, path: &Path) -> usize {
        self.write_log
            .lock()
            .iter()
            .filter(|entry| entry.as_path() == path)
            .count()
    }

    /// Make subsequent stores fail, for exercising the log-and-continue
    /// behavior of callers.
    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }
}

impl ShardStorage for MemoryShardStorage {
    fn store_shard(&self, path: &Path, shard: &Shard) -> Result<(), StoreError> {
        self.write_log.lock().push(path.to_path_buf());
        if *self.fail_writes.lock() {
            return Err(StoreError::Io(std::io::Error::other(
                "simulated storage failure",
            )));
        }
        self.shards
            .lock()
            .insert(path.to_path_buf(), shard.clone());
        Ok(())
    }

    fn load_shard(&self, path: &Path) -> Result<Option<Shard>, StoreError> {
        Ok(self.shards.lock().get(path).cloned())
    }
}
