use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use quarry_core::ContentDigest;
use quarry_index::FileSlabs;
use quarry_project::CompileCommand;

use crate::error::StoreError;

/// Bump whenever the shard payload layout or interpretation changes.
///
/// Old shards then read as incompatible and are re-derived by re-indexing,
/// which is always safe.
pub const SHARD_SCHEMA_VERSION: u32 = 1;

/// One file's persisted contribution to the index.
///
/// Only the shard of a TU's main file carries `command` and `sources`:
/// headers have no single owning command, and the recorded source list is
/// what lets the loader find header shards reachable from a main file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Shard {
    pub digest: ContentDigest,
    pub had_errors: bool,
    pub command: Option<CompileCommand>,
    pub sources: Vec<PathBuf>,
    pub slabs: FileSlabs,
}

/// A shard read back from storage during reconciliation.
///
/// `shard` is `None` when storage had nothing usable for the path; the entry
/// still participates in staleness checks so the owning TU gets re-indexed.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedShard {
    pub absolute_path: PathBuf,
    /// Main file of the TU to re-run if this shard turns out stale.
    pub dependent_tu: PathBuf,
    /// Whether this shard is its TU's main file, which is also what decides
    /// reference-count ownership in the composite index.
    pub count_references: bool,
    pub shard: Option<Shard>,
}

impl LoadedShard {
    pub fn digest(&self) -> Option<&ContentDigest> {
        self.shard.as_ref().map(|shard| &shard.digest)
    }

    pub fn had_errors(&self) -> bool {
        self.shard
            .as_ref()
            .is_some_and(|shard| shard.had_errors)
    }
}

/// Keyed blob store for shards, addressed by absolute source path.
pub trait ShardStorage: Send + Sync {
    /// Persist `shard` for `path`, replacing any previous version.
    fn store_shard(&self, path: &Path, shard: &Shard) -> Result<(), StoreError>;

    /// Load the current shard for `path`; `Ok(None)` when none was stored.
    fn load_shard(&self, path: &Path) -> Result<Option<Shard>, StoreError>;
}
