//! Background symbol indexing.
//!
//! [`BackgroundIndexer`] keeps a project's symbol index current as files
//! change without blocking interactive use: change batches from the
//! compilation database are reconciled against persisted shards, translation
//! units whose content digests drifted are re-analyzed on a worker pool, and
//! results are sharded per file, persisted, and merged into the composite
//! index. Publishing the merged index is throttled so a large backlog does
//! not rebuild the world after every file.

mod analyzer;
mod indexer;
mod rebuilder;
mod sharding;
mod version;

pub use analyzer::{
    AnalyzerError, SourceInfo, StalenessFilter, TranslationUnitAnalyzer, UnitIndex,
};
pub use indexer::{BackgroundIndexer, IndexerConfig, IndexerError};
pub use rebuilder::IndexRebuilder;
pub use version::ShardVersion;
