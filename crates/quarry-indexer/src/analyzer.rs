use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use quarry_core::ContentDigest;
use quarry_index::{RefSlab, RelationSlab, SymbolSlab};
use quarry_project::CompileCommand;

/// What the analyzer observed about one source file of a translation unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceInfo {
    pub digest: ContentDigest,
    pub had_errors: bool,
}

/// Everything observed while analyzing one translation unit: whole-TU slabs
/// plus the set of sources (main file and transitively included headers)
/// they were collected from.
#[derive(Clone, Debug, Default)]
pub struct UnitIndex {
    pub symbols: SymbolSlab,
    pub refs: RefSlab,
    pub relations: RelationSlab,
    pub sources: BTreeMap<PathBuf, SourceInfo>,
    /// The TU did not compile cleanly; results are provisional.
    pub had_errors: bool,
}

/// Tells the analyzer whether collecting from an included file is worthwhile.
///
/// Receives the file's absolute path, the digest the analyzer observed, and
/// whether the analyzer considers the file's content erroneous. A `false`
/// return means the index already has current data for that exact content,
/// so the file can be skipped without losing anything.
pub type StalenessFilter<'a> = dyn Fn(&Path, &ContentDigest, bool) -> bool + Send + Sync + 'a;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("invalid compile command: {0}")]
    InvalidCommand(String),

    #[error("analysis failed: {0}")]
    Failed(String),
}

/// External collaborator that turns a compile command plus file content into
/// index data; stands in for a compiler frontend.
///
/// A clean error return means no usable result exists and nothing of this TU
/// should be merged. A TU with compile errors that still produced data is a
/// *successful* return with [`UnitIndex::had_errors`] set.
pub trait TranslationUnitAnalyzer: Send + Sync {
    fn analyze(
        &self,
        command: &CompileCommand,
        contents: &[u8],
        filter: &StalenessFilter<'_>,
    ) -> Result<UnitIndex, AnalyzerError>;
}
