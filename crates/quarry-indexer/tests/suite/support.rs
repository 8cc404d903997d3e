//! Deterministic fakes for driving the indexer without a real compiler or
//! file watcher.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use quarry_core::ContentDigest;
use quarry_index::{
    RefKind, RefSlab, Reference, Symbol, SymbolId, SymbolKind, SymbolLocation, SymbolSlab,
};
use quarry_indexer::{
    AnalyzerError, BackgroundIndexer, IndexerConfig, SourceInfo, StalenessFilter,
    TranslationUnitAnalyzer, UnitIndex,
};
use quarry_project::{CompilationDatabase, CompileCommand, InMemoryCompilationDatabase};
use quarry_store::{MemoryShardStorage, ShardStorage};
use quarry_vfs::{FileSystem, MemoryFs};

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Stable, content-independent symbol identity for a fake source file.
pub fn symbol_id(path: &Path) -> SymbolId {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    SymbolId(hasher.finish())
}

/// Analyzer double: each registered unit yields one symbol per source file
/// (named after the file stem) plus a reference from the main file to every
/// header symbol. The staleness filter is honored exactly like a compiler
/// frontend would: skipped files still appear in `sources` but contribute no
/// slabs.
#[derive(Default)]
pub struct FakeAnalyzer {
    fs: Arc<MemoryFs>,
    units: Mutex<HashMap<PathBuf, Vec<PathBuf>>>,
    fail: Mutex<HashSet<PathBuf>>,
    broken: Mutex<HashSet<PathBuf>>,
    analyzed: Mutex<Vec<PathBuf>>,
    skipped: Mutex<Vec<PathBuf>>,
}

impl FakeAnalyzer {
    pub fn new(fs: Arc<MemoryFs>) -> Self {
        Self {
            fs,
            ..Self::default()
        }
    }

    pub fn register_unit(&self, main: PathBuf, sources: Vec<PathBuf>) {
        self.units.lock().insert(main, sources);
    }

    /// Make analysis of `main` fail outright (no result produced).
    pub fn fail_on(&self, main: PathBuf) {
        self.fail.lock().insert(main);
    }

    /// Make `main` produce results with compile errors (provisional output).
    pub fn set_broken(&self, main: &Path, broken: bool) {
        if broken {
            self.broken.lock().insert(main.to_path_buf());
        } else {
            self.broken.lock().remove(main);
        }
    }

    /// Main files analyzed so far, in order.
    pub fn analyzed(&self) -> Vec<PathBuf> {
        self.analyzed.lock().clone()
    }

    /// Files the staleness filter told us not to collect from.
    pub fn skipped(&self) -> Vec<PathBuf> {
        self.skipped.lock().clone()
    }

    pub fn clear_logs(&self) {
        self.analyzed.lock().clear();
        self.skipped.lock().clear();
    }

    fn symbol_for(path: &Path) -> Symbol {
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Symbol {
            id: symbol_id(path),
            name: stem,
            container_name: None,
            kind: SymbolKind::Function,
            location: SymbolLocation {
                file: path.display().to_string(),
                line: 1,
                column: 1,
            },
        }
    }
}

impl TranslationUnitAnalyzer for FakeAnalyzer {
    fn analyze(
        &self,
        command: &CompileCommand,
        _contents: &[u8],
        filter: &StalenessFilter<'_>,
    ) -> Result<UnitIndex, AnalyzerError> {
        let main = command.absolute_path();
        self.analyzed.lock().push(main.clone());

        if self.fail.lock().contains(&main) {
            return Err(AnalyzerError::Failed(
                "simulated frontend crash".to_string(),
            ));
        }
        let sources = self
            .units
            .lock()
            .get(&main)
            .cloned()
            .ok_or_else(|| AnalyzerError::InvalidCommand(main.display().to_string()))?;

        let had_errors = self.broken.lock().contains(&main);
        let mut unit = UnitIndex {
            had_errors,
            ..UnitIndex::default()
        };

        let mut symbols = Vec::new();
        let mut refs = Vec::new();
        let mut main_collected = false;
        for source in &sources {
            let contents = self.fs.read_bytes(source).map_err(|err| {
                AnalyzerError::Failed(format!("missing include {}: {err}", source.display()))
            })?;
            let digest = ContentDigest::from_bytes(&contents);
            let collect = filter(source, &digest, had_errors);
            unit.sources.insert(
                source.clone(),
                SourceInfo {
                    digest,
                    had_errors: false,
                },
            );
            if collect {
                symbols.push(Self::symbol_for(source));
                if *source == main {
                    main_collected = true;
                }
            } else {
                self.skipped.lock().push(source.clone());
            }
        }
        if main_collected {
            for source in &sources {
                if *source != main {
                    refs.push(Reference {
                        symbol: symbol_id(source),
                        kind: RefKind::Reference,
                        location: SymbolLocation {
                            file: main.display().to_string(),
                            line: 2,
                            column: 1,
                        },
                    });
                }
            }
        }

        unit.symbols = SymbolSlab::new(symbols);
        unit.refs = RefSlab::new(refs);
        Ok(unit)
    }
}

/// Everything an indexer needs, with handles kept so tests can mutate files
/// and inspect storage behind its back.
pub struct Fixture {
    pub fs: Arc<MemoryFs>,
    pub cdb: Arc<InMemoryCompilationDatabase>,
    pub storage: Arc<MemoryShardStorage>,
    pub analyzer: Arc<FakeAnalyzer>,
}

impl Fixture {
    pub fn new() -> Self {
        init_logging();
        let fs = Arc::new(MemoryFs::new());
        Self {
            analyzer: Arc::new(FakeAnalyzer::new(Arc::clone(&fs))),
            cdb: Arc::new(InMemoryCompilationDatabase::new()),
            storage: Arc::new(MemoryShardStorage::new()),
            fs,
        }
    }

    /// Single worker and publish-per-TU keep integration tests deterministic.
    pub fn config() -> IndexerConfig {
        IndexerConfig {
            pool_size: 1,
            tus_before_rebuild: 1,
            stats_capacity: 64,
        }
    }

    pub fn indexer(&self) -> BackgroundIndexer {
        self.indexer_with_config(Self::config())
    }

    pub fn indexer_with_config(&self, config: IndexerConfig) -> BackgroundIndexer {
        BackgroundIndexer::new(
            config,
            Arc::clone(&self.fs) as Arc<dyn FileSystem>,
            Arc::clone(&self.cdb) as Arc<dyn CompilationDatabase>,
            Arc::clone(&self.storage) as Arc<dyn ShardStorage>,
            Arc::clone(&self.analyzer) as Arc<dyn TranslationUnitAnalyzer>,
        )
        .expect("spawn indexer")
    }

    /// Register one TU: writes the files, the compile command, and the fake
    /// analyzer's source list. Headers are `(path, contents)` pairs.
    pub fn add_unit(
        &self,
        main: &str,
        main_contents: &str,
        headers: &[(&str, &str)],
    ) -> CompileCommand {
        let main_path = PathBuf::from(main);
        self.fs.write(main_path.clone(), main_contents.as_bytes().to_vec());
        let mut sources = vec![main_path.clone()];
        for (header, contents) in headers {
            let header_path = PathBuf::from(header);
            self.fs
                .write(header_path.clone(), contents.as_bytes().to_vec());
            sources.push(header_path);
        }
        self.analyzer.register_unit(main_path.clone(), sources);

        let command = CompileCommand::new(
            main_path,
            "/project",
            vec!["-c".to_string(), main.to_string()],
        );
        self.cdb.insert(command.clone());
        command
    }
}
