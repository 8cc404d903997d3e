use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use thiserror::Error;

use quarry_core::ContentDigest;
use quarry_index::{CompositeIndex, IndexSnapshot};
use quarry_project::{CompilationDatabase, CompileCommand};
use quarry_scheduler::{
    QueuePriority, QueueStats, StatsReceiver, Task, TaskQueue, ThreadPriority, WorkerPool,
};
use quarry_store::{load_shards_for, LoadedShard, Shard, ShardStorage};
use quarry_vfs::FileSystem;

use crate::analyzer::{AnalyzerError, SourceInfo, TranslationUnitAnalyzer, UnitIndex};
use crate::rebuilder::IndexRebuilder;
use crate::sharding::shard_unit;
use crate::version::{ShardVersion, VersionTable};

#[derive(Clone, Debug)]
pub struct IndexerConfig {
    /// Worker threads draining the queue; also the first-publish threshold.
    pub pool_size: usize,
    /// Re-publish the composite index after this many TUs even if the queue
    /// never goes idle.
    pub tus_before_rebuild: usize,
    /// Capacity of the queue-stats broadcast channel.
    pub stats_capacity: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            // Containers can report the host CPU count even when the process
            // is constrained; stay conservative and let embedders raise it.
            pool_size: available.saturating_sub(1).clamp(1, 8),
            tus_before_rebuild: 100,
            stats_capacity: 1024,
        }
    }
}

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("could not read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
}

/// The background index: owns the worker pool, the staleness table, the
/// composite index, and the subscription to compilation database changes.
///
/// Dropping the indexer stops the queue, lets in-flight tasks finish, and
/// joins every thread it spawned.
pub struct BackgroundIndexer {
    inner: Arc<IndexerInner>,
    pool: Option<WorkerPool>,
    watcher: Option<JoinHandle<()>>,
    watcher_stop: crossbeam_channel::Sender<()>,
}

struct IndexerInner {
    fs: Arc<dyn FileSystem>,
    cdb: Arc<dyn CompilationDatabase>,
    storage: Arc<dyn ShardStorage>,
    analyzer: Arc<dyn TranslationUnitAnalyzer>,
    queue: Arc<TaskQueue>,
    index: Arc<CompositeIndex>,
    versions: Mutex<VersionTable>,
    rebuilder: IndexRebuilder,
}

impl BackgroundIndexer {
    pub fn new(
        config: IndexerConfig,
        fs: Arc<dyn FileSystem>,
        cdb: Arc<dyn CompilationDatabase>,
        storage: Arc<dyn ShardStorage>,
        analyzer: Arc<dyn TranslationUnitAnalyzer>,
    ) -> io::Result<Self> {
        let queue = Arc::new(TaskQueue::new(config.stats_capacity));
        let index = Arc::new(CompositeIndex::new());
        let rebuilder = IndexRebuilder::new(
            Arc::clone(&index),
            config.pool_size,
            config.tus_before_rebuild,
        );
        let changes = cdb.watch();
        let inner = Arc::new(IndexerInner {
            fs,
            cdb,
            storage,
            analyzer,
            queue,
            index,
            versions: Mutex::new(VersionTable::new()),
            rebuilder,
        });

        // The change feed is consumed off-thread so the compilation database
        // never blocks on us, and reconciliation itself happens as a queued
        // task, not here.
        let (watcher_stop, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let watcher = std::thread::Builder::new()
            .name("quarry-cdb-watch".to_string())
            .spawn({
                let inner = Arc::clone(&inner);
                move || loop {
                    crossbeam_channel::select! {
                        recv(changes) -> msg => match msg {
                            Ok(files) => inner.enqueue_changed(files),
                            Err(_) => break,
                        },
                        recv(stop_rx) -> _ => break,
                    }
                }
            })?;

        let pool = WorkerPool::spawn("quarry-worker", config.pool_size, {
            let inner = Arc::clone(&inner);
            move |_| inner.queue.work(|| inner.rebuilder.idle())
        })?;
        if pool.len() < config.pool_size {
            tracing::warn!(
                target = "quarry.indexer",
                requested = config.pool_size,
                spawned = pool.len(),
                "indexing with a degraded worker pool"
            );
        }

        Ok(Self {
            inner,
            pool: Some(pool),
            watcher: Some(watcher),
            watcher_stop,
        })
    }

    /// Queue reconciliation of a batch of main files, as if the compilation
    /// database had reported them changed.
    pub fn enqueue(&self, files: Vec<PathBuf>) {
        self.inner.enqueue_changed(files);
    }

    /// An interactive consumer asked for `path`; pull the owning TU (and its
    /// siblings, which share the tag) ahead of the bulk backlog.
    pub fn boost_related(&self, path: &Path) {
        if is_header(path) {
            self.inner
                .queue
                .boost(&stem_tag(path), QueuePriority::IndexBoostedFile);
        }
    }

    /// Synchronously index one translation unit on the calling thread.
    ///
    /// This is the body of every queued index task; it is public so embedders
    /// and tests can drive a single TU without the queue.
    pub fn index(&self, command: CompileCommand) -> Result<(), IndexerError> {
        self.inner.index(command)
    }

    /// Synchronously reconcile `main_files` against persisted shards and
    /// return the compile commands that need a fresh run.
    ///
    /// [`BackgroundIndexer::enqueue`] runs exactly this inside a
    /// `LoadShards`-tier task and schedules the returned commands.
    pub fn reconcile(&self, main_files: &[PathBuf]) -> Vec<CompileCommand> {
        self.inner.load_project(main_files)
    }

    /// The most recently published merge of the index.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.inner.index.snapshot()
    }

    /// Live composite index handle, for embedders wiring up their own query
    /// surface.
    pub fn composite(&self) -> Arc<CompositeIndex> {
        Arc::clone(&self.inner.index)
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.inner.queue.stats()
    }

    pub fn subscribe_stats(&self) -> StatsReceiver {
        self.inner.queue.subscribe_stats()
    }

    /// Wait until the queue drains or `timeout` expires.
    pub fn block_until_idle(&self, timeout: Duration) -> bool {
        self.inner.queue.block_until_idle(timeout)
    }

    /// Stop accepting and starting work. In-flight tasks finish; pending
    /// ones are abandoned. Idempotent; `Drop` also joins the threads.
    pub fn stop(&self) {
        self.inner.queue.stop();
        let _ = self.watcher_stop.try_send(());
    }
}

impl Drop for BackgroundIndexer {
    fn drop(&mut self) {
        self.stop();
        if let Some(pool) = self.pool.take() {
            pool.join();
        }
        if let Some(watcher) = self.watcher.take() {
            let _ = watcher.join();
        }
    }
}

impl IndexerInner {
    fn enqueue_changed(self: &Arc<Self>, files: Vec<PathBuf>) {
        tracing::debug!(
            target = "quarry.indexer",
            files = files.len(),
            "queueing reconciliation"
        );
        let inner = Arc::clone(self);
        let task = Task::new(move || {
            let mut commands = inner.load_project(&files);
            // Shuffle the batch before insertion so one large change set
            // doesn't monopolize within-tier ordering and heavy files don't
            // systematically block each other.
            commands.shuffle(&mut rand::rng());
            let tasks: Vec<Task> = commands
                .into_iter()
                .map(|command| index_task(&inner, command))
                .collect();
            inner.queue.append(tasks);
        })
        .with_priority(QueuePriority::LoadShards)
        .with_thread_priority(ThreadPriority::Normal);
        self.queue.push(task);
    }

    /// Restore persisted shards for `main_files`, then work out which TUs
    /// must be re-analyzed because their sources drifted.
    fn load_project(&self, main_files: &[PathBuf]) -> Vec<CompileCommand> {
        self.rebuilder.start_loading();
        let loaded = load_shards_for(&*self.storage, main_files);

        // Merge whatever storage had before any re-analysis happens, so
        // previously computed results are queryable right away.
        let mut restored = 0_usize;
        {
            let mut versions = self.versions.lock();
            for loaded_shard in &loaded {
                let Some(shard) = &loaded_shard.shard else {
                    continue;
                };
                versions.insert(
                    loaded_shard.absolute_path.clone(),
                    ShardVersion {
                        digest: shard.digest.clone(),
                        had_errors: shard.had_errors,
                    },
                );
                self.index.update(
                    &loaded_shard.absolute_path,
                    shard.slabs.clone(),
                    loaded_shard.count_references,
                );
                restored += 1;
            }
        }
        self.rebuilder.loaded_shards(restored);
        self.rebuilder.done_loading();

        // Stale data was merged anyway; now make sure it gets replaced soon.
        let mut stale_tus: BTreeSet<PathBuf> = BTreeSet::new();
        for loaded_shard in &loaded {
            if self.shard_is_stale(loaded_shard) {
                stale_tus.insert(loaded_shard.dependent_tu.clone());
            }
        }

        // One entry per TU, however many of its shards went stale. This is
        // deliberately not a minimal covering set over the include graph.
        let mut commands = Vec::new();
        for tu in stale_tus {
            // TUs that fell out of the build since their shards were written
            // have nothing to re-run; skip them.
            if let Some(command) = self.cdb.compile_command(&tu) {
                commands.push(command);
            }
        }
        tracing::debug!(
            target = "quarry.indexer",
            restored,
            stale = commands.len(),
            "project reconciled"
        );
        commands
    }

    fn shard_is_stale(&self, loaded_shard: &LoadedShard) -> bool {
        let contents = match self.fs.read_bytes(&loaded_shard.absolute_path) {
            Ok(contents) => contents,
            Err(err) => {
                tracing::warn!(
                    target = "quarry.indexer",
                    path = %loaded_shard.absolute_path.display(),
                    error = %err,
                    "could not read file to validate stored shard"
                );
                // There is no point in indexing an unreadable file.
                return false;
            }
        };
        loaded_shard.digest() != Some(&ContentDigest::from_bytes(&contents))
    }

    fn index(&self, command: CompileCommand) -> Result<(), IndexerError> {
        let main = command.absolute_path();
        let contents = self
            .fs
            .read_bytes(&main)
            .map_err(|source| IndexerError::Unreadable {
                path: main.clone(),
                source,
            })?;
        let digest = ContentDigest::from_bytes(&contents);

        // One snapshot for the whole TU instead of locking per included file.
        let snapshot: VersionTable = self.versions.lock().clone();

        tracing::debug!(
            target = "quarry.indexer",
            file = %main.display(),
            digest = digest.short(),
            "indexing translation unit"
        );

        let filter = |path: &Path, digest: &ContentDigest, had_errors: bool| {
            ShardVersion::needs_update(snapshot.get(path), digest, had_errors)
        };
        let mut unit = self.analyzer.analyze(&command, &contents, &filter)?;

        if unit.had_errors {
            tracing::warn!(
                target = "quarry.indexer",
                file = %main.display(),
                "translation unit had compile errors; index may be incomplete"
            );
            // Every shard of a broken TU is provisional, eligible for
            // replacement by a later clean run of identical content.
            for info in unit.sources.values_mut() {
                info.had_errors = true;
            }
        }
        // Make sure the main file itself is accounted for even if the
        // analyzer only reported headers.
        unit.sources.entry(main.clone()).or_insert(SourceInfo {
            digest,
            had_errors: unit.had_errors,
        });

        self.update(&main, unit, &snapshot, command);
        self.rebuilder.indexed_tu();
        Ok(())
    }

    /// Shard a TU's results by file and apply every shard whose
    /// `(digest, had_errors)` drifted from the snapshot.
    fn update(
        &self,
        main: &Path,
        unit: UnitIndex,
        snapshot: &VersionTable,
        command: CompileCommand,
    ) {
        let mut to_update = Vec::new();
        for (path, info) in &unit.sources {
            if ShardVersion::needs_update(snapshot.get(path), &info.digest, info.had_errors) {
                to_update.push((path.clone(), info.clone()));
            }
        }

        let source_paths: Vec<PathBuf> = unit.sources.keys().cloned().collect();
        let mut sharded = shard_unit(&unit, main);

        for (path, info) in to_update {
            let slabs = sharded.remove(&path).unwrap_or_default();
            let is_main = path == main;
            let shard = Shard {
                digest: info.digest.clone(),
                had_errors: info.had_errors,
                // Headers have no single owning command; only the main file's
                // shard records how the TU was built and what it included.
                command: is_main.then(|| command.clone()),
                sources: if is_main {
                    source_paths.clone()
                } else {
                    Vec::new()
                },
                slabs: slabs.clone(),
            };

            // Persist before merging: a crash between the two leaves storage
            // consistent with what a later run will re-derive.
            if let Err(err) = self.storage.store_shard(&path, &shard) {
                tracing::error!(
                    target = "quarry.indexer",
                    path = %path.display(),
                    error = %err,
                    "failed to write shard; keeping the in-memory update"
                );
            }

            let mut versions = self.versions.lock();
            // Re-check against the live table: another worker may have
            // finished a newer pass over a shared header since our snapshot.
            if !ShardVersion::needs_update(versions.get(&path), &info.digest, info.had_errors) {
                continue;
            }
            versions.insert(
                path.clone(),
                ShardVersion {
                    digest: info.digest.clone(),
                    had_errors: info.had_errors,
                },
            );
            // An analysis that started earlier but finished later can still
            // overwrite a newer entry here when digests differ. Accepted:
            // fixing it would serialize unrelated TUs.
            self.index.update(&path, slabs, is_main);
        }
    }
}

fn index_task(inner: &Arc<IndexerInner>, command: CompileCommand) -> Task {
    let tag = stem_tag(&command.filename);
    let inner = Arc::clone(inner);
    Task::new(move || {
        let file = command.filename.display().to_string();
        if let Err(err) = inner.index(command) {
            tracing::error!(
                target = "quarry.indexer",
                file = %file,
                error = %err,
                "indexing failed"
            );
        }
    })
    .with_tag(tag)
}

/// Tasks are tagged by file stem so a header request can boost the TU that
/// owns it along with its siblings.
fn stem_tag(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn is_header(path: &Path) -> bool {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => matches!(ext, "h" | "hh" | "hpp" | "hxx" | "inc"),
        None => false,
    }
}
