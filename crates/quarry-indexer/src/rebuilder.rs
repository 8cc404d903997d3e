use std::sync::Arc;

use parking_lot::Mutex;

use quarry_index::CompositeIndex;

#[derive(Default)]
struct RebuildState {
    indexed_tus: usize,
    /// TUs indexed since the last publish.
    dirty_tus: usize,
    /// Shards restored from storage since the last publish.
    dirty_shards: usize,
    loaded_shards: usize,
    /// Reconciliation passes currently restoring shards.
    active_loads: usize,
    first_build_done: bool,
    rebuilding: bool,
}

/// Decides when the composite index is merged and republished.
///
/// Rebuilding is expensive for large slabs, so it happens when the queue
/// drains (via the workers' idle callback), every `tus_before_rebuild`
/// freshly indexed TUs during a long backlog, and once enough TUs exist to
/// make the very first publish worth it. Only one rebuild runs at a time;
/// concurrent triggers are no-ops.
pub struct IndexRebuilder {
    index: Arc<CompositeIndex>,
    tus_before_first_build: usize,
    tus_before_rebuild: usize,
    state: Mutex<RebuildState>,
}

impl IndexRebuilder {
    /// `pool_size` doubles as the first-build threshold: once every worker
    /// could have produced one TU, queries get something to look at.
    pub fn new(index: Arc<CompositeIndex>, pool_size: usize, tus_before_rebuild: usize) -> Self {
        Self {
            index,
            tus_before_first_build: pool_size.max(1),
            tus_before_rebuild: tus_before_rebuild.max(1),
            state: Mutex::new(RebuildState::default()),
        }
    }

    /// A translation unit finished indexing.
    pub fn indexed_tu(&self) {
        let should_rebuild = {
            let mut state = self.state.lock();
            state.indexed_tus += 1;
            state.dirty_tus += 1;
            if state.first_build_done {
                state.dirty_tus >= self.tus_before_rebuild
            } else {
                state.dirty_tus >= self.tus_before_first_build
            }
        };
        if should_rebuild {
            self.rebuild();
        }
    }

    /// The queue went idle; publish whatever accumulated.
    pub fn idle(&self) {
        let should_rebuild = {
            let state = self.state.lock();
            state.active_loads == 0 && (state.dirty_tus > 0 || state.dirty_shards > 0)
        };
        if should_rebuild {
            self.rebuild();
        }
    }

    /// A reconciliation pass started restoring shards. Rebuilds are held
    /// back until it finishes so queries don't see a half-restored project.
    pub fn start_loading(&self) {
        self.state.lock().active_loads += 1;
    }

    pub fn loaded_shards(&self, count: usize) {
        if count == 0 {
            return;
        }
        let mut state = self.state.lock();
        state.loaded_shards += count;
        state.dirty_shards += count;
    }

    /// Reconciliation finished; publish restored data before re-analysis
    /// catches up, so prior results are queryable immediately.
    pub fn done_loading(&self) {
        let should_rebuild = {
            let mut state = self.state.lock();
            state.active_loads = state.active_loads.saturating_sub(1);
            state.active_loads == 0 && (state.dirty_tus > 0 || state.dirty_shards > 0)
        };
        if should_rebuild {
            self.rebuild();
        }
    }

    pub fn indexed_tu_count(&self) -> usize {
        self.state.lock().indexed_tus
    }

    pub fn loaded_shard_count(&self) -> usize {
        self.state.lock().loaded_shards
    }

    fn rebuild(&self) {
        {
            let mut state = self.state.lock();
            if state.rebuilding {
                return;
            }
            state.rebuilding = true;
            state.dirty_tus = 0;
            state.dirty_shards = 0;
        }

        let snapshot = self.index.rebuild();
        tracing::debug!(
            target = "quarry.indexer",
            symbols = snapshot.symbol_count(),
            files = snapshot.file_count(),
            "published composite index"
        );

        let mut state = self.state.lock();
        state.rebuilding = false;
        state.first_build_done = true;
    }
}
