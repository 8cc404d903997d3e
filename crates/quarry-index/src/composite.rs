use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::slabs::{FileSlabs, Reference, RelationKind, Symbol, SymbolId};

struct FileEntry {
    slabs: Arc<FileSlabs>,
    count_references: bool,
}

/// The live, queryable merge of all current per-file slabs.
///
/// Writers replace whole files ([`CompositeIndex::update`]); readers query a
/// published [`IndexSnapshot`] that only changes when a rebuild runs. Updates
/// are therefore cheap and frequent while the expensive global merge is
/// amortized by the rebuild throttle.
#[derive(Default)]
pub struct CompositeIndex {
    files: Mutex<HashMap<PathBuf, FileEntry>>,
    published: RwLock<Arc<IndexSnapshot>>,
}

impl CompositeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the slabs attributed to `path`.
    ///
    /// `count_references` marks slabs coming from a TU's main file; only
    /// those contribute to per-symbol reference counts, so a header seen
    /// from many TUs is not counted once per TU.
    pub fn update(&self, path: &Path, slabs: FileSlabs, count_references: bool) {
        self.files.lock().insert(
            path.to_path_buf(),
            FileEntry {
                slabs: Arc::new(slabs),
                count_references,
            },
        );
    }

    /// Drop a file's contribution entirely, returning whether it existed.
    pub fn remove(&self, path: &Path) -> bool {
        self.files.lock().remove(path).is_some()
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().len()
    }

    /// Merge the current per-file slabs into a fresh snapshot and publish it.
    pub fn rebuild(&self) -> Arc<IndexSnapshot> {
        // Clone the Arc'd slabs under the lock, merge outside it.
        let entries: BTreeMap<PathBuf, (Arc<FileSlabs>, bool)> = self
            .files
            .lock()
            .iter()
            .map(|(path, entry)| {
                (
                    path.clone(),
                    (Arc::clone(&entry.slabs), entry.count_references),
                )
            })
            .collect();

        let mut snapshot = IndexSnapshot {
            files: entries.len(),
            ..IndexSnapshot::default()
        };
        for (slabs, count_references) in entries.values() {
            for symbol in slabs.symbols.iter() {
                // First definition wins; files merge in sorted path order so
                // the outcome does not depend on update timing.
                snapshot
                    .symbols
                    .entry(symbol.id)
                    .or_insert_with(|| SnapshotSymbol {
                        symbol: symbol.clone(),
                        references: 0,
                    });
            }
            for reference in slabs.refs.iter() {
                snapshot
                    .refs
                    .entry(reference.symbol)
                    .or_default()
                    .push(reference.clone());
                if *count_references {
                    if let Some(entry) = snapshot.symbols.get_mut(&reference.symbol) {
                        entry.references += 1;
                    }
                }
            }
            for relation in slabs.relations.iter() {
                let objects = snapshot
                    .relations
                    .entry((relation.subject, relation.kind))
                    .or_default();
                if !objects.contains(&relation.object) {
                    objects.push(relation.object);
                }
            }
        }

        let snapshot = Arc::new(snapshot);
        *self.published.write() = Arc::clone(&snapshot);
        snapshot
    }

    /// The most recently published snapshot. Empty until the first rebuild.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        Arc::clone(&self.published.read())
    }
}

/// A symbol as seen by queries, with its merged reference count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotSymbol {
    pub symbol: Symbol,
    pub references: u32,
}

/// Immutable point-in-time merge of the composite index.
#[derive(Debug, Default)]
pub struct IndexSnapshot {
    symbols: BTreeMap<SymbolId, SnapshotSymbol>,
    refs: BTreeMap<SymbolId, Vec<Reference>>,
    relations: BTreeMap<(SymbolId, RelationKind), Vec<SymbolId>>,
    files: usize,
}

impl IndexSnapshot {
    pub fn lookup(&self, id: SymbolId) -> Option<&SnapshotSymbol> {
        self.symbols.get(&id)
    }

    pub fn symbols_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a SnapshotSymbol> {
        self.symbols
            .values()
            .filter(move |entry| entry.symbol.name == name)
    }

    pub fn references(&self, id: SymbolId) -> &[Reference] {
        self.refs.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn related(&self, subject: SymbolId, kind: RelationKind) -> &[SymbolId] {
        self.relations
            .get(&(subject, kind))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn file_count(&self) -> usize {
        self.files
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() && self.refs.is_empty() && self.relations.is_empty()
    }
}
