use std::collections::HashMap;
use std::path::{Path, PathBuf};

use quarry_index::{FileSlabs, RefSlab, Reference, Relation, RelationSlab, Symbol, SymbolId, SymbolSlab};

use crate::analyzer::UnitIndex;

/// Partition a TU's whole-unit slabs into per-file slabs.
///
/// Symbols and references go to the file of their location. Relations carry
/// no location of their own, so each is attributed to the file defining its
/// subject symbol, falling back to the TU's main file when the subject was
/// not collected in this run (e.g. it lives in a file the staleness filter
/// skipped).
pub(crate) fn shard_unit(unit: &UnitIndex, main_file: &Path) -> HashMap<PathBuf, FileSlabs> {
    let mut symbols: HashMap<PathBuf, Vec<Symbol>> = HashMap::new();
    let mut refs: HashMap<PathBuf, Vec<Reference>> = HashMap::new();
    let mut relations: HashMap<PathBuf, Vec<Relation>> = HashMap::new();

    let mut defining_file: HashMap<SymbolId, PathBuf> = HashMap::new();
    for symbol in unit.symbols.iter() {
        let file = PathBuf::from(&symbol.location.file);
        defining_file.insert(symbol.id, file.clone());
        symbols.entry(file).or_default().push(symbol.clone());
    }
    for reference in unit.refs.iter() {
        refs.entry(PathBuf::from(&reference.location.file))
            .or_default()
            .push(reference.clone());
    }
    for relation in unit.relations.iter() {
        let file = defining_file
            .get(&relation.subject)
            .cloned()
            .unwrap_or_else(|| main_file.to_path_buf());
        relations.entry(file).or_default().push(relation.clone());
    }

    let mut out: HashMap<PathBuf, FileSlabs> = HashMap::new();
    for (file, symbols) in symbols {
        out.entry(file).or_default().symbols = SymbolSlab::new(symbols);
    }
    for (file, refs) in refs {
        out.entry(file).or_default().refs = RefSlab::new(refs);
    }
    for (file, relations) in relations {
        out.entry(file).or_default().relations = RelationSlab::new(relations);
    }
    out
}
