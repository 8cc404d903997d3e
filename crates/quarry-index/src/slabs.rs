use serde::{Deserialize, Serialize};

/// Stable identity of a symbol across translation units.
///
/// Analyzers derive this from the symbol's mangled/qualified name, so the
/// same declaration observed from two TUs collapses to one entry.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SymbolId(pub u64);

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Namespace,
    Class,
    Struct,
    Enum,
    Function,
    Method,
    Field,
    Variable,
    Typedef,
    Macro,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

/// A symbol definition or canonical declaration observed during analysis.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub container_name: Option<String>,
    pub kind: SymbolKind,
    pub location: SymbolLocation,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Declaration,
    Definition,
    Reference,
}

/// One usage of a symbol at a concrete location.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub symbol: SymbolId,
    pub kind: RefKind,
    pub location: SymbolLocation,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    BaseOf,
    OverriddenBy,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub subject: SymbolId,
    pub kind: RelationKind,
    pub object: SymbolId,
}

/// Immutable collection of symbols, ordered by id for deterministic output.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolSlab {
    symbols: Vec<Symbol>,
}

impl SymbolSlab {
    pub fn new(mut symbols: Vec<Symbol>) -> Self {
        symbols.sort_by_key(|symbol| symbol.id);
        symbols.dedup_by_key(|symbol| symbol.id);
        Self { symbols }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols
            .binary_search_by_key(&id, |symbol| symbol.id)
            .ok()
            .map(|index| &self.symbols[index])
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl FromIterator<Symbol> for SymbolSlab {
    fn from_iter<I: IntoIterator<Item = Symbol>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Immutable collection of references.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefSlab {
    refs: Vec<Reference>,
}

impl RefSlab {
    pub fn new(mut refs: Vec<Reference>) -> Self {
        refs.sort_by(|a, b| {
            (a.symbol, &a.location.file, a.location.line, a.location.column).cmp(&(
                b.symbol,
                &b.location.file,
                b.location.line,
                b.location.column,
            ))
        });
        Self { refs }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reference> {
        self.refs.iter()
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

impl FromIterator<Reference> for RefSlab {
    fn from_iter<I: IntoIterator<Item = Reference>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Immutable collection of relations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationSlab {
    relations: Vec<Relation>,
}

impl RelationSlab {
    pub fn new(mut relations: Vec<Relation>) -> Self {
        relations.sort_by_key(|relation| (relation.subject, relation.kind, relation.object));
        relations.dedup();
        Self { relations }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relation> {
        self.relations.iter()
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}

impl FromIterator<Relation> for RelationSlab {
    fn from_iter<I: IntoIterator<Item = Relation>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// The slabs attributable to a single file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSlabs {
    pub symbols: SymbolSlab,
    pub refs: RefSlab,
    pub relations: RelationSlab,
}

impl FileSlabs {
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() && self.refs.is_empty() && self.relations.is_empty()
    }
}
