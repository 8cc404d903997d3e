//! In-memory symbol index model: immutable per-file slabs and the live
//! composite index they merge into.

mod composite;
mod slabs;

pub use composite::{CompositeIndex, IndexSnapshot, SnapshotSymbol};
pub use slabs::{
    FileSlabs, RefKind, RefSlab, Reference, Relation, RelationKind, RelationSlab, Symbol,
    SymbolId, SymbolKind, SymbolLocation, SymbolSlab,
};
