//! Persisted per-file index shards.
//!
//! Each source file's contribution to the index is stored as one small blob:
//! a fixed little-endian header (magic, format versions, payload hash) and a
//! `bincode` payload, written atomically via a unique temp file and rename.
//! Corrupt or incompatible blobs are detected on read and treated as absent
//! so a crashed or downgraded process never poisons a later run.

mod blob;
mod disk;
mod error;
mod header;
mod loader;
mod memory;
mod shard;

pub use disk::DiskShardStorage;
pub use error::StoreError;
pub use header::{ArtifactKind, Compression, WriteCompression};
pub use loader::load_shards_for;
pub use memory::MemoryShardStorage;
pub use shard::{LoadedShard, Shard, ShardStorage, SHARD_SCHEMA_VERSION};
