use std::io;
use std::path::{Path, PathBuf};

use quarry_core::ContentDigest;

use crate::blob::{read_blob_optional, write_blob_atomic};
use crate::error::StoreError;
use crate::header::{ArtifactKind, WriteCompression};
use crate::shard::{Shard, ShardStorage, SHARD_SCHEMA_VERSION};

/// Shard storage rooted at a project-local cache directory.
///
/// One `.shard` file per source file. The file name keeps the source's stem
/// for debuggability and appends a short path hash so files with equal names
/// in different directories don't collide.
pub struct DiskShardStorage {
    root: PathBuf,
    compression: WriteCompression,
}

impl DiskShardStorage {
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            compression: WriteCompression::default(),
        })
    }

    pub fn with_compression(mut self, compression: WriteCompression) -> Self {
        self.compression = compression;
        self
    }

    fn shard_path(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());
        let path_hash = ContentDigest::from_bytes(source.to_string_lossy().as_bytes());
        self.root
            .join(format!("{stem}.{}.shard", &path_hash.as_str()[..16]))
    }
}

impl ShardStorage for DiskShardStorage {
    fn store_shard(&self, path: &Path, shard: &Shard) -> Result<(), StoreError> {
        let payload =
            bincode::serialize(shard).map_err(|err| StoreError::Encode(err.to_string()))?;
        write_blob_atomic(
            &self.shard_path(path),
            ArtifactKind::FileShard,
            SHARD_SCHEMA_VERSION,
            &payload,
            self.compression,
        )
    }

    fn load_shard(&self, path: &Path) -> Result<Option<Shard>, StoreError> {
        let Some(payload) = read_blob_optional(
            &self.shard_path(path),
            ArtifactKind::FileShard,
            SHARD_SCHEMA_VERSION,
        )?
        else {
            return Ok(None);
        };
        let shard =
            bincode::deserialize(&payload).map_err(|err| StoreError::Decode(err.to_string()))?;
        Ok(Some(shard))
    }
}
