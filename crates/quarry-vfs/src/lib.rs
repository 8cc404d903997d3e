//! File system abstraction for Quarry.
//!
//! Indexing reads file contents at times chosen by the scheduler, not the
//! caller, so everything goes through [`FileSystem`]. The trait is
//! intentionally small so it can be implemented for different backends
//! (local FS, overlays, fixtures in tests).

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

/// Byte-level file access used by the indexer.
///
/// Paths handed to this trait are always absolute; relative compile-command
/// paths are resolved against the command's working directory before any
/// read happens.
pub trait FileSystem: Send + Sync {
    /// Reads the file contents as raw bytes.
    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Returns whether a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Returns basic metadata for a path.
    fn metadata(&self, path: &Path) -> io::Result<fs::Metadata>;
}

/// Local OS file system implementation.
#[derive(Debug, Clone, Default)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for LocalFs {
    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn metadata(&self, path: &Path) -> io::Result<fs::Metadata> {
        fs::metadata(path)
    }
}

/// Deterministic in-memory file system.
///
/// Tests that need "the file changed on disk" scenarios should mutate a
/// `MemoryFs` instead of sleeping on real watcher or filesystem timing.
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a file's contents.
    pub fn write(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        self.files.lock().insert(path.into(), contents.into());
    }

    /// Remove a file, returning whether it existed.
    pub fn remove(&self, path: &Path) -> bool {
        self.files.lock().remove(path).is_some()
    }
}

impl FileSystem for MemoryFs {
    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files.lock().get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().contains_key(path)
    }

    fn metadata(&self, path: &Path) -> io::Result<fs::Metadata> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("metadata not supported for in-memory files ({})", path.display()),
        ))
    }
}
