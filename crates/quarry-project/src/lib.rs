//! Compilation database model for Quarry.
//!
//! A [`CompilationDatabase`] maps source files to the compile command that
//! builds them and reports build-configuration changes. Change events are
//! delivered over a `crossbeam_channel` stream rather than a callback, so
//! emitters never block on slow consumers and consumers can integrate the
//! feed into their own loops without inheriting an async runtime.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use quarry_core::resolve_command_path;

/// One translation unit's build invocation.
///
/// `filename` is either absolute or relative to `directory`; use
/// [`CompileCommand::absolute_path`] before touching the filesystem.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileCommand {
    pub filename: PathBuf,
    pub directory: PathBuf,
    pub arguments: Vec<String>,
}

impl CompileCommand {
    pub fn new(
        filename: impl Into<PathBuf>,
        directory: impl Into<PathBuf>,
        arguments: Vec<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            directory: directory.into(),
            arguments,
        }
    }

    /// The command's file resolved to a normalized absolute path.
    pub fn absolute_path(&self) -> PathBuf {
        resolve_command_path(&self.filename, &self.directory)
    }
}

/// Batches of files whose build configuration changed.
pub type ChangeReceiver = crossbeam_channel::Receiver<Vec<PathBuf>>;

/// Object-safe compilation database abstraction.
pub trait CompilationDatabase: Send + Sync {
    /// Look up the current compile command for `path`.
    ///
    /// Returns `None` when the file is not part of the build (e.g. the
    /// translation unit was removed since its shards were written).
    fn compile_command(&self, path: &Path) -> Option<CompileCommand>;

    /// Subscribe to build-configuration changes.
    ///
    /// Each event is a batch of main files that should be reconciled. The
    /// channel is unbounded; emitters must never block on delivery.
    fn watch(&self) -> ChangeReceiver;
}

/// Compilation database backed by an in-memory command map.
///
/// Used by tests and by embedders that already computed their build model
/// elsewhere. [`InMemoryCompilationDatabase::notify_changed`] plays the role
/// of the build system's change feed.
#[derive(Default)]
pub struct InMemoryCompilationDatabase {
    commands: Mutex<HashMap<PathBuf, CompileCommand>>,
    subscribers: Mutex<Vec<crossbeam_channel::Sender<Vec<PathBuf>>>>,
}

impl InMemoryCompilationDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the command for its main file.
    ///
    /// Commands are keyed by the resolved absolute path of their file.
    pub fn insert(&self, command: CompileCommand) {
        self.commands
            .lock()
            .insert(command.absolute_path(), command);
    }

    /// Drop the command for `path`, returning whether one was present.
    pub fn remove(&self, path: &Path) -> bool {
        self.commands.lock().remove(path).is_some()
    }

    /// Emit a change batch to every live subscriber.
    ///
    /// Disconnected subscribers are pruned as a side effect.
    pub fn notify_changed(&self, files: Vec<PathBuf>) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(files.clone()).is_ok());
    }
}

impl CompilationDatabase for InMemoryCompilationDatabase {
    fn compile_command(&self, path: &Path) -> Option<CompileCommand> {
        self.commands.lock().get(path).cloned()
    }

    fn watch(&self) -> ChangeReceiver {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }
}
