//! Storage providers: modularized.
//!
//! `StorageProvider` is the base contract; `FsStorage` implements it against
//! the real filesystem. `JournaledStorage` (journal module) and
//! `IndexedStorage` (index module) decorate it, each forwarding whatever it
//! does not intercept. Compose by explicit wrapping at construction:
//! indexing over journaling over the filesystem.

mod fs;
pub(crate) mod platform;

pub use fs::FsStorage;

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Options for copy/move operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    /// Create missing destination directories.
    pub create_dirs: bool,
    /// Allow replacing an existing destination. Under a journaling decorator
    /// this displaces the old file into the trash instead of destroying it.
    pub overwrite: bool,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            create_dirs: true,
            overwrite: false,
        }
    }
}

/// Platform file attributes the engine round-trips.
/// `unix_mode` is `None` on platforms without POSIX modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAttributes {
    pub readonly: bool,
    pub unix_mode: Option<u32>,
}

/// What an undo/redo call actually did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOutcome {
    /// The most recent transaction was replayed.
    Applied { label: String, actions: usize },
    /// The log was empty; nothing to do.
    Nothing,
}

/// Raw filesystem primitives plus operation-group (transaction) boundaries.
///
/// Paths may be absolute or album-relative; implementations resolve them via
/// `absolute`. Mutating calls take `&mut self`: the engine is single-threaded
/// and decorators keep per-call bookkeeping.
pub trait StorageProvider {
    /// Album root this provider is anchored at.
    fn root(&self) -> &Path;

    fn file_exists(&self, path: &Path) -> bool;
    fn dir_exists(&self, path: &Path) -> bool;

    /// Direct child files of `dir`, absolute, sorted by name.
    fn enumerate_files(&self, dir: &Path) -> Result<Vec<PathBuf>>;
    /// Direct child directories of `dir`, absolute, sorted by name.
    fn enumerate_dirs(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>>;
    fn write_bytes(&mut self, path: &Path, data: &[u8]) -> Result<()>;
    fn read_text(&self, path: &Path) -> Result<String>;
    fn write_text(&mut self, path: &Path, text: &str) -> Result<()>;

    fn created(&self, path: &Path) -> Result<DateTime<Utc>>;
    fn modified(&self, path: &Path) -> Result<DateTime<Utc>>;
    fn set_created(&mut self, path: &Path, when: DateTime<Utc>) -> Result<()>;
    fn set_modified(&mut self, path: &Path, when: DateTime<Utc>) -> Result<()>;

    fn attributes(&self, path: &Path) -> Result<FileAttributes>;
    fn set_attributes(&mut self, path: &Path, attrs: FileAttributes) -> Result<()>;

    fn copy_file(&mut self, src: &Path, dst: &Path, opts: TransferOptions) -> Result<()>;
    fn move_file(&mut self, src: &Path, dst: &Path, opts: TransferOptions) -> Result<()>;
    fn delete_file(&mut self, path: &Path) -> Result<()>;

    /// Resolve a possibly-relative path against the album root.
    fn absolute(&self, path: &Path) -> PathBuf;
    /// Album-relative form of `path`; errors when outside the root.
    fn relative(&self, path: &Path) -> Result<PathBuf>;

    /// Open an operation group. `join` marks it mergeable with the preceding
    /// group when the journal is read back, so several provider-level calls
    /// issued for one logical user action undo as one step.
    fn new_transaction(&mut self, label: &str, join: bool) -> Result<()>;
    /// Close the open operation group, making it durable.
    fn end_transaction(&mut self) -> Result<()>;

    /// Reverse the most recent committed transaction (LIFO).
    fn undo(&mut self) -> Result<UndoOutcome>;
    /// Re-apply the most recently undone transaction.
    fn redo(&mut self) -> Result<UndoOutcome>;
    /// Explicitly invalidate redo history so new work may begin.
    fn discard_redo(&mut self) -> Result<()>;
}
