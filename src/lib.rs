//! Core library for `albumsafe`.
//!
//! Organizes a directory tree of media files (import, rename, copy, move,
//! delete) while guaranteeing that every destructive action can be undone
//! and redone, duplicates are detected safely, and repeated metadata
//! extraction is avoided via a cache.
//!
//! The engine is a stack of storage providers composed by explicit wrapping:
//!
//! - [`FsStorage`] talks to the real filesystem;
//! - [`JournaledStorage`] records every mutating call into an append-only
//!   undo log and redirects destructive operations into a trash holding
//!   area, giving transactions, undo and redo their meaning;
//! - [`IndexedStorage`] keeps a persisted metadata index consistent with
//!   every call and answers listings and timestamp reads from it.
//!
//! Importers ([`CopyImporter`], [`MoveImporter`], [`DeleteImporter`])
//! consume a planned [`ImportList`] inside one journal transaction, applying
//! a [`DuplicateResolver`] per item and isolating per-item failures.
//!
//! Outer layers (CLI, profiles, template engines, EXIF extraction) plug in
//! through [`MetadataProvider`] and [`NameProvider`]; this crate never
//! parses arguments, reads config files, or installs a tracing subscriber.

pub mod descriptor;
pub mod errors;
pub mod import;
pub mod index;
pub mod journal;
pub mod resolver;
pub mod storage;

pub use descriptor::{
    FileDescriptor, FsMetadataProvider, MetadataProvider, NameOutcome, NameProvider,
};
pub use errors::AlbumError;
pub use import::{
    CopyImporter, DeleteImporter, DeleteMode, DuplicatePolicy, ImportItem, ImportList,
    ImportOptions, ImportReport, Importer, ItemOutcome, ItemStatus, MoveImporter,
};
pub use index::IndexedStorage;
pub use journal::{Action, JournaledStorage, Transaction, Trash};
pub use resolver::{
    DuplicateResolver, HashResolver, OverwriteResolver, SkipResolver, SuffixResolver,
};
pub use storage::{
    FileAttributes, FsStorage, StorageProvider, TransferOptions, UndoOutcome,
};

use anyhow::Result;
use std::path::Path;

/// Open an album with the full provider stack: indexing over journaling over
/// the filesystem. `meta` supplies descriptors for the index (pass
/// [`FsMetadataProvider`] when no embedded-metadata extractor is wired in).
pub fn open_album(
    root: &Path,
    meta: Box<dyn MetadataProvider>,
    force_rebuild: bool,
) -> Result<IndexedStorage> {
    let base = FsStorage::open(root)?;
    let journaled = JournaledStorage::new(Box::new(base))?;
    IndexedStorage::open(Box::new(journaled), meta, force_rebuild)
}
