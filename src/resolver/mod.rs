//! Duplicate resolution strategies.
//!
//! Policy:
//! - Skip: cancel the item; no rename attempted.
//! - Suffix: probe `a`..`z`, then `za`, `zb`, ... for a free name.
//! - Overwrite: keep the destination and flag the operation to overwrite,
//!   optionally only when the content actually differs.
//! - Hash: decorate another resolver with content comparison so identical
//!   files cancel as confirmed duplicates.
//!
//! A resolver never selects an existing path with different content unless
//! the caller asked for overwrite explicitly.

mod hash;
mod suffix;

pub use hash::{HashResolver, content_digest};
pub use suffix::{SuffixResolver, SuffixSequence};

use anyhow::Result;
use std::path::PathBuf;
use tracing::debug;

use crate::import::ImportItem;
use crate::storage::StorageProvider;

/// Decides the fate of a planned item whose destination already exists.
pub trait DuplicateResolver {
    /// Return the item with a new destination, or the same item cancelled
    /// (possibly flagged as a confirmed duplicate).
    fn resolve(&self, storage: &dyn StorageProvider, item: ImportItem) -> Result<ImportItem>;

    /// Lazy, restartable sequence of alternative destinations to probe.
    /// Infinite for renaming resolvers; empty where renaming is not offered.
    fn alternatives(&self, item: &ImportItem) -> Box<dyn Iterator<Item = PathBuf>>;
}

/// Cancels immediately; the conflicting file wins.
#[derive(Debug, Default, Clone, Copy)]
pub struct SkipResolver;

impl DuplicateResolver for SkipResolver {
    fn resolve(&self, _storage: &dyn StorageProvider, mut item: ImportItem) -> Result<ImportItem> {
        debug!(destination = %item.destination.display(), "destination taken; skipping item");
        item.cancel();
        Ok(item)
    }

    fn alternatives(&self, _item: &ImportItem) -> Box<dyn Iterator<Item = PathBuf>> {
        Box::new(std::iter::empty())
    }
}

/// Keeps the destination and allows the operation to overwrite it. With
/// `changed_only`, identical content cancels as a duplicate instead; the
/// hash decides, never the caller's luck.
#[derive(Debug, Clone, Copy)]
pub struct OverwriteResolver {
    changed_only: bool,
}

impl OverwriteResolver {
    pub fn always() -> Self {
        Self {
            changed_only: false,
        }
    }

    pub fn changed_only() -> Self {
        Self { changed_only: true }
    }
}

impl DuplicateResolver for OverwriteResolver {
    fn resolve(&self, storage: &dyn StorageProvider, mut item: ImportItem) -> Result<ImportItem> {
        if self.changed_only
            && storage.file_exists(&item.destination)
            && content_digest(storage, &item.source)?
                == content_digest(storage, &item.destination)?
        {
            debug!(destination = %item.destination.display(), "content identical; skipping overwrite");
            item.cancel_as_duplicate();
            return Ok(item);
        }
        item.overwrite = true;
        Ok(item)
    }

    fn alternatives(&self, _item: &ImportItem) -> Box<dyn Iterator<Item = PathBuf>> {
        Box::new(std::iter::empty())
    }
}
