//! Content-hash duplicate resolver.
//!
//! Decorates a fallback resolver with SHA-256 comparison. Identical content
//! cancels the item as a confirmed duplicate; differing content walks the
//! fallback's candidate sequence, hashing each collider, until a free path
//! or a duplicate is found. Data is never lost here: "same content, safe to
//! skip" and "different content, must not overwrite" are kept apart.

use anyhow::Result;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::import::ImportItem;
use crate::storage::StorageProvider;

use super::DuplicateResolver;

/// SHA-256 of a file's content, read through the storage provider.
pub fn content_digest(storage: &dyn StorageProvider, path: &Path) -> Result<[u8; 32]> {
    let bytes = storage.read_bytes(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hasher.finalize().into())
}

/// Content-comparing decorator over a renaming fallback.
pub struct HashResolver {
    fallback: Box<dyn DuplicateResolver>,
}

impl HashResolver {
    pub fn new(fallback: Box<dyn DuplicateResolver>) -> Self {
        Self { fallback }
    }
}

impl DuplicateResolver for HashResolver {
    fn resolve(&self, storage: &dyn StorageProvider, mut item: ImportItem) -> Result<ImportItem> {
        let source_digest = content_digest(storage, &item.source)?;
        if storage.file_exists(&item.destination)
            && content_digest(storage, &item.destination)? == source_digest
        {
            debug!(destination = %item.destination.display(), "confirmed duplicate by content");
            item.cancel_as_duplicate();
            return Ok(item);
        }

        for candidate in self.fallback.alternatives(&item) {
            if !storage.file_exists(&candidate) {
                debug!(
                    from = %item.destination.display(),
                    to = %candidate.display(),
                    "renamed past differing content"
                );
                item.destination = candidate;
                return Ok(item);
            }
            if content_digest(storage, &candidate)? == source_digest {
                debug!(duplicate_of = %candidate.display(), "confirmed duplicate at alternative name");
                item.cancel_as_duplicate();
                return Ok(item);
            }
        }

        // The fallback offers no alternatives (e.g. Skip): cancel rather
        // than overwrite differing content.
        item.cancel();
        Ok(item)
    }

    fn alternatives(&self, item: &ImportItem) -> Box<dyn Iterator<Item = PathBuf>> {
        self.fallback.alternatives(item)
    }
}
