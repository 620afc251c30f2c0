//! Import planning: items, lists, and the options snapshot.
//!
//! Planning is pure data work: descriptors are combined with a name provider
//! into `ImportItem`s; nothing touches the filesystem until an importer runs
//! the list. Items whose destination the provider declined are carried along
//! as cancelled so the final report still accounts for them.

mod importer;
mod report;

pub use importer::{CopyImporter, DeleteImporter, DeleteMode, Importer, MoveImporter};
pub use report::{ImportReport, ItemOutcome, ItemStatus};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use crate::descriptor::{FileDescriptor, MetadataProvider, NameOutcome, NameProvider};
use crate::resolver::{
    DuplicateResolver, HashResolver, OverwriteResolver, SkipResolver, SuffixResolver,
};

/// One planned operation: a source/destination pairing awaiting execution.
///
/// The destination stays mutable until an importer commits the item; a
/// duplicate resolver may rewrite it or cancel the item outright.
#[derive(Debug, Clone)]
pub struct ImportItem {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub cancelled: bool,
    /// Set only when content comparison confirmed the item duplicates an
    /// existing file.
    pub duplicate: bool,
    /// Explicit permission for the operation to overwrite its destination.
    pub overwrite: bool,
    pub descriptor: FileDescriptor,
}

impl ImportItem {
    pub fn new(source: PathBuf, destination: PathBuf, descriptor: FileDescriptor) -> Self {
        Self {
            source,
            destination,
            cancelled: false,
            duplicate: false,
            overwrite: false,
            descriptor,
        }
    }

    /// Cancelled at planning time (no destination).
    pub fn filtered(source: PathBuf, descriptor: FileDescriptor) -> Self {
        Self {
            source,
            destination: PathBuf::new(),
            cancelled: true,
            duplicate: false,
            overwrite: false,
            descriptor,
        }
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn cancel_as_duplicate(&mut self) {
        self.cancelled = true;
        self.duplicate = true;
    }
}

/// A planned batch of items, in planning order.
#[derive(Debug, Clone, Default)]
pub struct ImportList {
    items: Vec<ImportItem>,
}

impl ImportList {
    /// Combine descriptors with the name provider. `NameOutcome::Skip` marks
    /// the item cancelled; a name without an extension gets the descriptor's.
    pub fn plan(
        descriptors: Vec<FileDescriptor>,
        names: &dyn NameProvider,
        album_root: &Path,
    ) -> Result<Self> {
        let mut items = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            match names.get_name(&descriptor)? {
                NameOutcome::Name(rel) => {
                    let rel = with_descriptor_extension(rel, &descriptor);
                    let destination = album_root.join(rel);
                    items.push(ImportItem::new(
                        descriptor.path.clone(),
                        destination,
                        descriptor,
                    ));
                }
                NameOutcome::Skip => {
                    items.push(ImportItem::filtered(descriptor.path.clone(), descriptor));
                }
            }
        }
        Ok(Self { items })
    }

    /// Walk a source directory and describe every regular file in it.
    /// Files that look in-flight (`.tmp`, `.part`, `.crdownload`) are
    /// skipped, as is anything whose metadata cannot be read: fatal for
    /// that file, not for the scan.
    pub fn scan_source(source: &Path, meta: &dyn MetadataProvider) -> Result<Vec<FileDescriptor>> {
        let mut descriptors = Vec::new();
        for entry in WalkDir::new(source)
            .min_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            if let Some(ext) = path.extension().and_then(|s| s.to_str())
                && matches!(ext.to_ascii_lowercase().as_str(), "tmp" | "part" | "crdownload")
            {
                continue;
            }
            match meta.get_info(path) {
                Ok(descriptor) => descriptors.push(descriptor),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unreadable metadata; file dropped from plan");
                }
            }
        }
        Ok(descriptors)
    }

    pub fn from_items(items: Vec<ImportItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[ImportItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<ImportItem> {
        self.items
    }
}

fn with_descriptor_extension(rel: PathBuf, descriptor: &FileDescriptor) -> PathBuf {
    if rel.extension().is_some() || descriptor.extension.is_empty() {
        rel
    } else {
        rel.with_extension(&descriptor.extension)
    }
}

/// How to treat a planned item whose destination already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Cancel the item without probing for another name.
    #[default]
    Skip,
    /// Probe suffixed names (`a`..`z`, `za`, ...) for a free one.
    Rename,
    /// Replace the destination (the journal keeps the old file).
    Overwrite,
    /// Replace only when the content actually differs.
    OverwriteChanged,
    /// Compare content; identical files cancel as duplicates, different
    /// files get a suffixed name.
    HashRename,
}

impl DuplicatePolicy {
    pub fn resolver(self) -> Box<dyn DuplicateResolver> {
        match self {
            DuplicatePolicy::Skip => Box::new(SkipResolver),
            DuplicatePolicy::Rename => Box::new(SuffixResolver),
            DuplicatePolicy::Overwrite => Box::new(OverwriteResolver::always()),
            DuplicatePolicy::OverwriteChanged => Box::new(OverwriteResolver::changed_only()),
            DuplicatePolicy::HashRename => Box::new(HashResolver::new(Box::new(SuffixResolver))),
        }
    }
}

/// Snapshot of the option values an outer layer (CLI, profile file) decided
/// on. Passed explicitly; the engine holds no ambient configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImportOptions {
    pub on_duplicate: DuplicatePolicy,
    pub delete_mode: DeleteMode,
}
