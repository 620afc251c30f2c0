//! Suffix-renaming resolver.
//!
//! Alternative names append a single letter before the extension: `X.jpg`
//! probes `Xa.jpg` .. `Xz.jpg`; exhausting the alphabet recurses with `z` as
//! the new base, producing `Xza.jpg`, `Xzb.jpg`, ... The sequence is
//! deterministic, infinite, and restartable, so callers always get the
//! lexicographically-first free name.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::import::ImportItem;
use crate::storage::StorageProvider;

use super::DuplicateResolver;

/// Picks the first free suffixed name for a conflicting destination.
#[derive(Debug, Default, Clone, Copy)]
pub struct SuffixResolver;

impl DuplicateResolver for SuffixResolver {
    fn resolve(&self, storage: &dyn StorageProvider, mut item: ImportItem) -> Result<ImportItem> {
        for candidate in self.alternatives(&item) {
            if !storage.file_exists(&candidate) {
                debug!(
                    from = %item.destination.display(),
                    to = %candidate.display(),
                    "renamed conflicting destination"
                );
                item.destination = candidate;
                return Ok(item);
            }
        }
        unreachable!("suffix sequence is infinite")
    }

    fn alternatives(&self, item: &ImportItem) -> Box<dyn Iterator<Item = PathBuf>> {
        Box::new(SuffixSequence::for_path(&item.destination))
    }
}

/// The lazy candidate sequence itself: `<stem><"z"*n><letter>[.ext]`.
#[derive(Debug, Clone)]
pub struct SuffixSequence {
    parent: PathBuf,
    stem: String,
    extension: Option<String>,
    zs: usize,
    next: u8,
}

impl SuffixSequence {
    pub fn for_path(path: &Path) -> Self {
        Self {
            parent: path.parent().map(PathBuf::from).unwrap_or_default(),
            stem: path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            extension: path.extension().map(|e| e.to_string_lossy().into_owned()),
            zs: 0,
            next: b'a',
        }
    }
}

impl Iterator for SuffixSequence {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        if self.next > b'z' {
            self.zs += 1;
            self.next = b'a';
        }
        let letter = self.next as char;
        self.next += 1;

        let mut name = String::with_capacity(self.stem.len() + self.zs + 8);
        name.push_str(&self.stem);
        for _ in 0..self.zs {
            name.push('z');
        }
        name.push(letter);
        if let Some(ext) = &self.extension {
            name.push('.');
            name.push_str(ext);
        }
        Some(self.parent.join(name))
    }
}
