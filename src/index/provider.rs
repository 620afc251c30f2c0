//! Indexing storage decorator.
//!
//! Wraps another provider and keeps the metadata index consistent with it as
//! a side effect of every mutating call. Directory listings and timestamp
//! reads are answered from the index when it has the answer, trading a small
//! staleness risk for skipping repeated expensive metadata extraction.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use crate::descriptor::MetadataProvider;
use crate::journal::INTERNAL_DIR;
use crate::storage::{
    FileAttributes, StorageProvider, TransferOptions, UndoOutcome,
};

use super::{Index, format};

const INDEX_FILE: &str = "index.txt";

/// Storage decorator maintaining the metadata index.
pub struct IndexedStorage {
    inner: Box<dyn StorageProvider>,
    meta: Box<dyn MetadataProvider>,
    index: Index,
    index_file: PathBuf,
}

impl IndexedStorage {
    /// Wrap `inner`, loading `<root>/.albumsafe/index.txt` or starting empty
    /// when the file is absent, unreadable, or `force_rebuild` is set. The
    /// index file exists on disk once this returns.
    pub fn open(
        inner: Box<dyn StorageProvider>,
        meta: Box<dyn MetadataProvider>,
        force_rebuild: bool,
    ) -> Result<Self> {
        let internal = inner.root().join(INTERNAL_DIR);
        fs::create_dir_all(&internal)
            .with_context(|| format!("create index directory {}", internal.display()))?;
        let index_file = internal.join(INDEX_FILE);

        let index = if !force_rebuild && index_file.is_file() {
            match fs::read_to_string(&index_file)
                .map_err(anyhow::Error::from)
                .and_then(|text| format::parse(&text))
            {
                Ok(index) => {
                    debug!(entries = index.len(), "loaded metadata index");
                    index
                }
                Err(e) => {
                    warn!(error = %e, file = %index_file.display(), "unreadable index; starting empty");
                    Index::new(inner.root())
                }
            }
        } else {
            Index::new(inner.root())
        };

        let storage = Self {
            inner,
            meta,
            index,
            index_file,
        };
        storage.write_index_file()?;
        Ok(storage)
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Flush the whole tree to the index file.
    pub fn write_index_file(&self) -> Result<()> {
        fs::write(&self.index_file, format::serialize(&self.index))
            .with_context(|| format!("write index file {}", self.index_file.display()))
    }

    /// Re-cache one path: drop it if the file is gone, otherwise re-query
    /// the metadata provider and overwrite the entry.
    pub fn update_file(&mut self, path: &Path) -> Result<()> {
        let abs = self.inner.absolute(path);
        let Ok(rel) = self.inner.relative(&abs) else {
            // Outside the album (e.g. an import source); nothing to cache.
            return Ok(());
        };
        if is_internal(&rel) {
            return Ok(());
        }
        if !self.inner.file_exists(&abs) {
            if self.index.remove(&rel) {
                debug!(path = %rel.display(), "dropped vanished file from index");
            }
            return Ok(());
        }
        let mut descriptor = self.meta.get_info(&abs)?;
        descriptor.relative_path = Some(rel.clone());
        self.index.insert(&rel, descriptor);
        Ok(())
    }

    /// Drop everything and re-index the album by walking the inner provider.
    pub fn rebuild(&mut self) -> Result<()> {
        self.index.clear();
        let mut pending = vec![self.inner.root().to_path_buf()];
        while let Some(dir) = pending.pop() {
            for file in self.inner.enumerate_files(&dir)? {
                self.update_file(&file)?;
            }
            pending.extend(self.inner.enumerate_dirs(&dir)?);
        }
        self.write_index_file()?;
        debug!(entries = self.index.len(), "rebuilt metadata index");
        Ok(())
    }

    fn cached_relative(&self, path: &Path) -> Option<PathBuf> {
        self.inner.relative(&self.inner.absolute(path)).ok()
    }
}

fn is_internal(rel: &Path) -> bool {
    matches!(
        rel.components().next(),
        Some(Component::Normal(first)) if first.to_string_lossy().starts_with('.')
    )
}

impl StorageProvider for IndexedStorage {
    fn root(&self) -> &Path {
        self.inner.root()
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.inner.file_exists(path)
    }

    fn dir_exists(&self, path: &Path) -> bool {
        self.inner.dir_exists(path)
    }

    fn enumerate_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        if let Some(rel) = self.cached_relative(dir)
            && let Some(names) = self.index.files_in(&rel)
        {
            let base = self.inner.absolute(dir);
            return Ok(names.into_iter().map(|n| base.join(n)).collect());
        }
        self.inner.enumerate_files(dir)
    }

    fn enumerate_dirs(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        if let Some(rel) = self.cached_relative(dir)
            && let Some(names) = self.index.dirs_in(&rel)
        {
            let base = self.inner.absolute(dir);
            return Ok(names.into_iter().map(|n| base.join(n)).collect());
        }
        self.inner.enumerate_dirs(dir)
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        self.inner.read_bytes(path)
    }

    fn write_bytes(&mut self, path: &Path, data: &[u8]) -> Result<()> {
        self.inner.write_bytes(path, data)?;
        self.update_file(path)
    }

    fn read_text(&self, path: &Path) -> Result<String> {
        self.inner.read_text(path)
    }

    fn write_text(&mut self, path: &Path, text: &str) -> Result<()> {
        self.inner.write_text(path, text)?;
        self.update_file(path)
    }

    /// Creation reads resolve through the cached descriptor where possible,
    /// reflecting any extractor-derived corrections (capture time, shifts).
    fn created(&self, path: &Path) -> Result<DateTime<Utc>> {
        if let Some(rel) = self.cached_relative(path)
            && let Some(desc) = self.index.descriptor(&rel)
        {
            return Ok(desc.suitable_timestamp());
        }
        self.inner.created(path)
    }

    fn modified(&self, path: &Path) -> Result<DateTime<Utc>> {
        if let Some(rel) = self.cached_relative(path)
            && let Some(desc) = self.index.descriptor(&rel)
        {
            return Ok(desc.modified);
        }
        self.inner.modified(path)
    }

    fn set_created(&mut self, path: &Path, when: DateTime<Utc>) -> Result<()> {
        self.inner.set_created(path, when)?;
        self.update_file(path)
    }

    fn set_modified(&mut self, path: &Path, when: DateTime<Utc>) -> Result<()> {
        self.inner.set_modified(path, when)?;
        self.update_file(path)
    }

    fn attributes(&self, path: &Path) -> Result<FileAttributes> {
        self.inner.attributes(path)
    }

    fn set_attributes(&mut self, path: &Path, attrs: FileAttributes) -> Result<()> {
        self.inner.set_attributes(path, attrs)
    }

    fn copy_file(&mut self, src: &Path, dst: &Path, opts: TransferOptions) -> Result<()> {
        self.inner.copy_file(src, dst, opts)?;
        self.update_file(dst)
    }

    fn move_file(&mut self, src: &Path, dst: &Path, opts: TransferOptions) -> Result<()> {
        self.inner.move_file(src, dst, opts)?;
        self.update_file(src)?;
        self.update_file(dst)
    }

    fn delete_file(&mut self, path: &Path) -> Result<()> {
        self.inner.delete_file(path)?;
        self.update_file(path)
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        self.inner.absolute(path)
    }

    fn relative(&self, path: &Path) -> Result<PathBuf> {
        self.inner.relative(path)
    }

    fn new_transaction(&mut self, label: &str, join: bool) -> Result<()> {
        self.inner.new_transaction(label, join)
    }

    fn end_transaction(&mut self) -> Result<()> {
        self.inner.end_transaction()?;
        self.write_index_file()
    }

    /// Replayed paths are invisible to this layer, so the cache is cleared
    /// rather than left stale.
    fn undo(&mut self) -> Result<UndoOutcome> {
        let outcome = self.inner.undo()?;
        if matches!(outcome, UndoOutcome::Applied { .. }) {
            self.index.clear();
            self.write_index_file()?;
        }
        Ok(outcome)
    }

    fn redo(&mut self) -> Result<UndoOutcome> {
        let outcome = self.inner.redo()?;
        if matches!(outcome, UndoOutcome::Applied { .. }) {
            self.index.clear();
            self.write_index_file()?;
        }
        Ok(outcome)
    }

    fn discard_redo(&mut self) -> Result<()> {
        self.inner.discard_redo()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::FsMetadataProvider;
    use crate::storage::FsStorage;
    use tempfile::tempdir;

    fn indexed(root: &Path) -> IndexedStorage {
        IndexedStorage::open(
            Box::new(FsStorage::open(root).unwrap()),
            Box::new(FsMetadataProvider),
            false,
        )
        .unwrap()
    }

    #[test]
    fn open_writes_index_file_immediately() {
        let td = tempdir().unwrap();
        let s = indexed(td.path());
        let file = td.path().join(INTERNAL_DIR).join(INDEX_FILE);
        assert!(file.exists());
        assert!(s.index().is_empty());
    }

    #[test]
    fn mutations_keep_index_current() {
        let td = tempdir().unwrap();
        fs::write(td.path().join("a.jpg"), b"bytes").unwrap();
        let mut s = indexed(td.path());

        s.copy_file(Path::new("a.jpg"), Path::new("2022/a.jpg"), TransferOptions::default())
            .unwrap();
        assert!(s.index().descriptor(Path::new("2022/a.jpg")).is_some());

        s.move_file(
            Path::new("2022/a.jpg"),
            Path::new("2022/b.jpg"),
            TransferOptions::default(),
        )
        .unwrap();
        assert!(s.index().descriptor(Path::new("2022/a.jpg")).is_none());
        assert!(s.index().descriptor(Path::new("2022/b.jpg")).is_some());

        s.delete_file(Path::new("2022/b.jpg")).unwrap();
        assert!(s.index().descriptor(Path::new("2022/b.jpg")).is_none());
    }

    #[test]
    fn update_file_removes_vanished_entries() {
        let td = tempdir().unwrap();
        fs::write(td.path().join("a.jpg"), b"bytes").unwrap();
        let mut s = indexed(td.path());
        s.update_file(Path::new("a.jpg")).unwrap();
        assert_eq!(s.index().len(), 1);

        fs::remove_file(td.path().join("a.jpg")).unwrap();
        s.update_file(Path::new("a.jpg")).unwrap();
        assert!(s.index().is_empty());
    }

    #[test]
    fn cached_directory_listing_wins_over_filesystem() {
        let td = tempdir().unwrap();
        fs::write(td.path().join("a.jpg"), b"bytes").unwrap();
        let mut s = indexed(td.path());
        s.update_file(Path::new("a.jpg")).unwrap();

        // A file that appeared behind the cache's back is not listed: the
        // cache answers for directories it knows.
        fs::write(td.path().join("b.jpg"), b"later").unwrap();
        let files = s.enumerate_files(td.path()).unwrap();
        assert_eq!(files, vec![td.path().join("a.jpg")]);
    }

    #[test]
    fn rebuild_walks_the_album() {
        let td = tempdir().unwrap();
        fs::create_dir_all(td.path().join("2022/02")).unwrap();
        fs::write(td.path().join("2022/02/a.jpg"), b"one").unwrap();
        fs::write(td.path().join("top.jpg"), b"two").unwrap();
        let mut s = indexed(td.path());

        s.rebuild().unwrap();
        assert_eq!(s.index().len(), 2);
        assert!(s.index().descriptor(Path::new("2022/02/a.jpg")).is_some());
    }

    #[test]
    fn internal_files_stay_out_of_the_index() {
        let td = tempdir().unwrap();
        let mut s = indexed(td.path());
        s.update_file(&td.path().join(INTERNAL_DIR).join(INDEX_FILE))
            .unwrap();
        assert!(s.index().is_empty());
    }
}
