//! Trash holding area for displaced files.
//!
//! Every file the journal would otherwise destroy (overwritten or deleted)
//! is moved here under a random 8-hex-digit name that preserves the original
//! extension, so the Move recorded in the journal can be reversed exactly.
//! The core never purges the trash; `purge` is the explicit user action.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct Trash {
    dir: PathBuf,
}

impl Trash {
    /// Open (and create if needed) the trash directory.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("create trash directory {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reserve a grave path for `original`: 8 random hex digits plus the
    /// original extension, retried with a new name on collision.
    pub fn allocate(&self, original: &Path) -> Result<PathBuf> {
        let ext = original.extension().map(|e| e.to_string_lossy().into_owned());
        loop {
            let mut name = format!("{:08x}", rand::random::<u32>());
            if let Some(ref ext) = ext {
                name.push('.');
                name.push_str(ext);
            }
            let grave = self.dir.join(name);
            if !grave.exists() {
                debug!(original = %original.display(), grave = %grave.display(), "allocated trash slot");
                return Ok(grave);
            }
        }
    }

    /// Number of held files and their total size in bytes.
    pub fn occupancy(&self) -> Result<(usize, u64)> {
        let mut count = 0usize;
        let mut bytes = 0u64;
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("read trash directory {}", self.dir.display()))?
        {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                count += 1;
                bytes += entry.metadata()?.len();
            }
        }
        Ok((count, bytes))
    }

    /// Permanently delete every held file. Explicit user action only: after
    /// a purge, committed transactions that reference the trash can no
    /// longer be undone.
    pub fn purge(&self) -> Result<usize> {
        let (count, bytes) = self.occupancy()?;
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("read trash directory {}", self.dir.display()))?
        {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                fs::remove_file(entry.path())
                    .with_context(|| format!("purge {}", entry.path().display()))?;
            }
        }
        info!(count, bytes, "purged trash");
        Ok(count)
    }
}
