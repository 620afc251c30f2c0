//! File descriptors and the two narrow provider boundaries.
//!
//! A `FileDescriptor` is the immutable per-file snapshot the rest of the
//! engine works with. It is produced by a `MetadataProvider` (which may be an
//! expensive EXIF extractor living outside this crate) and mapped to a
//! destination by a `NameProvider`. `FsMetadataProvider` is the baseline
//! implementation built from raw stat data so the engine is usable without an
//! external extractor.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::fs;
use std::path::{Path, PathBuf};

/// Immutable snapshot of one source file.
///
/// `captured` is the embedded capture time (EXIF or similar) when the
/// metadata provider could extract one. `time_shift` and `date_override` are
/// filter-applied corrections: the shift compensates a wrong camera clock,
/// the override replaces the timestamp outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// Original absolute path of the source file.
    pub path: PathBuf,
    /// File name without extension.
    pub name: String,
    /// Extension without the leading dot; empty when the file has none.
    pub extension: String,
    /// Embedded capture timestamp, if the provider found one.
    pub captured: Option<DateTime<Utc>>,
    /// Filesystem creation timestamp (birth time, or mtime fallback).
    pub created: DateTime<Utc>,
    /// Filesystem modification timestamp.
    pub modified: DateTime<Utc>,
    /// Device manufacturer, if known.
    pub manufacturer: Option<String>,
    /// Device model, if known.
    pub model: Option<String>,
    /// Path relative to the album root, once the file lives inside one.
    pub relative_path: Option<PathBuf>,
    /// Clock correction applied on top of the chosen base timestamp.
    pub time_shift: Option<Duration>,
    /// Explicit replacement timestamp; wins over everything else.
    pub date_override: Option<DateTime<Utc>>,
}

impl FileDescriptor {
    /// The timestamp the album should file this item under.
    ///
    /// Order: explicit override, else capture time, else filesystem creation
    /// time; the time shift applies to the two derived bases but not to an
    /// override (overrides are user-stated truth).
    pub fn suitable_timestamp(&self) -> DateTime<Utc> {
        if let Some(over) = self.date_override {
            return over;
        }
        let base = self.captured.unwrap_or(self.created);
        match self.time_shift {
            Some(shift) => base + shift,
            None => base,
        }
    }
}

/// Produces a descriptor for a path. May be expensive (embedded metadata
/// parsing); the indexing layer exists to avoid calling this repeatedly.
/// Errors are fatal for that file and the file is dropped from planning.
pub trait MetadataProvider {
    fn get_info(&self, path: &Path) -> Result<FileDescriptor>;
}

/// Result of asking a name provider for a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameOutcome {
    /// Relative destination inside the album (extension optional).
    Name(PathBuf),
    /// No valid name for this file; skip it without error.
    Skip,
}

/// Maps a descriptor to a relative destination path.
///
/// A malformed template is a setup-time failure
/// (`AlbumError::MalformedTemplate`) raised when the provider is built, not
/// per call.
pub trait NameProvider {
    fn get_name(&self, descriptor: &FileDescriptor) -> Result<NameOutcome>;
}

/// Baseline metadata provider using only filesystem stat data.
/// No embedded metadata: `captured`, `manufacturer` and `model` stay unset.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsMetadataProvider;

impl MetadataProvider for FsMetadataProvider {
    fn get_info(&self, path: &Path) -> Result<FileDescriptor> {
        let meta = fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
        let modified = meta
            .modified()
            .with_context(|| format!("read mtime of {}", path.display()))?;
        // Birth time is unavailable on some filesystems; fall back to mtime.
        let created = meta.created().unwrap_or(modified);

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(FileDescriptor {
            path: path.to_path_buf(),
            name,
            extension,
            captured: None,
            created: DateTime::<Utc>::from(created),
            modified: DateTime::<Utc>::from(modified),
            manufacturer: None,
            model: None,
            relative_path: None,
            time_shift: None,
            date_override: None,
        })
    }
}
