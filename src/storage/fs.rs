//! Base filesystem provider.
//! Operates directly on the real filesystem, rooted at the album directory.
//! Copies are durable (temp file + atomic rename); moves try an atomic rename
//! and fall back to copy+remove across filesystems. Transaction calls are
//! no-ops here; undo/redo are unsupported. Only decorators give them meaning.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use filetime::FileTime;
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::errors::AlbumError;

use super::platform;
use super::{FileAttributes, StorageProvider, TransferOptions, UndoOutcome};

/// Storage provider backed by the real filesystem.
#[derive(Debug)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Anchor a provider at `root`, which must be an existing directory.
    pub fn open(root: &Path) -> Result<Self> {
        let root = dunce::canonicalize(root).map_err(|_| AlbumError::RootInvalid(root.into()))?;
        if !root.is_dir() {
            bail!(AlbumError::RootInvalid(root));
        }
        Ok(Self { root })
    }

    /// Copy src into a unique temp sibling of dst, then rename into place.
    /// The temp file is fsynced before the rename so a crash never leaves a
    /// half-written destination under the final name.
    fn copy_durable(&self, src: &Path, dst: &Path) -> Result<()> {
        let dst_dir = dst
            .parent()
            .ok_or_else(|| anyhow::anyhow!("destination has no parent: {}", dst.display()))?;
        let tmp = tmp_sibling_name(dst);

        let result = (|| -> io::Result<u64> {
            let mut reader = BufReader::new(fs::File::open(src)?);
            let out = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&tmp)?;
            let mut writer = BufWriter::new(out);
            let bytes = io::copy(&mut reader, &mut writer)?;
            writer.into_inner()?.sync_all()?;
            Ok(bytes)
        })();

        match result {
            Ok(bytes) => {
                fs::rename(&tmp, dst).map_err(|e| {
                    let _ = fs::remove_file(&tmp);
                    anyhow::Error::from(e).context(format!(
                        "rename temporary file '{}' -> '{}'",
                        tmp.display(),
                        dst.display()
                    ))
                })?;
                let _ = platform::fsync_dir(dst_dir);
                debug!(src = %src.display(), dst = %dst.display(), bytes, "copied file");
                Ok(())
            }
            Err(e) => {
                let _ = fs::remove_file(&tmp);
                Err(e).with_context(|| {
                    format!("copy '{}' -> '{}'", src.display(), tmp.display())
                })
            }
        }
    }

    fn prepare_destination(&self, dst: &Path, opts: TransferOptions) -> Result<()> {
        if dst.exists() && !opts.overwrite {
            bail!(AlbumError::DestinationExists(dst.to_path_buf()));
        }
        if opts.create_dirs
            && let Some(parent) = dst.parent()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("create destination directory {}", parent.display()))?;
        }
        Ok(())
    }
}

impl StorageProvider for FsStorage {
    fn root(&self) -> &Path {
        &self.root
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.absolute(path).is_file()
    }

    fn dir_exists(&self, path: &Path) -> bool {
        self.absolute(path).is_dir()
    }

    fn enumerate_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        enumerate(&self.absolute(dir), |t| t.is_file())
    }

    fn enumerate_dirs(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        enumerate(&self.absolute(dir), |t| t.is_dir())
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        let path = self.absolute(path);
        fs::read(&path).with_context(|| format!("read {}", path.display()))
    }

    fn write_bytes(&mut self, path: &Path, data: &[u8]) -> Result<()> {
        let path = self.absolute(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(&path, data).with_context(|| format!("write {}", path.display()))
    }

    fn read_text(&self, path: &Path) -> Result<String> {
        let path = self.absolute(path);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }

    fn write_text(&mut self, path: &Path, text: &str) -> Result<()> {
        self.write_bytes(path, text.as_bytes())
    }

    fn created(&self, path: &Path) -> Result<DateTime<Utc>> {
        let path = self.absolute(path);
        let meta = fs::metadata(&path).with_context(|| format!("stat {}", path.display()))?;
        // Birth time is unavailable on some filesystems; fall back to mtime.
        let when = meta.created().or_else(|_| meta.modified())?;
        Ok(when.into())
    }

    fn modified(&self, path: &Path) -> Result<DateTime<Utc>> {
        let path = self.absolute(path);
        let meta = fs::metadata(&path).with_context(|| format!("stat {}", path.display()))?;
        Ok(meta.modified()?.into())
    }

    fn set_created(&mut self, path: &Path, when: DateTime<Utc>) -> Result<()> {
        let path = self.absolute(path);
        platform::set_file_created(&path, when)
            .with_context(|| format!("set creation time of {}", path.display()))
    }

    fn set_modified(&mut self, path: &Path, when: DateTime<Utc>) -> Result<()> {
        let path = self.absolute(path);
        let ft = FileTime::from_unix_time(when.timestamp(), when.timestamp_subsec_nanos());
        filetime::set_file_mtime(&path, ft)
            .with_context(|| format!("set modification time of {}", path.display()))
    }

    fn attributes(&self, path: &Path) -> Result<FileAttributes> {
        let path = self.absolute(path);
        let meta = fs::metadata(&path).with_context(|| format!("stat {}", path.display()))?;
        #[cfg(unix)]
        let unix_mode = {
            use std::os::unix::fs::PermissionsExt;
            Some(meta.permissions().mode() & 0o777)
        };
        #[cfg(not(unix))]
        let unix_mode = None;
        Ok(FileAttributes {
            readonly: meta.permissions().readonly(),
            unix_mode,
        })
    }

    fn set_attributes(&mut self, path: &Path, attrs: FileAttributes) -> Result<()> {
        let path = self.absolute(path);
        #[cfg(unix)]
        if let Some(mode) = attrs.unix_mode {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(mode))
                .with_context(|| format!("set permissions on {}", path.display()))?;
            return Ok(());
        }
        let meta = fs::metadata(&path).with_context(|| format!("stat {}", path.display()))?;
        let mut perms = meta.permissions();
        perms.set_readonly(attrs.readonly);
        fs::set_permissions(&path, perms)
            .with_context(|| format!("set readonly attribute on {}", path.display()))?;
        Ok(())
    }

    fn copy_file(&mut self, src: &Path, dst: &Path, opts: TransferOptions) -> Result<()> {
        let src = self.absolute(src);
        let dst = self.absolute(dst);
        self.prepare_destination(&dst, opts)?;
        self.copy_durable(&src, &dst)?;
        info!(src = %src.display(), dst = %dst.display(), "copied file");
        Ok(())
    }

    fn move_file(&mut self, src: &Path, dst: &Path, opts: TransferOptions) -> Result<()> {
        let src = self.absolute(src);
        let dst = self.absolute(dst);
        self.prepare_destination(&dst, opts)?;

        // Windows rename does not overwrite; clear the way first.
        #[cfg(windows)]
        if opts.overwrite && dst.exists() {
            fs::remove_file(&dst).with_context(|| {
                format!("remove existing destination before rename: {}", dst.display())
            })?;
        }

        match fs::rename(&src, &dst) {
            Ok(()) => {
                if let Some(parent) = dst.parent() {
                    let _ = platform::fsync_dir(parent);
                }
                info!(src = %src.display(), dst = %dst.display(), "renamed file atomically");
                Ok(())
            }
            Err(e) => {
                #[cfg(unix)]
                let hint: &str = match e.raw_os_error() {
                    Some(code) if code == libc::EXDEV => "cross-filesystem; will copy instead",
                    Some(code) if code == libc::EACCES || code == libc::EPERM => {
                        "permission denied; check destination perms"
                    }
                    _ => "falling back to copy",
                };
                #[cfg(not(unix))]
                let hint: &str = match e.kind() {
                    io::ErrorKind::PermissionDenied => "permission denied; check destination perms",
                    _ => "falling back to copy",
                };
                warn!(error = %e, hint, "atomic rename failed, using copy+remove");

                self.copy_durable(&src, &dst)?;
                fs::remove_file(&src)
                    .with_context(|| format!("remove original file {}", src.display()))?;
                info!(src = %src.display(), dst = %dst.display(), "moved file via copy+remove");
                Ok(())
            }
        }
    }

    fn delete_file(&mut self, path: &Path) -> Result<()> {
        let path = self.absolute(path);
        fs::remove_file(&path).with_context(|| format!("delete {}", path.display()))?;
        info!(path = %path.display(), "deleted file");
        Ok(())
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn relative(&self, path: &Path) -> Result<PathBuf> {
        let abs = self.absolute(path);
        abs.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .map_err(|_| AlbumError::OutsideAlbum(abs.clone()).into())
    }

    fn new_transaction(&mut self, label: &str, join: bool) -> Result<()> {
        debug!(label, join, "transaction boundaries are a no-op without a journal");
        Ok(())
    }

    fn end_transaction(&mut self) -> Result<()> {
        Ok(())
    }

    fn undo(&mut self) -> Result<UndoOutcome> {
        bail!(AlbumError::UndoUnsupported)
    }

    fn redo(&mut self) -> Result<UndoOutcome> {
        bail!(AlbumError::UndoUnsupported)
    }

    fn discard_redo(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Direct children of `dir` matching `keep`, absolute, sorted by name.
/// Dot-entries are internal bookkeeping (journal, trash, index) and are
/// never part of an album listing.
fn enumerate(dir: &Path, keep: impl Fn(&fs::FileType) -> bool) -> Result<Vec<PathBuf>> {
    let rd = fs::read_dir(dir).with_context(|| format!("read directory {}", dir.display()))?;
    let mut out = Vec::new();
    for entry in rd {
        let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let ty = entry.file_type()?;
        if keep(&ty) {
            out.push(entry.path());
        }
    }
    out.sort();
    Ok(out)
}

/// Unique temp sibling for atomic write/rename.
fn tmp_sibling_name(target: &Path) -> PathBuf {
    let pid = std::process::id();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    target.with_file_name(format!(".albumsafe.{pid}.{nanos}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn storage(root: &Path) -> FsStorage {
        FsStorage::open(root).unwrap()
    }

    #[test]
    fn open_rejects_missing_root() {
        let td = tempdir().unwrap();
        let missing = td.path().join("nope");
        let err = FsStorage::open(&missing).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AlbumError>(),
            Some(AlbumError::RootInvalid(_))
        ));
    }

    #[test]
    fn copy_refuses_existing_destination_without_overwrite() {
        let td = tempdir().unwrap();
        let mut s = storage(td.path());
        fs::write(td.path().join("a.jpg"), b"one").unwrap();
        fs::write(td.path().join("b.jpg"), b"two").unwrap();

        let err = s
            .copy_file(Path::new("a.jpg"), Path::new("b.jpg"), TransferOptions::default())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AlbumError>(),
            Some(AlbumError::DestinationExists(_))
        ));
        assert_eq!(fs::read(td.path().join("b.jpg")).unwrap(), b"two");
    }

    #[test]
    fn copy_creates_destination_directories() {
        let td = tempdir().unwrap();
        let mut s = storage(td.path());
        fs::write(td.path().join("a.jpg"), b"bytes").unwrap();

        s.copy_file(
            Path::new("a.jpg"),
            Path::new("2022/02/a.jpg"),
            TransferOptions::default(),
        )
        .unwrap();
        assert_eq!(fs::read(td.path().join("2022/02/a.jpg")).unwrap(), b"bytes");
        assert!(td.path().join("a.jpg").exists(), "copy keeps the source");
    }

    #[test]
    fn move_removes_source() {
        let td = tempdir().unwrap();
        let mut s = storage(td.path());
        fs::write(td.path().join("a.jpg"), b"bytes").unwrap();

        s.move_file(Path::new("a.jpg"), Path::new("b.jpg"), TransferOptions::default())
            .unwrap();
        assert!(!td.path().join("a.jpg").exists());
        assert_eq!(fs::read(td.path().join("b.jpg")).unwrap(), b"bytes");
    }

    #[test]
    fn enumerate_skips_dot_entries() {
        let td = tempdir().unwrap();
        let s = storage(td.path());
        fs::write(td.path().join("a.jpg"), b"x").unwrap();
        fs::write(td.path().join(".hidden"), b"x").unwrap();
        fs::create_dir(td.path().join(".albumsafe")).unwrap();
        fs::create_dir(td.path().join("sub")).unwrap();

        let files = s.enumerate_files(td.path()).unwrap();
        assert_eq!(files, vec![td.path().join("a.jpg")]);
        let dirs = s.enumerate_dirs(td.path()).unwrap();
        assert_eq!(dirs, vec![td.path().join("sub")]);
    }

    #[test]
    fn relative_rejects_outside_paths() {
        let td = tempdir().unwrap();
        let s = storage(td.path());
        assert_eq!(
            s.relative(&td.path().join("x/y.jpg")).unwrap(),
            PathBuf::from("x/y.jpg")
        );
        let err = s.relative(Path::new("/somewhere/else.jpg")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AlbumError>(),
            Some(AlbumError::OutsideAlbum(_))
        ));
    }

    #[test]
    fn set_modified_round_trips() {
        let td = tempdir().unwrap();
        let mut s = storage(td.path());
        fs::write(td.path().join("a.jpg"), b"x").unwrap();

        let when = DateTime::parse_from_rfc3339("2022-02-04T10:37:46Z")
            .unwrap()
            .with_timezone(&Utc);
        s.set_modified(Path::new("a.jpg"), when).unwrap();
        assert_eq!(s.modified(Path::new("a.jpg")).unwrap(), when);
    }

    #[test]
    fn attributes_round_trip() {
        let td = tempdir().unwrap();
        let mut s = storage(td.path());
        fs::write(td.path().join("a.jpg"), b"x").unwrap();

        let mut attrs = s.attributes(Path::new("a.jpg")).unwrap();
        assert!(!attrs.readonly);

        #[cfg(unix)]
        {
            attrs.unix_mode = Some(0o444);
            attrs.readonly = true;
        }
        #[cfg(not(unix))]
        {
            attrs.readonly = true;
        }
        s.set_attributes(Path::new("a.jpg"), attrs).unwrap();
        let read_back = s.attributes(Path::new("a.jpg")).unwrap();
        assert!(read_back.readonly);
        #[cfg(unix)]
        assert_eq!(read_back.unix_mode, Some(0o444));

        // Restore so the tempdir can be cleaned up.
        #[cfg(unix)]
        s.set_attributes(
            Path::new("a.jpg"),
            FileAttributes {
                readonly: false,
                unix_mode: Some(0o644),
            },
        )
        .unwrap();
    }

    #[test]
    fn undo_is_unsupported_without_a_journal() {
        let td = tempdir().unwrap();
        let mut s = storage(td.path());
        let err = s.undo().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AlbumError>(),
            Some(AlbumError::UndoUnsupported)
        ));
    }
}
