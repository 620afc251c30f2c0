//! Undo/redo journal provider.
//!
//! `JournaledStorage` wraps another provider and records every mutating call
//! into an append-only undo log. Destructive operations never destroy data:
//! deletes become moves into the trash, and overwrites first displace the
//! existing destination there. Actions are applied to the inner provider
//! before being recorded (record-after-success), so the journal only ever
//! describes operations that actually happened.
//!
//! Undo replays the last committed transaction in reverse, routing each
//! inverse operation back through the journaling machinery with the redo log
//! as the open side; that is what makes redo the mirror image of undo, and
//! keeps every replay reversible in turn.

mod logfile;
mod record;
mod trash;

pub use record::{Action, Transaction};
pub use trash::Trash;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::errors::AlbumError;
use crate::storage::{
    FileAttributes, StorageProvider, TransferOptions, UndoOutcome,
};

use logfile::{LogWriter, read_log, rewrite_log};

/// Directory inside the album holding the journal, the trash and the index.
pub const INTERNAL_DIR: &str = ".albumsafe";

const UNDO_LOG: &str = "undo.log";
const REDO_LOG: &str = "redo.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogSide {
    Undo,
    Redo,
}

struct OpenTx {
    writer: LogWriter,
    side: LogSide,
    label: String,
    actions: usize,
}

/// Storage decorator giving `new_transaction`/`end_transaction`/`undo`/`redo`
/// their meaning.
pub struct JournaledStorage {
    inner: Box<dyn StorageProvider>,
    undo_log: PathBuf,
    redo_log: PathBuf,
    trash: Trash,
    open_tx: Option<OpenTx>,
}

impl JournaledStorage {
    /// Wrap `inner`, keeping journal state under `<root>/.albumsafe/`.
    pub fn new(inner: Box<dyn StorageProvider>) -> Result<Self> {
        let internal = inner.root().join(INTERNAL_DIR);
        fs::create_dir_all(&internal)
            .with_context(|| format!("create journal directory {}", internal.display()))?;
        let trash = Trash::open(&internal.join("trash"))?;
        Ok(Self {
            undo_log: internal.join(UNDO_LOG),
            redo_log: internal.join(REDO_LOG),
            inner,
            trash,
            open_tx: None,
        })
    }

    pub fn trash(&self) -> &Trash {
        &self.trash
    }

    /// All committed transactions in the undo log, oldest first, joinable
    /// records already merged. What `undo` would reverse is the last entry.
    pub fn history(&self) -> Result<Vec<Transaction>> {
        read_log(&self.undo_log)
    }

    fn log_path(&self, side: LogSide) -> &Path {
        match side {
            LogSide::Undo => &self.undo_log,
            LogSide::Redo => &self.redo_log,
        }
    }

    fn open_on(&mut self, side: LogSide, label: &str, join: bool) -> Result<()> {
        if self.open_tx.is_some() {
            bail!(AlbumError::TransactionOpen);
        }
        let tx = Transaction::new(label, join);
        let writer = LogWriter::open(self.log_path(side), &tx)?;
        self.open_tx = Some(OpenTx {
            writer,
            side,
            label: label.to_string(),
            actions: 0,
        });
        Ok(())
    }

    fn require_open(&mut self) -> Result<&mut OpenTx> {
        self.open_tx
            .as_mut()
            .ok_or_else(|| AlbumError::NoTransaction.into())
    }

    fn record(&mut self, action: Action) -> Result<()> {
        let open = self.require_open()?;
        open.writer.action(&action)?;
        open.actions += 1;
        Ok(())
    }

    /// Move an existing destination into the trash, recording the move, so
    /// the following copy/move/write lands on a free path and the old file
    /// survives for undo.
    fn displace(&mut self, dst: &Path) -> Result<()> {
        if !self.inner.file_exists(dst) {
            return Ok(());
        }
        let grave = self.trash.allocate(dst)?;
        self.inner.move_file(
            dst,
            &grave,
            TransferOptions {
                create_dirs: true,
                overwrite: false,
            },
        )?;
        self.record(Action::Move {
            from: dst.to_path_buf(),
            to: grave,
        })
    }

    fn tx_copy(&mut self, src: &Path, dst: &Path, opts: TransferOptions) -> Result<()> {
        self.require_open()?;
        let src = self.inner.absolute(src);
        let dst = self.inner.absolute(dst);
        if opts.overwrite {
            self.displace(&dst)?;
        }
        self.inner.copy_file(
            &src,
            &dst,
            TransferOptions {
                overwrite: false,
                ..opts
            },
        )?;
        self.record(Action::Copy { from: src, to: dst })
    }

    fn tx_move(&mut self, src: &Path, dst: &Path, opts: TransferOptions) -> Result<()> {
        self.require_open()?;
        let src = self.inner.absolute(src);
        let dst = self.inner.absolute(dst);
        if opts.overwrite {
            self.displace(&dst)?;
        }
        self.inner.move_file(
            &src,
            &dst,
            TransferOptions {
                overwrite: false,
                ..opts
            },
        )?;
        self.record(Action::Move { from: src, to: dst })
    }

    fn tx_delete(&mut self, path: &Path) -> Result<()> {
        self.require_open()?;
        let path = self.inner.absolute(path);
        let grave = self.trash.allocate(&path)?;
        self.inner.move_file(
            &path,
            &grave,
            TransferOptions {
                create_dirs: true,
                overwrite: false,
            },
        )?;
        self.record(Action::Move {
            from: path,
            to: grave,
        })
    }

    fn tx_set_created(&mut self, path: &Path, when: DateTime<Utc>) -> Result<()> {
        self.require_open()?;
        let path = self.inner.absolute(path);
        let prev = self.inner.created(&path)?;
        self.inner.set_created(&path, when)?;
        self.record(Action::SetCreated {
            path,
            from: prev,
            to: when,
        })
    }

    fn tx_set_modified(&mut self, path: &Path, when: DateTime<Utc>) -> Result<()> {
        self.require_open()?;
        let path = self.inner.absolute(path);
        let prev = self.inner.modified(&path)?;
        self.inner.set_modified(&path, when)?;
        self.record(Action::SetModified {
            path,
            from: prev,
            to: when,
        })
    }

    /// Replay a transaction's actions in reverse order, each as its own
    /// inverse, through the journaling ops, so the currently open side
    /// records the inverse transaction.
    fn replay_reversed(&mut self, tx: &Transaction) -> Result<()> {
        for action in tx.actions.iter().rev() {
            match action {
                Action::Move { from, to } => self.tx_move(
                    to,
                    from,
                    TransferOptions {
                        create_dirs: true,
                        overwrite: true,
                    },
                )?,
                // The journal created the copy; deleting it routes the file
                // into the trash so redo can bring it back without copying.
                Action::Copy { from: _, to } => self.tx_delete(to)?,
                Action::SetCreated { path, from, .. } => self.tx_set_created(path, *from)?,
                Action::SetModified { path, from, .. } => self.tx_set_modified(path, *from)?,
            }
        }
        Ok(())
    }

    /// Shared body of undo/redo: pop the last transaction of `consume`,
    /// replay it inversed while recording onto the opposite log, then
    /// rewrite the consumed log without the popped entry.
    fn replay_last(&mut self, consume: LogSide, label: &str) -> Result<UndoOutcome> {
        if self.open_tx.is_some() {
            bail!(AlbumError::UndoDuringTransaction);
        }
        let mut transactions = read_log(self.log_path(consume))?;
        let Some(last) = transactions.pop() else {
            return Ok(UndoOutcome::Nothing);
        };

        let record_on = match consume {
            LogSide::Undo => LogSide::Redo,
            LogSide::Redo => LogSide::Undo,
        };
        self.open_on(record_on, label, false)?;
        let replayed = self.replay_reversed(&last);
        let closed = self.end_transaction();
        replayed?;
        closed?;

        rewrite_log(self.log_path(consume), &transactions)?;
        info!(
            op = label,
            reversed = %last.label,
            actions = last.actions.len(),
            "replayed transaction"
        );
        Ok(UndoOutcome::Applied {
            label: last.label,
            actions: last.actions.len(),
        })
    }
}

impl StorageProvider for JournaledStorage {
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
        self.inner.enumerate_files(dir)
    }

    fn enumerate_dirs(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        self.inner.enumerate_dirs(dir)
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        self.inner.read_bytes(path)
    }

    fn write_bytes(&mut self, path: &Path, data: &[u8]) -> Result<()> {
        // Writes are not an action kind in the journal vocabulary; what is
        // journaled is the displacement of the content they would destroy.
        let path = self.inner.absolute(path);
        if self.open_tx.is_some() {
            self.displace(&path)?;
        } else if self.inner.file_exists(&path) {
            bail!(AlbumError::NoTransaction);
        }
        self.inner.write_bytes(&path, data)
    }

    fn read_text(&self, path: &Path) -> Result<String> {
        self.inner.read_text(path)
    }

    fn write_text(&mut self, path: &Path, text: &str) -> Result<()> {
        self.write_bytes(path, text.as_bytes())
    }

    fn created(&self, path: &Path) -> Result<DateTime<Utc>> {
        self.inner.created(path)
    }

    fn modified(&self, path: &Path) -> Result<DateTime<Utc>> {
        self.inner.modified(path)
    }

    fn set_created(&mut self, path: &Path, when: DateTime<Utc>) -> Result<()> {
        self.tx_set_created(path, when)
    }

    fn set_modified(&mut self, path: &Path, when: DateTime<Utc>) -> Result<()> {
        self.tx_set_modified(path, when)
    }

    fn attributes(&self, path: &Path) -> Result<FileAttributes> {
        self.inner.attributes(path)
    }

    fn set_attributes(&mut self, path: &Path, attrs: FileAttributes) -> Result<()> {
        // Attribute changes have no journal action kind and are not undone.
        self.inner.set_attributes(path, attrs)
    }

    fn copy_file(&mut self, src: &Path, dst: &Path, opts: TransferOptions) -> Result<()> {
        self.tx_copy(src, dst, opts)
    }

    fn move_file(&mut self, src: &Path, dst: &Path, opts: TransferOptions) -> Result<()> {
        self.tx_move(src, dst, opts)
    }

    fn delete_file(&mut self, path: &Path) -> Result<()> {
        self.tx_delete(path)
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        self.inner.absolute(path)
    }

    fn relative(&self, path: &Path) -> Result<PathBuf> {
        self.inner.relative(path)
    }

    fn new_transaction(&mut self, label: &str, join: bool) -> Result<()> {
        if self.open_tx.is_some() {
            bail!(AlbumError::TransactionOpen);
        }
        // Starting fresh work would orphan the redo history; the caller must
        // discard it explicitly first.
        if !read_log(&self.redo_log)?.is_empty() {
            bail!(AlbumError::RedoHistory);
        }
        self.open_on(LogSide::Undo, label, join)?;
        info!(label, join, "opened transaction");
        Ok(())
    }

    fn end_transaction(&mut self) -> Result<()> {
        let Some(open) = self.open_tx.take() else {
            bail!(AlbumError::NoTransaction);
        };
        open.writer.finish()?;
        info!(label = %open.label, actions = open.actions, side = ?open.side, "committed transaction");
        Ok(())
    }

    fn undo(&mut self) -> Result<UndoOutcome> {
        self.replay_last(LogSide::Undo, "undo")
    }

    fn redo(&mut self) -> Result<UndoOutcome> {
        self.replay_last(LogSide::Redo, "redo")
    }

    fn discard_redo(&mut self) -> Result<()> {
        if self.open_tx.is_some() {
            bail!(AlbumError::TransactionOpen);
        }
        rewrite_log(&self.redo_log, &[])?;
        info!("discarded redo history");
        Ok(())
    }
}

impl Drop for JournaledStorage {
    fn drop(&mut self) {
        if let Some(open) = &self.open_tx {
            // The record has no terminator, so readers will ignore it.
            warn!(label = %open.label, "transaction dropped without commit");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FsStorage;
    use tempfile::tempdir;

    fn journaled(root: &Path) -> JournaledStorage {
        JournaledStorage::new(Box::new(FsStorage::open(root).unwrap())).unwrap()
    }

    #[test]
    fn mutating_call_without_transaction_is_rejected() {
        let td = tempdir().unwrap();
        let mut s = journaled(td.path());
        fs::write(td.path().join("a.jpg"), b"x").unwrap();

        let err = s
            .copy_file(Path::new("a.jpg"), Path::new("b.jpg"), TransferOptions::default())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AlbumError>(),
            Some(AlbumError::NoTransaction)
        ));
    }

    #[test]
    fn nested_transactions_are_rejected() {
        let td = tempdir().unwrap();
        let mut s = journaled(td.path());
        s.new_transaction("first", false).unwrap();
        let err = s.new_transaction("second", false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AlbumError>(),
            Some(AlbumError::TransactionOpen)
        ));
    }

    #[test]
    fn undo_during_open_transaction_is_rejected() {
        let td = tempdir().unwrap();
        let mut s = journaled(td.path());
        s.new_transaction("work", false).unwrap();
        let err = s.undo().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AlbumError>(),
            Some(AlbumError::UndoDuringTransaction)
        ));
    }

    #[test]
    fn undo_on_empty_log_reports_nothing() {
        let td = tempdir().unwrap();
        let mut s = journaled(td.path());
        assert_eq!(s.undo().unwrap(), UndoOutcome::Nothing);
        assert_eq!(s.redo().unwrap(), UndoOutcome::Nothing);
    }

    #[test]
    fn delete_moves_into_trash() {
        let td = tempdir().unwrap();
        let mut s = journaled(td.path());
        fs::write(td.path().join("a.jpg"), b"keep me").unwrap();

        s.new_transaction("Delete", false).unwrap();
        s.delete_file(Path::new("a.jpg")).unwrap();
        s.end_transaction().unwrap();

        assert!(!td.path().join("a.jpg").exists());
        let (count, bytes) = s.trash().occupancy().unwrap();
        assert_eq!((count, bytes), (1, 7), "content preserved in trash");

        let history = s.history().unwrap();
        assert_eq!(history.len(), 1);
        assert!(matches!(history[0].actions[0], Action::Move { .. }));
    }

    #[test]
    fn new_transaction_blocked_by_redo_history() {
        let td = tempdir().unwrap();
        let mut s = journaled(td.path());
        fs::write(td.path().join("a.jpg"), b"x").unwrap();

        s.new_transaction("Move", false).unwrap();
        s.move_file(Path::new("a.jpg"), Path::new("b.jpg"), TransferOptions::default())
            .unwrap();
        s.end_transaction().unwrap();
        s.undo().unwrap();

        let err = s.new_transaction("next", false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AlbumError>(),
            Some(AlbumError::RedoHistory)
        ));

        s.discard_redo().unwrap();
        s.new_transaction("next", false).unwrap();
        s.end_transaction().unwrap();
    }
}
