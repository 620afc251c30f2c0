//! Undo/redo integration: a transaction's actions replay back to the exact
//! pre-transaction state, and redo reproduces the post-transaction state.

use std::fs;
use std::path::{Path, PathBuf};

use albumsafe::{
    FsStorage, JournaledStorage, StorageProvider, TransferOptions, UndoOutcome,
};
use chrono::{DateTime, Utc};
use tempfile::tempdir;

fn journaled(root: &Path) -> JournaledStorage {
    JournaledStorage::new(Box::new(FsStorage::open(root).unwrap())).unwrap()
}

fn write_file(path: &PathBuf, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).expect("write file");
    assert!(path.exists(), "write_file helper failed: {}", path.display());
}

fn when(text: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(text).unwrap().with_timezone(&Utc)
}

#[test]
fn undo_reverses_a_move() {
    let album = tempdir().unwrap();
    let mut s = journaled(album.path());
    write_file(&album.path().join("a.jpg"), "payload");

    s.new_transaction("Move", false).unwrap();
    s.move_file(Path::new("a.jpg"), Path::new("2022/b.jpg"), TransferOptions::default())
        .unwrap();
    s.end_transaction().unwrap();
    assert!(!album.path().join("a.jpg").exists());

    let outcome = s.undo().unwrap();
    assert!(matches!(outcome, UndoOutcome::Applied { .. }));
    assert_eq!(fs::read_to_string(album.path().join("a.jpg")).unwrap(), "payload");
    assert!(!album.path().join("2022/b.jpg").exists());
    // Directories created along the way are not journaled; they remain.
    assert!(album.path().join("2022").is_dir());
}

#[test]
fn undo_then_redo_round_trips_an_overwrite() {
    let album = tempdir().unwrap();
    let mut s = journaled(album.path());

    let target = album.path().join("photo.jpg");
    let incoming = album.path().join("incoming/photo.jpg");
    write_file(&target, "old content");
    write_file(&incoming, "new content");

    let t0 = when("2020-05-01T08:00:00Z");
    let t1 = when("2022-02-04T10:37:46Z");
    filetime::set_file_mtime(
        &target,
        filetime::FileTime::from_unix_time(t0.timestamp(), 0),
    )
    .unwrap();

    s.new_transaction("Import", false).unwrap();
    s.copy_file(
        &incoming,
        &target,
        TransferOptions {
            create_dirs: true,
            overwrite: true,
        },
    )
    .unwrap();
    s.set_modified(&target, t1).unwrap();
    s.end_transaction().unwrap();

    assert_eq!(fs::read_to_string(&target).unwrap(), "new content");
    assert_eq!(s.modified(&target).unwrap(), t1);

    // Undo: the displaced original comes back, content and mtime intact.
    s.undo().unwrap();
    assert_eq!(fs::read_to_string(&target).unwrap(), "old content");
    assert_eq!(s.modified(&target).unwrap(), t0);
    assert_eq!(
        fs::read_to_string(&incoming).unwrap(),
        "new content",
        "copy source untouched by undo"
    );

    // Redo: back to the imported state.
    s.redo().unwrap();
    assert_eq!(fs::read_to_string(&target).unwrap(), "new content");
    assert_eq!(s.modified(&target).unwrap(), t1);

    // And the cycle keeps working.
    s.undo().unwrap();
    assert_eq!(fs::read_to_string(&target).unwrap(), "old content");
    assert_eq!(s.modified(&target).unwrap(), t0);
}

#[test]
fn undo_restores_a_deleted_file() {
    let album = tempdir().unwrap();
    let mut s = journaled(album.path());
    write_file(&album.path().join("keep.jpg"), "precious");

    s.new_transaction("Delete", false).unwrap();
    s.delete_file(Path::new("keep.jpg")).unwrap();
    s.end_transaction().unwrap();
    assert!(!album.path().join("keep.jpg").exists());

    s.undo().unwrap();
    assert_eq!(
        fs::read_to_string(album.path().join("keep.jpg")).unwrap(),
        "precious"
    );
}

#[test]
fn actions_undo_in_reverse_order() {
    // A copy followed by a timestamp change on the copy: reverse replay must
    // restore the timestamp before removing the file, which only works when
    // later actions are undone first.
    let album = tempdir().unwrap();
    let mut s = journaled(album.path());
    write_file(&album.path().join("src.jpg"), "bytes");

    s.new_transaction("Import", false).unwrap();
    s.copy_file(Path::new("src.jpg"), Path::new("dst.jpg"), TransferOptions::default())
        .unwrap();
    s.set_modified(Path::new("dst.jpg"), when("2022-02-04T10:37:46Z"))
        .unwrap();
    s.end_transaction().unwrap();

    s.undo().unwrap();
    assert!(!album.path().join("dst.jpg").exists());
    assert!(album.path().join("src.jpg").exists());

    s.redo().unwrap();
    assert!(album.path().join("dst.jpg").exists());
    assert_eq!(
        s.modified(Path::new("dst.jpg")).unwrap(),
        when("2022-02-04T10:37:46Z")
    );
}

#[test]
fn consecutive_transactions_undo_in_lifo_order() {
    let album = tempdir().unwrap();
    let mut s = journaled(album.path());
    write_file(&album.path().join("a.jpg"), "a");

    s.new_transaction("first", false).unwrap();
    s.move_file(Path::new("a.jpg"), Path::new("b.jpg"), TransferOptions::default())
        .unwrap();
    s.end_transaction().unwrap();

    s.new_transaction("second", false).unwrap();
    s.move_file(Path::new("b.jpg"), Path::new("c.jpg"), TransferOptions::default())
        .unwrap();
    s.end_transaction().unwrap();

    let UndoOutcome::Applied { label, .. } = s.undo().unwrap() else {
        panic!("expected an applied undo");
    };
    assert_eq!(label, "second");
    assert!(album.path().join("b.jpg").exists());

    // Redo history blocks fresh work until discarded; then the first
    // transaction is still undoable.
    s.discard_redo().unwrap();
    let UndoOutcome::Applied { label, .. } = s.undo().unwrap() else {
        panic!("expected an applied undo");
    };
    assert_eq!(label, "first");
    assert!(album.path().join("a.jpg").exists());
}

#[test]
fn joined_transactions_undo_as_one_step() {
    let album = tempdir().unwrap();
    let mut s = journaled(album.path());
    write_file(&album.path().join("a.jpg"), "a");
    write_file(&album.path().join("b.jpg"), "b");

    s.new_transaction("Set times", true).unwrap();
    s.move_file(Path::new("a.jpg"), Path::new("a2.jpg"), TransferOptions::default())
        .unwrap();
    s.end_transaction().unwrap();

    s.new_transaction("", true).unwrap();
    s.move_file(Path::new("b.jpg"), Path::new("b2.jpg"), TransferOptions::default())
        .unwrap();
    s.end_transaction().unwrap();

    let UndoOutcome::Applied { actions, .. } = s.undo().unwrap() else {
        panic!("expected an applied undo");
    };
    assert_eq!(actions, 2, "joined records merge into one undo unit");
    assert!(album.path().join("a.jpg").exists());
    assert!(album.path().join("b.jpg").exists());
}

#[test]
fn journal_file_uses_fixed_width_tags() {
    let album = tempdir().unwrap();
    let mut s = journaled(album.path());
    write_file(&album.path().join("a.jpg"), "a");

    s.new_transaction("Move", false).unwrap();
    s.move_file(Path::new("a.jpg"), Path::new("b.jpg"), TransferOptions::default())
        .unwrap();
    s.end_transaction().unwrap();

    let log = fs::read_to_string(album.path().join(".albumsafe/undo.log")).unwrap();
    let mut lines = log.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("Transaction     "), "got {header:?}");
    assert!(lines.next().unwrap().starts_with("Info            Move"));
    assert!(lines.next().unwrap().starts_with("Move            "));
    assert!(lines.next().unwrap().starts_with("To              "));
    assert_eq!(lines.next(), Some(""), "blank line terminates the record");
}
