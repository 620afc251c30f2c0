//! Index persistence across provider lifetimes.

use std::fs;
use std::path::Path;

use albumsafe::{FsMetadataProvider, StorageProvider, open_album};
use tempfile::tempdir;

#[test]
fn index_survives_reopen() {
    let album = tempdir().unwrap();
    fs::create_dir_all(album.path().join("2022/02")).unwrap();
    fs::write(album.path().join("2022/02/a.jpg"), b"one").unwrap();
    fs::write(album.path().join("top.jpg"), b"two").unwrap();

    {
        let mut storage = open_album(album.path(), Box::new(FsMetadataProvider), false).unwrap();
        storage.rebuild().unwrap();
        assert_eq!(storage.index().len(), 2);
    }

    // A fresh provider loads the persisted tree instead of re-extracting.
    let storage = open_album(album.path(), Box::new(FsMetadataProvider), false).unwrap();
    assert_eq!(storage.index().len(), 2);
    let cached = storage
        .index()
        .descriptor(Path::new("2022/02/a.jpg"))
        .expect("descriptor reloaded from disk");
    assert_eq!(cached.name, "a");
    assert_eq!(cached.extension, "jpg");
}

#[test]
fn update_file_on_a_deleted_path_removes_it_from_a_reloaded_index() {
    let album = tempdir().unwrap();
    fs::write(album.path().join("gone.jpg"), b"x").unwrap();

    {
        let mut storage = open_album(album.path(), Box::new(FsMetadataProvider), false).unwrap();
        storage.rebuild().unwrap();
        assert_eq!(storage.index().len(), 1);

        fs::remove_file(album.path().join("gone.jpg")).unwrap();
        storage.update_file(Path::new("gone.jpg")).unwrap();
        storage.write_index_file().unwrap();
    }

    let storage = open_album(album.path(), Box::new(FsMetadataProvider), false).unwrap();
    assert!(storage.index().descriptor(Path::new("gone.jpg")).is_none());
    assert!(storage.index().is_empty());
}

#[test]
fn force_rebuild_starts_empty_and_writes_the_file() {
    let album = tempdir().unwrap();
    fs::write(album.path().join("a.jpg"), b"x").unwrap();

    {
        let mut storage = open_album(album.path(), Box::new(FsMetadataProvider), false).unwrap();
        storage.rebuild().unwrap();
        assert_eq!(storage.index().len(), 1);
    }

    let storage = open_album(album.path(), Box::new(FsMetadataProvider), true).unwrap();
    assert!(storage.index().is_empty(), "forced open discards the cache");

    let index_file = album.path().join(".albumsafe/index.txt");
    let text = fs::read_to_string(&index_file).unwrap();
    assert_eq!(
        text.lines().next().unwrap(),
        dunce::canonicalize(album.path()).unwrap().display().to_string(),
        "root line always present"
    );
}

#[test]
fn cached_listing_answers_for_known_directories() {
    let album = tempdir().unwrap();
    fs::write(album.path().join("a.jpg"), b"x").unwrap();

    let mut storage = open_album(album.path(), Box::new(FsMetadataProvider), false).unwrap();
    storage.rebuild().unwrap();

    // A file created behind the provider's back is invisible to a cached
    // listing until the cache is refreshed.
    fs::write(album.path().join("b.jpg"), b"late").unwrap();
    let listed = storage.enumerate_files(album.path()).unwrap();
    let names: Vec<_> = listed
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    assert_eq!(names, vec!["a.jpg"]);

    storage.rebuild().unwrap();
    assert_eq!(storage.enumerate_files(album.path()).unwrap().len(), 2);
}
