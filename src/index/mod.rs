//! Metadata index: an in-memory tree of file descriptors.
//!
//! The tree mirrors album-relative paths; each node holds child directories
//! and child files. Invariant: a path is a file, a directory, or absent,
//! never both. `BTreeMap` keys keep serialization deterministic. The tree is
//! owned exclusively by its `IndexedStorage` decorator.

mod format;
mod provider;

pub use provider::IndexedStorage;

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use crate::descriptor::FileDescriptor;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct DirNode {
    dirs: BTreeMap<String, DirNode>,
    files: BTreeMap<String, FileDescriptor>,
}

impl DirNode {
    fn is_empty(&self) -> bool {
        self.dirs.is_empty() && self.files.is_empty()
    }
}

/// Cached tree of descriptors keyed by album-relative path segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    root: PathBuf,
    tree: DirNode,
}

impl Index {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            tree: DirNode::default(),
        }
    }

    /// Album root path recorded on the first line of the index file.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn clear(&mut self) {
        self.tree = DirNode::default();
    }

    /// Number of cached file descriptors.
    pub fn len(&self) -> usize {
        fn count(node: &DirNode) -> usize {
            node.files.len() + node.dirs.values().map(count).sum::<usize>()
        }
        count(&self.tree)
    }

    /// Store a descriptor under `rel`, overwriting any prior entry. A
    /// same-named directory subtree is discarded: the filesystem cannot hold
    /// both, so the index must not either.
    pub fn insert(&mut self, rel: &Path, descriptor: FileDescriptor) {
        let Some((dirs, name)) = split_rel(rel) else {
            return;
        };
        let mut node = &mut self.tree;
        for seg in dirs {
            node.files.remove(&seg);
            node = node.dirs.entry(seg).or_default();
        }
        node.dirs.remove(&name);
        node.files.insert(name, descriptor);
    }

    /// Remove the entry at `rel`, pruning directory nodes left empty.
    /// Returns whether an entry was removed.
    pub fn remove(&mut self, rel: &Path) -> bool {
        let Some((dirs, name)) = split_rel(rel) else {
            return false;
        };
        fn walk(node: &mut DirNode, dirs: &[String], name: &str) -> bool {
            match dirs.split_first() {
                None => node.files.remove(name).is_some(),
                Some((head, tail)) => {
                    let Some(child) = node.dirs.get_mut(head) else {
                        return false;
                    };
                    let removed = walk(child, tail, name);
                    if child.is_empty() {
                        node.dirs.remove(head);
                    }
                    removed
                }
            }
        }
        walk(&mut self.tree, &dirs, &name)
    }

    pub fn descriptor(&self, rel: &Path) -> Option<&FileDescriptor> {
        let (dirs, name) = split_rel(rel)?;
        let mut node = &self.tree;
        for seg in &dirs {
            node = node.dirs.get(seg)?;
        }
        node.files.get(&name)
    }

    fn dir_node(&self, rel: &Path) -> Option<&DirNode> {
        let mut node = &self.tree;
        for comp in rel.components() {
            let Component::Normal(seg) = comp else {
                return None;
            };
            node = node.dirs.get(&seg.to_string_lossy().into_owned())?;
        }
        Some(node)
    }

    /// Cached file names of a directory, or `None` when the directory is not
    /// in the cache. The album root counts as cached only once anything has
    /// been indexed.
    pub fn files_in(&self, rel: &Path) -> Option<Vec<String>> {
        let node = self.dir_node(rel)?;
        if rel.components().next().is_none() && node.is_empty() {
            return None;
        }
        Some(node.files.keys().cloned().collect())
    }

    /// Cached subdirectory names of a directory, or `None` when not cached.
    pub fn dirs_in(&self, rel: &Path) -> Option<Vec<String>> {
        let node = self.dir_node(rel)?;
        if rel.components().next().is_none() && node.is_empty() {
            return None;
        }
        Some(node.dirs.keys().cloned().collect())
    }

    /// Visit every cached (relative path, descriptor) pair in deterministic
    /// order: files before subdirectories, both sorted by name.
    pub fn walk(&self, mut visit: impl FnMut(&Path, &FileDescriptor)) {
        fn rec(node: &DirNode, prefix: &mut PathBuf, visit: &mut impl FnMut(&Path, &FileDescriptor)) {
            for (name, desc) in &node.files {
                prefix.push(name);
                visit(prefix, desc);
                prefix.pop();
            }
            for (name, child) in &node.dirs {
                prefix.push(name);
                rec(child, prefix, visit);
                prefix.pop();
            }
        }
        let mut prefix = PathBuf::new();
        rec(&self.tree, &mut prefix, &mut visit);
    }
}

/// Split a relative path into directory segments and file name.
fn split_rel(rel: &Path) -> Option<(Vec<String>, String)> {
    let mut segs: Vec<String> = Vec::new();
    for comp in rel.components() {
        match comp {
            Component::Normal(seg) => segs.push(seg.to_string_lossy().into_owned()),
            _ => return None,
        }
    }
    let name = segs.pop()?;
    Some((segs, name))
}
