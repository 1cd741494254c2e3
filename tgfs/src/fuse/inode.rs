//! Inode numbers for kernel-visible paths.
//!
//! The backend addresses nodes by path only while the kernel addresses them by
//! inode. A number is handed out the first time a path is seen and follows the
//! path through renames. It is dropped once the kernel forgets every lookup of
//! it, or when the path is deleted. Nothing about the node itself is kept here.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const ROOT_INO: u64 = 1;

struct Node {
    path: String,
    lookups: u64,
}

struct Tables {
    nodes: HashMap<u64, Node>,
    by_path: HashMap<String, u64>,
    next: u64,
}

impl Tables {
    fn assign(&mut self, path: &str) -> u64 {
        if let Some(&ino) = self.by_path.get(path) {
            return ino;
        }
        let ino = self.next;
        self.next += 1;
        self.nodes.insert(
            ino,
            Node {
                path: path.to_owned(),
                lookups: 0,
            },
        );
        self.by_path.insert(path.to_owned(), ino);
        ino
    }

    /// `path` and everything below it, root excluded.
    fn subtree(&self, path: &str) -> Vec<String> {
        if path == "/" {
            return Vec::new();
        }
        let prefix = format!("{path}/");
        self.by_path
            .keys()
            .filter(|key| *key == path || key.starts_with(&prefix))
            .cloned()
            .collect()
    }

    fn drop_path(&mut self, path: &str) {
        if let Some(ino) = self.by_path.remove(path) {
            self.nodes.remove(&ino);
        }
    }
}

pub struct InodeTable {
    tables: Mutex<Tables>,
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeTable {
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        let mut by_path = HashMap::new();
        nodes.insert(
            ROOT_INO,
            Node {
                path: "/".into(),
                lookups: 0,
            },
        );
        by_path.insert("/".into(), ROOT_INO);
        Self {
            tables: Mutex::new(Tables {
                nodes,
                by_path,
                next: ROOT_INO + 1,
            }),
        }
    }

    // the maps stay consistent across a panic, so a poisoned lock is still usable
    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn path_of(&self, ino: u64) -> Option<String> {
        self.lock().nodes.get(&ino).map(|node| node.path.clone())
    }

    /// Number for `path` without counting a kernel lookup (plain readdir entries).
    pub fn assign(&self, path: &str) -> u64 {
        self.lock().assign(path)
    }

    /// Number for `path`, counting one kernel lookup (entry replies).
    pub fn remember(&self, path: &str) -> u64 {
        let mut tables = self.lock();
        let ino = tables.assign(path);
        if let Some(node) = tables.nodes.get_mut(&ino) {
            node.lookups += 1;
        }
        ino
    }

    pub fn forget(&self, ino: u64, nlookup: u64) {
        if ino == ROOT_INO {
            return;
        }
        let mut tables = self.lock();
        let Some(node) = tables.nodes.get_mut(&ino) else {
            return;
        };
        node.lookups = node.lookups.saturating_sub(nlookup);
        if node.lookups == 0 {
            let path = node.path.clone();
            tables.drop_path(&path);
        }
    }

    /// Drops `path` and all paths below it.
    pub fn remove(&self, path: &str) {
        let mut tables = self.lock();
        for key in tables.subtree(path) {
            tables.drop_path(&key);
        }
    }

    /// Moves `from` and its descendants under `to`, keeping their numbers.
    /// Whatever was known at `to` is dropped first.
    pub fn rename(&self, from: &str, to: &str) {
        if from == to {
            return;
        }
        let mut tables = self.lock();
        let replaced = tables.subtree(to);
        for key in replaced {
            tables.drop_path(&key);
        }
        for key in tables.subtree(from) {
            let Some(ino) = tables.by_path.remove(&key) else {
                continue;
            };
            let renamed = format!("{to}{}", &key[from.len()..]);
            if let Some(node) = tables.nodes.get_mut(&ino) {
                node.path = renamed.clone();
            }
            tables.by_path.insert(renamed, ino);
        }
    }

    #[cfg(test)]
    fn ino_of(&self, path: &str) -> Option<u64> {
        self.lock().by_path.get(path).copied()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock().nodes.len()
    }
}

/// Parent of an absolute path; the root is its own parent.
pub fn parent_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}
