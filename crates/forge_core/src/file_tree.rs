//! Pure operations over in-memory file trees.
//!
//! Nothing in this module mutates its inputs: every operation returns a new
//! tree or change set.

use crate::types::{FileChanges, FileTree};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Applies `changes` on top of `tree` and returns the result.
///
/// `Some(content)` creates or overwrites a path, `None` deletes it (deleting
/// an absent path is a no-op). Paths are taken verbatim. Empty paths are
/// skipped since a tree never holds an empty key.
pub fn apply_changes(tree: &FileTree, changes: &FileChanges) -> FileTree {
    let mut next = tree.clone();
    for (path, change) in changes {
        if path.is_empty() {
            tracing::warn!("skipping file change with empty path");
            continue;
        }
        match change {
            Some(content) => {
                next.insert(path.clone(), content.clone());
            }
            None => {
                next.remove(path);
            }
        }
    }
    next
}

/// Computes the change set that undoes `changes` when applied to
/// `apply_changes(tree, changes)`.
pub fn invert_changes(tree: &FileTree, changes: &FileChanges) -> FileChanges {
    changes
        .keys()
        .filter(|path| !path.is_empty())
        .map(|path| (path.clone(), tree.get(path).cloned()))
        .collect()
}

/// Differences between two trees, each list sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeDiff {
    /// Paths only in the new tree.
    pub added: Vec<String>,
    /// Paths only in the old tree.
    pub removed: Vec<String>,
    /// Paths in both with different content.
    pub modified: Vec<String>,
}

impl TreeDiff {
    /// True when the trees are identical.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Total number of changed paths.
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }

    /// All changed paths in sorted order.
    pub fn changed_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .added
            .iter()
            .chain(&self.removed)
            .chain(&self.modified)
            .cloned()
            .collect();
        paths.sort();
        paths
    }
}

/// Compares two trees.
pub fn diff_trees(old: &FileTree, new: &FileTree) -> TreeDiff {
    let mut diff = TreeDiff::default();
    for (path, content) in new {
        match old.get(path) {
            None => diff.added.push(path.clone()),
            Some(previous) if previous != content => diff.modified.push(path.clone()),
            Some(_) => {}
        }
    }
    diff.removed = old
        .keys()
        .filter(|path| !new.contains_key(*path))
        .cloned()
        .collect();
    diff
}

/// Lists entries under `dir` (empty, `.` or `/` for the root).
///
/// Recursive listings return every file path below `dir`. Flat listings
/// return the direct children: files by full path, implied directories by
/// full path with a trailing `/`.
pub fn list_files(tree: &FileTree, dir: &str, recursive: bool) -> Vec<String> {
    let dir = dir.trim_matches('/');
    let prefix = if dir.is_empty() || dir == "." {
        String::new()
    } else {
        format!("{}/", dir)
    };

    let mut entries = BTreeSet::new();
    for path in tree.keys() {
        let Some(rest) = path.strip_prefix(&prefix) else {
            continue;
        };
        if recursive {
            entries.insert(path.clone());
            continue;
        }
        match rest.split_once('/') {
            Some((child_dir, _)) => {
                entries.insert(format!("{}{}/", prefix, child_dir));
            }
            None => {
                entries.insert(path.clone());
            }
        }
    }
    entries.into_iter().collect()
}

/// Linear undo/redo stack of trees.
///
/// Pushing after an undo discards the redo branch.
#[derive(Debug, Clone)]
pub struct TreeHistory {
    entries: Vec<FileTree>,
    cursor: usize,
    limit: usize,
}

impl TreeHistory {
    /// Default number of retained entries.
    pub const DEFAULT_LIMIT: usize = 50;

    /// Starts a history at `initial`.
    pub fn new(initial: FileTree) -> Self {
        Self::with_limit(initial, Self::DEFAULT_LIMIT)
    }

    /// Starts a history retaining at most `limit` entries (minimum 1).
    pub fn with_limit(initial: FileTree, limit: usize) -> Self {
        Self {
            entries: vec![initial],
            cursor: 0,
            limit: limit.max(1),
        }
    }

    /// The tree at the cursor.
    pub fn current(&self) -> &FileTree {
        &self.entries[self.cursor]
    }

    /// Records a new tree. Identical consecutive trees are not recorded.
    pub fn push(&mut self, tree: FileTree) {
        if *self.current() == tree {
            return;
        }
        self.entries.truncate(self.cursor + 1);
        self.entries.push(tree);
        if self.entries.len() > self.limit {
            let overflow = self.entries.len() - self.limit;
            self.entries.drain(..overflow);
        }
        self.cursor = self.entries.len() - 1;
    }

    /// Steps back one entry.
    pub fn undo(&mut self) -> Option<&FileTree> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(self.current())
    }

    /// Steps forward one entry.
    pub fn redo(&mut self) -> Option<&FileTree> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(self.current())
    }

    /// Whether an earlier entry exists.
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    /// Whether a later entry exists.
    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: a history holds at least its initial tree.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
