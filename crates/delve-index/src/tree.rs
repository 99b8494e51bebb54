//! File-tree overview of a repository.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::error::{IndexError, Result};
use crate::session::walker;

/// Directory names left out of the overview along with everything below them.
const SKIPPED_DIRS: &[&str] = &["__pycache__", "node_modules"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Folder,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub kind: EntryKind,
    pub name: String,
    /// Relative to the repository root; empty for the root itself.
    pub path: PathBuf,
    /// Nesting depth; the root is 0.
    pub level: usize,
}

/// Folders and files under `root` in depth-first, name-sorted order.
///
/// Hidden entries, `__pycache__` and `node_modules` are skipped. Unreadable entries are
/// left out.
///
/// # Errors
///
/// Returns [`IndexError::NotADirectory`] if `root` is not a directory.
pub fn repo_tree(root: &Path) -> Result<Vec<TreeEntry>> {
    if !root.is_dir() {
        return Err(IndexError::NotADirectory(root.to_path_buf()));
    }

    let mut builder = walker(root);
    builder.filter_entry(|entry| {
        let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
        !(is_dir && entry.file_name().to_str().is_some_and(|n| SKIPPED_DIRS.contains(&n)))
    });

    let entries = builder
        .build()
        .flatten()
        .filter_map(|entry| {
            let kind = match entry.file_type() {
                Some(ft) if ft.is_dir() => EntryKind::Folder,
                Some(ft) if ft.is_file() => EntryKind::File,
                _ => return None,
            };
            let path = entry.path().strip_prefix(root).ok()?.to_path_buf();
            let name = if entry.depth() == 0 {
                root.file_name()
                    .map_or_else(|| ".".to_owned(), |n| n.to_string_lossy().into_owned())
            } else {
                entry.file_name().to_string_lossy().into_owned()
            };
            Some(TreeEntry {
                kind,
                name,
                path,
                level: entry.depth(),
            })
        })
        .collect();
    Ok(entries)
}

/// Indented listing, two spaces per level, folders suffixed with `/`.
#[must_use]
pub fn render_tree(entries: &[TreeEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let indent = "  ".repeat(entry.level);
        let suffix = if entry.kind == EntryKind::Folder { "/" } else { "" };
        let _ = writeln!(out, "{indent}{}{suffix}", entry.name);
    }
    out
}
