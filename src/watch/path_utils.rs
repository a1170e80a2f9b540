// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::{Component, Path, PathBuf};

/// Resolve `.` and `..` components without touching the file system.
///
/// `..` at the root is dropped.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// - First we try a direct `strip_prefix(root)`.
/// - If that fails (symlinks, different absolute prefixes), we canonicalize
///   both paths and try again. A removed file cannot be canonicalized, so
///   its parent directory is used instead.
///
/// Returns `None` if the path cannot be related to `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_string_lossy().replace('\\', "/"));
    }

    let root_canon = root.canonicalize().ok()?;

    if let Ok(path_canon) = path.canonicalize() {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(rel.to_string_lossy().replace('\\', "/"));
        }
    }

    let parent = path.parent()?.canonicalize().ok()?;
    let name = path.file_name()?;
    let rel = parent.join(name);
    let rel = rel.strip_prefix(&root_canon).ok()?;
    Some(rel.to_string_lossy().replace('\\', "/"))
}
