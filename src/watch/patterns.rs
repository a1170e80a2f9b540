// src/watch/patterns.rs

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::errors::AssetflowError;
use crate::fs::FileSystem;

/// Compiled watch/exclude glob patterns.
///
/// Patterns are relative to the project root; [`WatchProfile::matches`]
/// expects forward-slash relative paths such as `"assets/scripts/app.js"`.
#[derive(Clone)]
pub struct WatchProfile {
    patterns: Vec<String>,
    watch_set: GlobSet,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for WatchProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchProfile")
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl WatchProfile {
    /// Compile `watch` and `exclude`. Invalid globs are a watch setup error.
    pub fn new(watch: &[String], exclude: &[String]) -> crate::errors::Result<Self> {
        let watch_set = build_globset(watch)?;
        let exclude_set = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude)?)
        };

        Ok(Self {
            patterns: watch.to_vec(),
            watch_set,
            exclude_set,
        })
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether `rel_path` matches a watch glob and no exclude glob.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.watch_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }

    /// Directories to watch recursively: the literal prefix of each glob.
    pub fn base_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self.patterns.iter().map(|p| literal_base(p)).collect();
        dirs.sort();
        dirs.dedup();
        // Drop dirs nested inside another watched dir.
        let snapshot = dirs.clone();
        dirs.retain(|d| !snapshot.iter().any(|other| other != d && d.starts_with(other)));
        dirs
    }
}

/// Literal directory prefix of a glob: every leading component without
/// glob metacharacters, minus the final (file) component.
///
/// `assets/scripts/**/*.js` -> `assets/scripts`, `*.js` -> `` (the root).
pub fn literal_base(pattern: &str) -> PathBuf {
    let components: Vec<&str> = pattern.split('/').collect();
    let mut base = PathBuf::new();

    for (idx, component) in components.iter().enumerate() {
        let is_last = idx + 1 == components.len();
        if is_last || component.contains(['*', '?', '[', '{']) {
            break;
        }
        base.push(component);
    }

    base
}

fn build_globset(patterns: &[String]) -> crate::errors::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).map_err(|e| {
            AssetflowError::WatchSetup(format!("invalid glob pattern '{pat}': {e}"))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| AssetflowError::WatchSetup(format!("building glob set: {e}")))
}

/// Collect all files under `root` whose root-relative path matches `profile`.
pub fn collect_matching_files(
    fs: &dyn FileSystem,
    root: &Path,
    profile: &WatchProfile,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) {
                if let Ok(rel) = path.strip_prefix(root) {
                    let rel_str = rel.to_string_lossy().replace('\\', "/");
                    if profile.matches(&rel_str) {
                        files.push(path);
                    }
                }
            }
        }
    }

    files.sort();
    Ok(files)
}
