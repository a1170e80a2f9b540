// src/watch/watcher.rs

use std::path::PathBuf;

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::errors::{AssetflowError, Result};
use crate::types::{ChangeEvent, ChangeKind};
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::WatchProfile;

/// Handle for a filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive; dropping the handle
/// stops watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    dirs: Vec<PathBuf>,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("dirs", &self.dirs)
            .finish_non_exhaustive()
    }
}

impl WatcherHandle {
    /// Directories watched recursively.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

/// Watch the literal base directories of `profile` under `root` and call
/// `on_change` for every matching change, with a root-relative path.
///
/// A base directory that does not exist is a setup error. Must be called
/// from within a Tokio runtime.
pub fn watch<F>(root: impl Into<PathBuf>, profile: WatchProfile, on_change: F) -> Result<WatcherHandle>
where
    F: Fn(ChangeEvent) + Send + Sync + 'static,
{
    let root = root.into();
    let root = root.canonicalize().unwrap_or(root);

    let dirs: Vec<PathBuf> = profile.base_dirs().iter().map(|b| root.join(b)).collect();
    for dir in &dirs {
        if !dir.is_dir() {
            return Err(AssetflowError::WatchSetup(format!(
                "watch directory {} does not exist (patterns: {:?})",
                dir.display(),
                profile.patterns()
            )));
        }
    }

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    eprintln!("assetflow: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("assetflow: file watch error: {err}");
            }
        },
        Config::default(),
    )
    .map_err(|e| AssetflowError::WatchSetup(format!("creating watcher: {e}")))?;

    for dir in &dirs {
        watcher
            .watch(dir, RecursiveMode::Recursive)
            .map_err(|e| AssetflowError::WatchSetup(format!("watching {}: {e}", dir.display())))?;
    }

    info!(dirs = ?dirs, patterns = ?profile.patterns(), "file watcher started");

    let async_root = root.clone();
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let Some(kind) = change_kind(&event.kind) else {
                continue;
            };

            for path in &event.paths {
                let Some(rel) = relative_str(&async_root, path) else {
                    warn!(path = %path.display(), "change outside watch root; ignoring");
                    continue;
                };
                if !profile.matches(&rel) {
                    continue;
                }
                debug!(path = %rel, ?kind, "watched file changed");
                on_change(ChangeEvent::new(rel, kind));
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle {
        _inner: watcher,
        dirs,
    })
}

/// Map a notify event kind onto a [`ChangeKind`]; access events are dropped.
pub fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Added),
        EventKind::Remove(_) => Some(ChangeKind::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(ChangeKind::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(ChangeKind::Added),
        EventKind::Modify(_) | EventKind::Any => Some(ChangeKind::Modified),
        EventKind::Access(_) | EventKind::Other => None,
    }
}
