// src/watch/session.rs

use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::config::VariantConfig;
use crate::errors::Result;
use crate::pipeline::AssetPipeline;
use crate::report::ErrorReporter;
use crate::watch::patterns::WatchProfile;
use crate::watch::rebuild::{RebuildHandle, RebuildSettings, spawn_rebuild_loop};
use crate::watch::watcher::{WatcherHandle, watch};

/// A live watch on one pipeline: the filesystem watcher plus the rebuild
/// loop it feeds.
#[derive(Debug)]
pub struct WatchSession {
    pipeline: String,
    watcher: WatcherHandle,
    rebuild: RebuildHandle,
}

impl WatchSession {
    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    pub fn watcher(&self) -> &WatcherHandle {
        &self.watcher
    }

    pub fn rebuild(&self) -> &RebuildHandle {
        &self.rebuild
    }

    /// Stop the rebuild loop and drop the watcher.
    pub fn stop(self) {
        self.rebuild.abort();
        info!(pipeline = %self.pipeline, "watch session stopped");
    }
}

/// Start watching `pipeline`'s sources under `root` and rebuild on change.
///
/// Must be called from within a Tokio runtime.
pub fn start_watch_session(
    root: &Path,
    pipeline: Arc<dyn AssetPipeline>,
    config: VariantConfig,
    reporter: ErrorReporter,
    settings: RebuildSettings,
    excludes: &[String],
) -> Result<WatchSession> {
    let name = pipeline.name().to_string();
    let profile = WatchProfile::new(&pipeline.watch_patterns(), excludes)?;

    let rebuild = spawn_rebuild_loop(Arc::clone(&pipeline), config, reporter, settings);
    let sender = rebuild.sender();

    let log_name = name.clone();
    let watcher = match watch(root, profile, move |event| {
        if sender.send(event).is_err() {
            warn!(pipeline = %log_name, "rebuild loop gone; dropping change");
        }
    }) {
        Ok(w) => w,
        Err(err) => {
            rebuild.abort();
            return Err(err);
        }
    };

    info!(pipeline = %name, dirs = ?watcher.dirs(), "watch session started");
    Ok(WatchSession {
        pipeline: name,
        watcher,
        rebuild,
    })
}

/// Watch sessions started during one invocation.
///
/// Task bodies push their session here; the CLI keeps the process alive
/// while the set is non-empty.
#[derive(Debug, Clone, Default)]
pub struct SessionSet {
    inner: Arc<Mutex<Vec<WatchSession>>>,
}

impl SessionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, session: WatchSession) {
        match self.inner.lock() {
            Ok(mut sessions) => sessions.push(session),
            Err(poisoned) => poisoned.into_inner().push(session),
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.lock() {
            Ok(sessions) => sessions.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of the watched pipelines, in start order.
    pub fn pipelines(&self) -> Vec<String> {
        let sessions = match self.inner.lock() {
            Ok(sessions) => sessions,
            Err(poisoned) => poisoned.into_inner(),
        };
        sessions.iter().map(|s| s.pipeline.clone()).collect()
    }

    /// Stop every session.
    pub fn shutdown(&self) {
        let drained: Vec<WatchSession> = match self.inner.lock() {
            Ok(mut sessions) => sessions.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };
        for session in drained {
            session.stop();
        }
    }
}
