// src/watch/mod.rs

//! File watching and rebuild loops.
//!
//! This module turns filesystem changes into pipeline rebuilds:
//! - [`patterns`] compiles watch / exclude globs.
//! - [`watcher`] wires up a cross-platform watcher (`notify`).
//! - [`rebuild`] serializes rebuilds per pipeline and batches changes.
//! - [`session`] ties one watcher to one rebuild loop.
//!
//! It does **not** know about the task graph; a watch session is started by
//! a task body after its initial build.

pub mod path_utils;
pub mod patterns;
pub mod rebuild;
pub mod session;
pub mod watcher;

pub use patterns::{WatchProfile, collect_matching_files, literal_base};
pub use rebuild::{
    RebuildHandle, RebuildOutcome, RebuildQueue, RebuildSettings, merge_change, spawn_rebuild_loop,
};
pub use session::{SessionSet, WatchSession, start_watch_session};
pub use watcher::{WatcherHandle, change_kind, watch};
