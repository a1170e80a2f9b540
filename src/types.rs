// src/types.rs

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;

/// Build variant selected per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Dev,
    Dist,
}

impl Variant {
    pub const ALL: [Variant; 2] = [Variant::Dev, Variant::Dist];

    /// Directory name under the build root (`build/dev`, `build/dist`).
    pub fn dir_name(self) -> &'static str {
        match self {
            Variant::Dev => "dev",
            Variant::Dist => "dist",
        }
    }

    /// Runtime mode handed to the server binary.
    pub fn environment(self) -> &'static str {
        match self {
            Variant::Dev => "development",
            Variant::Dist => "distribution",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dev" | "development" => Ok(Variant::Dev),
            "dist" | "distribution" => Ok(Variant::Dist),
            other => Err(format!(
                "invalid variant: {other} (expected \"dev\" or \"dist\")"
            )),
        }
    }
}

/// Behaviour when change events arrive while a rebuild of the same pipeline
/// is still in flight.
///
/// - `Queue`: remember the events and run exactly one follow-up rebuild that
///   observes all of them (default behaviour).
/// - `Drop`: ignore them; the next rebuild only happens on a later change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RebuildBehaviour {
    Queue,
    Drop,
}

impl Default for RebuildBehaviour {
    fn default() -> Self {
        RebuildBehaviour::Queue
    }
}

/// What happened to a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// A single file-system change, with `path` relative to the project root and
/// using forward slashes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ChangeKind::Modified)
    }

    /// Forward-slash string form of the relative path, as matched by globs.
    pub fn rel_str(&self) -> String {
        self.path.to_string_lossy().replace('\\', "/")
    }
}
