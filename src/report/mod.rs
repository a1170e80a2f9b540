// src/report/mod.rs

//! Failure classification for pipeline runs.
//!
//! Every pipeline failure ends up here. Failures that carry a source
//! location become [`ReportedError::SourceError`]; everything else becomes
//! [`ReportedError::ToolchainError`]. Either way exactly one line is logged
//! and the run ends gracefully instead of propagating.

pub mod diagnostics;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::error;

use crate::pipeline::PipelineError;

/// A position inside a source file. Line and column are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<PathBuf>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

/// Failure as produced by a stage, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFailure {
    Located {
        location: SourceLocation,
        description: String,
    },
    Opaque(String),
}

impl RawFailure {
    pub fn located(location: SourceLocation, description: impl Into<String>) -> Self {
        RawFailure::Located {
            location,
            description: description.into(),
        }
    }

    pub fn opaque(message: impl Into<String>) -> Self {
        RawFailure::Opaque(message.into())
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            RawFailure::Located { location, .. } => Some(location),
            RawFailure::Opaque(_) => None,
        }
    }
}

impl std::fmt::Display for RawFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawFailure::Located {
                location,
                description,
            } => write!(
                f,
                "{}:{}:{}: {}",
                location.file.display(),
                location.line,
                location.column,
                description
            ),
            RawFailure::Opaque(message) => f.write_str(message),
        }
    }
}

/// Classified failure of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportedError {
    #[error("{kind}: {file}: Line {line} & Column {column}: {description}")]
    SourceError {
        kind: String,
        /// Path relative to the project root, forward slashes.
        file: String,
        line: u32,
        column: u32,
        description: String,
    },

    #[error("{kind}: {message}")]
    ToolchainError { kind: String, message: String },
}

impl ReportedError {
    pub fn kind(&self) -> &str {
        match self {
            ReportedError::SourceError { kind, .. } | ReportedError::ToolchainError { kind, .. } => {
                kind
            }
        }
    }

    pub fn is_source_error(&self) -> bool {
        matches!(self, ReportedError::SourceError { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ErrorReporter {
    root: PathBuf,
}

impl ErrorReporter {
    /// `root` is the directory paths are shown relative to.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Classify `err`, log it and return the classification.
    pub fn report(&self, pipeline: &str, err: &PipelineError) -> ReportedError {
        let reported = self.classify(err);
        error!(
            pipeline = %pipeline,
            stage = %err.stage,
            "{}",
            reported
        );
        reported
    }

    /// Classification without logging.
    pub fn classify(&self, err: &PipelineError) -> ReportedError {
        match &err.failure {
            RawFailure::Located {
                location,
                description,
            } => ReportedError::SourceError {
                kind: err.kind.clone(),
                file: self.relativise(&location.file),
                line: location.line,
                column: location.column,
                description: description.trim().to_string(),
            },
            RawFailure::Opaque(message) => ReportedError::ToolchainError {
                kind: err.kind.clone(),
                message: first_line_block(message),
            },
        }
    }

    /// Path relative to the root, forward slashes, without a leading `./`.
    pub fn relativise(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        let s = rel.to_string_lossy().replace('\\', "/");
        s.strip_prefix("./").map(str::to_string).unwrap_or(s)
    }
}

/// Collapse a multi-line toolchain message into a single line.
fn first_line_block(message: &str) -> String {
    let lines: Vec<&str> = message
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.is_empty() {
        "unknown error".to_string()
    } else {
        lines.join(" | ")
    }
}
