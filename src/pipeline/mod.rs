// src/pipeline/mod.rs

//! Per-asset-type build pipelines.
//!
//! Every pipeline follows the same stage order: resolve sources, transform,
//! optionally compress, write the primary artifact, optionally write a
//! companion source map. Writes only happen after the earlier stages have
//! fully succeeded and are atomic, so a failed build never clobbers the
//! previous artifact.
//!
//! - [`script`] bundles client scripts through an external bundler.
//! - [`style`] compiles Sass in-process with `grass`.
//! - [`template`] copies template files verbatim.
//! - [`server`] builds (and optionally runs) the server binary.
//! - [`run`] wraps one execution of a pipeline as a [`PipelineRun`].

pub mod bundler;
pub mod imports;
pub mod run;
pub mod script;
pub mod server;
pub mod sourcemap;
pub mod style;
pub mod template;

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use thiserror::Error;
use tracing::debug;

use crate::config::VariantConfig;
use crate::report::RawFailure;
use crate::types::ChangeEvent;

pub use bundler::{BundleOutput, BundleRequest, Bundler, EsbuildBundler};
pub use run::{PipelineRun, RunEnd};
pub use script::ScriptPipeline;
pub use server::{GoToolchain, LaunchSettings, ServerBuildRequest, ServerPipeline, ServerToolchain};
pub use style::StylePipeline;
pub use template::TemplatePipeline;

/// Stage of a pipeline run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    Transform,
    Compress,
    Write,
    SourceMap,
    /// A single external toolchain invocation covering resolve to compress.
    Toolchain,
    /// Launching the built artifact.
    Run,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Resolve => "resolve",
            Stage::Transform => "transform",
            Stage::Compress => "compress",
            Stage::Write => "write",
            Stage::SourceMap => "sourcemap",
            Stage::Toolchain => "toolchain",
            Stage::Run => "run",
        };
        f.write_str(s)
    }
}

/// Failure of one pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} in {stage} stage: {failure}")]
pub struct PipelineError {
    pub stage: Stage,
    /// Error class shown to the user, e.g. `ScriptError`.
    pub kind: String,
    pub failure: RawFailure,
}

impl PipelineError {
    pub fn new(stage: Stage, kind: impl Into<String>, failure: RawFailure) -> Self {
        Self {
            stage,
            kind: kind.into(),
            failure,
        }
    }
}

/// Failure reported by an external tool, before the pipeline attaches its
/// error kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFailure {
    pub stage: Stage,
    pub failure: RawFailure,
}

impl ToolFailure {
    pub fn new(stage: Stage, failure: RawFailure) -> Self {
        Self { stage, failure }
    }

    pub fn opaque(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, RawFailure::opaque(message))
    }

    pub fn into_pipeline_error(self, kind: &str) -> PipelineError {
        PipelineError::new(self.stage, kind, self.failure)
    }
}

/// Files written by a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutput {
    pub artifacts: Vec<PathBuf>,
}

impl BuildOutput {
    pub fn push(&mut self, path: PathBuf) {
        self.artifacts.push(path);
    }
}

pub type BuildFuture<'a> =
    Pin<Box<dyn Future<Output = std::result::Result<BuildOutput, PipelineError>> + Send + 'a>>;

/// One asset type's build.
pub trait AssetPipeline: Send + Sync {
    /// Short name used in logs and task names (`js`, `css`, ...).
    fn name(&self) -> &str;

    /// Error class used when reporting failures.
    fn error_kind(&self) -> &str;

    /// Globs (relative to the project root) whose changes rebuild this
    /// pipeline in a watch session.
    fn watch_patterns(&self) -> Vec<String>;

    /// Whether a change to `rel_path` should trigger a rebuild.
    fn tracks(&self, _rel_path: &str) -> bool {
        true
    }

    /// Run all stages for `config`. `changes` is empty for full builds.
    fn build<'a>(&'a self, config: &'a VariantConfig, changes: &'a [ChangeEvent])
    -> BuildFuture<'a>;
}

/// Atomically replace `path` with `contents`.
///
/// The data goes to a temporary sibling first and is then renamed over the
/// destination, so readers observe either the old or the new file.
pub async fn write_artifact(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(parent).await?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    let tmp = parent.join(format!(".{file_name}.tmp-{}", std::process::id()));

    tokio::fs::write(&tmp, contents).await?;
    if let Err(err) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(err);
    }

    debug!(path = %path.display(), bytes = contents.len(), "wrote artifact");
    Ok(())
}

/// [`write_artifact`] with the error mapped to a `Write` stage failure.
pub(crate) async fn write_stage(
    path: &Path,
    contents: &[u8],
    stage: Stage,
    kind: &str,
) -> std::result::Result<(), PipelineError> {
    write_artifact(path, contents).await.map_err(|e| {
        PipelineError::new(
            stage,
            kind,
            RawFailure::opaque(format!("writing {}: {e}", path.display())),
        )
    })
}
