// src/pipeline/bundler.rs

//! Script bundler boundary.
//!
//! [`EsbuildBundler`] drives an esbuild-compatible CLI. Output goes to a
//! private staging directory so nothing under the destination is touched
//! until the pipeline's write stage.

use std::fmt::Debug;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;

use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use crate::pipeline::sourcemap::relative_source;
use crate::pipeline::{Stage, ToolFailure};
use crate::report::RawFailure;
use crate::report::diagnostics::parse_esbuild;
use crate::watch::path_utils::normalize_lexically;

/// One bundling request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleRequest {
    /// Absolute path of the entry script.
    pub entry: PathBuf,
    /// Project root; the bundler runs with this as working directory.
    pub root: PathBuf,
    /// Directory the bundle will finally be written to.
    pub out_dir: PathBuf,
    /// File name of the bundle (`app.js`, `app.min.js`).
    pub output_name: String,
    /// Language level to lower to, e.g. `es2015`.
    pub target: String,
    pub minify: bool,
    pub source_map: bool,
}

/// Bundled code plus the module graph that produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleOutput {
    pub code: Vec<u8>,
    pub map: Option<Vec<u8>>,
    /// Input files, relative to the project root with forward slashes.
    pub inputs: Vec<String>,
}

pub type BundleFuture<'a> =
    Pin<Box<dyn Future<Output = Result<BundleOutput, ToolFailure>> + Send + 'a>>;

pub trait Bundler: Send + Sync + Debug {
    fn bundle<'a>(&'a self, request: &'a BundleRequest) -> BundleFuture<'a>;
}

#[derive(Debug, Clone)]
pub struct EsbuildBundler {
    program: String,
    extra_args: Vec<String>,
}

impl EsbuildBundler {
    pub fn new(program: impl Into<String>, extra_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            extra_args,
        }
    }

    fn args(&self, request: &BundleRequest, outfile: &Path, metafile: &Path) -> Vec<String> {
        let mut args = vec![
            request.entry.to_string_lossy().into_owned(),
            "--bundle".to_string(),
            format!("--target={}", request.target),
            format!("--outfile={}", outfile.display()),
            format!("--metafile={}", metafile.display()),
            "--log-level=error".to_string(),
            "--color=false".to_string(),
        ];
        if request.minify {
            args.push("--minify".to_string());
        }
        if request.source_map {
            args.push("--sourcemap".to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }

    async fn run(&self, request: &BundleRequest) -> Result<BundleOutput, ToolFailure> {
        let staging = tempfile::Builder::new()
            .prefix(".assetflow-js-")
            .tempdir()
            .map_err(|e| ToolFailure::opaque(Stage::Toolchain, format!("creating staging dir: {e}")))?;
        let outfile = staging.path().join(&request.output_name);
        let metafile = staging.path().join("meta.json");

        let args = self.args(request, &outfile, &metafile);
        debug!(program = %self.program, ?args, "invoking bundler");

        let output = Command::new(&self.program)
            .args(&args)
            .current_dir(&request.root)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                ToolFailure::opaque(
                    Stage::Toolchain,
                    format!("failed to start bundler '{}': {e}", self.program),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let failure = parse_esbuild(&stderr);
            return Err(ToolFailure::new(stage_for(&failure), failure));
        }

        let code = tokio::fs::read(&outfile)
            .await
            .map_err(|e| ToolFailure::opaque(Stage::Toolchain, format!("reading bundle: {e}")))?;

        let map = if request.source_map {
            let map_path = staging.path().join(format!("{}.map", request.output_name));
            let raw = tokio::fs::read(&map_path).await.map_err(|e| {
                ToolFailure::opaque(Stage::SourceMap, format!("reading source map: {e}"))
            })?;
            Some(rebase_map_sources(&raw, staging.path(), &request.root, &request.out_dir)?)
        } else {
            None
        };

        let meta = tokio::fs::read(&metafile)
            .await
            .map_err(|e| ToolFailure::opaque(Stage::Resolve, format!("reading metafile: {e}")))?;
        let inputs = metafile_inputs(&meta)?;

        Ok(BundleOutput { code, map, inputs })
    }
}

impl Bundler for EsbuildBundler {
    fn bundle<'a>(&'a self, request: &'a BundleRequest) -> BundleFuture<'a> {
        Box::pin(self.run(request))
    }
}

/// Unresolvable imports are resolve failures; other located errors are
/// transform (syntax) failures.
fn stage_for(failure: &RawFailure) -> Stage {
    match failure {
        RawFailure::Located { description, .. } if description.starts_with("Could not resolve") => {
            Stage::Resolve
        }
        RawFailure::Located { .. } => Stage::Transform,
        RawFailure::Opaque(message) if message.starts_with("Could not resolve") => Stage::Resolve,
        RawFailure::Opaque(_) => Stage::Toolchain,
    }
}

#[derive(Debug, Deserialize)]
struct Metafile {
    #[serde(default)]
    inputs: serde_json::Map<String, Value>,
}

/// Module graph from an esbuild metafile: the keys of `inputs`.
pub fn metafile_inputs(raw: &[u8]) -> Result<Vec<String>, ToolFailure> {
    let meta: Metafile = serde_json::from_slice(raw)
        .map_err(|e| ToolFailure::opaque(Stage::Resolve, format!("parsing metafile: {e}")))?;
    let mut inputs: Vec<String> = meta
        .inputs
        .keys()
        .map(|k| k.replace('\\', "/").trim_start_matches("./").to_string())
        .collect();
    inputs.sort();
    Ok(inputs)
}

/// Rewrite `sources` of a map emitted into `staging` so they resolve from
/// `out_dir` instead.
fn rebase_map_sources(
    raw: &[u8],
    staging: &Path,
    root: &Path,
    out_dir: &Path,
) -> Result<Vec<u8>, ToolFailure> {
    let mut map: Value = serde_json::from_slice(raw)
        .map_err(|e| ToolFailure::opaque(Stage::SourceMap, format!("parsing source map: {e}")))?;

    if let Some(sources) = map.get_mut("sources").and_then(Value::as_array_mut) {
        for source in sources.iter_mut() {
            if let Some(s) = source.as_str() {
                let absolute = normalize_lexically(&staging.join(s));
                *source = Value::String(relative_source(root, out_dir, &absolute));
            }
        }
    }

    serde_json::to_vec(&map)
        .map_err(|e| ToolFailure::opaque(Stage::SourceMap, format!("writing source map: {e}")))
}
