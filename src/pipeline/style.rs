// src/pipeline/style.rs

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use grass::{Options, OutputStyle};
use tracing::debug;

use crate::config::VariantConfig;
use crate::config::layout::css_dest;
use crate::pipeline::imports::ImportGraph;
use crate::pipeline::sourcemap::{build_map, with_mapping_comment};
use crate::pipeline::{AssetPipeline, BuildFuture, BuildOutput, PipelineError, Stage, write_stage};
use crate::report::{RawFailure, SourceLocation};
use crate::types::ChangeEvent;
use crate::watch::path_utils::normalize_lexically;

const ERROR_KIND: &str = "StyleError";

/// Compiles the Sass entry stylesheet with `grass`.
#[derive(Debug)]
pub struct StylePipeline {
    root: PathBuf,
    entry: PathBuf,
    watch: Vec<String>,
    graph: Arc<Mutex<ImportGraph>>,
}

impl StylePipeline {
    pub fn new(root: impl Into<PathBuf>, entry: impl Into<PathBuf>, watch: Vec<String>) -> Self {
        let entry = entry.into();
        let load_paths = entry.parent().map(|p| vec![p.to_path_buf()]).unwrap_or_default();
        Self {
            root: root.into(),
            entry,
            watch,
            graph: Arc::new(Mutex::new(ImportGraph::new(load_paths))),
        }
    }

    pub fn output_name(config: &VariantConfig) -> &'static str {
        if config.compression { "app.min.css" } else { "app.css" }
    }

    async fn run(&self, config: &VariantConfig) -> Result<BuildOutput, PipelineError> {
        let sources = self.resolve().await?;
        let css = self.compile(config.compression).await?;

        let out_dir = css_dest(config);
        let output_name = Self::output_name(config);
        let artifact = out_dir.join(output_name);
        let mut output = BuildOutput::default();

        if config.source_maps {
            let map_name = format!("{output_name}.map");
            let contents = read_sources(&sources).await;
            let map = build_map(output_name, &contents, &self.root, &out_dir).map_err(|e| {
                PipelineError::new(Stage::SourceMap, ERROR_KIND, RawFailure::opaque(e.to_string()))
            })?;

            let css = with_mapping_comment(&css, &map_name);
            write_stage(&artifact, css.as_bytes(), Stage::Write, ERROR_KIND).await?;
            output.push(artifact);

            let map_path = out_dir.join(map_name);
            write_stage(&map_path, &map, Stage::SourceMap, ERROR_KIND).await?;
            output.push(map_path);
        } else {
            write_stage(&artifact, css.as_bytes(), Stage::Write, ERROR_KIND).await?;
            output.push(artifact);
        }

        Ok(output)
    }

    /// Inclusion graph of the entry, reusing cached import lists.
    async fn resolve(&self) -> Result<Vec<PathBuf>, PipelineError> {
        let graph = Arc::clone(&self.graph);
        let entry = self.entry.clone();

        let resolved = tokio::task::spawn_blocking(move || {
            let mut graph = match graph.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            graph.resolve(&entry)
        })
        .await
        .map_err(|e| {
            PipelineError::new(Stage::Resolve, ERROR_KIND, RawFailure::opaque(e.to_string()))
        })?;

        let files = resolved.map_err(|e| {
            PipelineError::new(
                Stage::Resolve,
                ERROR_KIND,
                RawFailure::opaque(format!("reading {}: {e}", self.entry.display())),
            )
        })?;
        debug!(pipeline = "css", files = files.len(), "resolved inclusion graph");
        Ok(files)
    }

    /// Compile in one pass; compression is the compressed output style.
    async fn compile(&self, compress: bool) -> Result<String, PipelineError> {
        let entry = self.entry.clone();
        let stage = if compress { Stage::Compress } else { Stage::Transform };

        tokio::task::spawn_blocking(move || {
            let style = if compress {
                OutputStyle::Compressed
            } else {
                OutputStyle::Expanded
            };
            let options = Options::default().style(style);
            grass::from_path(&entry, &options).map_err(|err| sass_failure(*err))
        })
        .await
        .map_err(|e| PipelineError::new(stage, ERROR_KIND, RawFailure::opaque(e.to_string())))?
        .map_err(|failure| PipelineError::new(Stage::Transform, ERROR_KIND, failure))
    }
}

/// Classify a `grass` error, keeping the location of parse errors.
fn sass_failure(err: grass::Error) -> RawFailure {
    let rendered = err.to_string();
    match err.kind() {
        grass::ErrorKind::ParseError { message, loc, .. } => RawFailure::located(
            SourceLocation::new(
                loc.file.name(),
                (loc.begin.line + 1) as u32,
                (loc.begin.column + 1) as u32,
            ),
            message,
        ),
        _ => RawFailure::opaque(rendered),
    }
}

async fn read_sources(files: &[PathBuf]) -> Vec<(PathBuf, Option<String>)> {
    let mut out = Vec::with_capacity(files.len());
    for file in files {
        let content = tokio::fs::read_to_string(file).await.ok();
        out.push((file.clone(), content));
    }
    out
}

impl AssetPipeline for StylePipeline {
    fn name(&self) -> &str {
        "css"
    }

    fn error_kind(&self) -> &str {
        ERROR_KIND
    }

    fn watch_patterns(&self) -> Vec<String> {
        self.watch.clone()
    }

    /// Files outside the last resolved inclusion graph are ignored once the
    /// graph is known.
    fn tracks(&self, rel_path: &str) -> bool {
        let graph = match self.graph.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        graph.is_empty() || graph.contains(&normalize_lexically(&self.root.join(rel_path)))
    }

    fn build<'a>(
        &'a self,
        config: &'a VariantConfig,
        _changes: &'a [ChangeEvent],
    ) -> BuildFuture<'a> {
        Box::pin(self.run(config))
    }
}
