// src/pipeline/script.rs

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::config::VariantConfig;
use crate::config::layout::js_dest;
use crate::pipeline::bundler::{BundleRequest, Bundler};
use crate::pipeline::{AssetPipeline, BuildFuture, BuildOutput, PipelineError, Stage, write_stage};
use crate::types::ChangeEvent;

const ERROR_KIND: &str = "ScriptError";

/// Bundles the client entry script and everything it imports.
///
/// The set of modules reported by the bundler is kept between builds so a
/// watch session only rebuilds for files that are actually part of the
/// bundle.
#[derive(Debug)]
pub struct ScriptPipeline {
    root: PathBuf,
    entry: PathBuf,
    target: String,
    watch: Vec<String>,
    bundler: Arc<dyn Bundler>,
    module_graph: RwLock<HashSet<String>>,
}

impl ScriptPipeline {
    pub fn new(
        root: impl Into<PathBuf>,
        entry: impl Into<PathBuf>,
        target: impl Into<String>,
        watch: Vec<String>,
        bundler: Arc<dyn Bundler>,
    ) -> Self {
        Self {
            root: root.into(),
            entry: entry.into(),
            target: target.into(),
            watch,
            bundler,
            module_graph: RwLock::new(HashSet::new()),
        }
    }

    /// Modules seen by the last successful build, sorted.
    pub fn module_graph(&self) -> Vec<String> {
        let mut modules: Vec<String> = match self.module_graph.read() {
            Ok(graph) => graph.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        };
        modules.sort();
        modules
    }

    /// Artifact name for a variant.
    pub fn output_name(config: &VariantConfig) -> &'static str {
        if config.compression { "app.min.js" } else { "app.js" }
    }

    async fn run(&self, config: &VariantConfig) -> Result<BuildOutput, PipelineError> {
        let out_dir = js_dest(config);
        let output_name = Self::output_name(config);

        let request = BundleRequest {
            entry: self.entry.clone(),
            root: self.root.clone(),
            out_dir: out_dir.clone(),
            output_name: output_name.to_string(),
            target: self.target.clone(),
            minify: config.compression,
            source_map: config.source_maps,
        };

        let bundle = self
            .bundler
            .bundle(&request)
            .await
            .map_err(|f| f.into_pipeline_error(ERROR_KIND))?;

        let mut output = BuildOutput::default();

        let artifact = out_dir.join(output_name);
        write_stage(&artifact, &bundle.code, Stage::Write, ERROR_KIND).await?;
        output.push(artifact);

        if config.source_maps {
            if let Some(map) = &bundle.map {
                let map_path = out_dir.join(format!("{output_name}.map"));
                write_stage(&map_path, map, Stage::SourceMap, ERROR_KIND).await?;
                output.push(map_path);
            }
        }

        self.replace_graph(bundle.inputs);
        Ok(output)
    }

    fn replace_graph(&self, inputs: Vec<String>) {
        let count = inputs.len();
        let mut graph = match self.module_graph.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        *graph = inputs.into_iter().collect();
        debug!(pipeline = "js", modules = count, "module graph updated");
    }
}

impl AssetPipeline for ScriptPipeline {
    fn name(&self) -> &str {
        "js"
    }

    fn error_kind(&self) -> &str {
        ERROR_KIND
    }

    fn watch_patterns(&self) -> Vec<String> {
        self.watch.clone()
    }

    /// Before the first successful build every matching file counts;
    /// afterwards only modules in the cached graph do.
    fn tracks(&self, rel_path: &str) -> bool {
        let graph = match self.module_graph.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        graph.is_empty() || graph.contains(rel_path)
    }

    fn build<'a>(
        &'a self,
        config: &'a VariantConfig,
        _changes: &'a [ChangeEvent],
    ) -> BuildFuture<'a> {
        Box::pin(self.run(config))
    }
}
