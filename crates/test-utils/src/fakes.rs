#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assetflow::config::VariantConfig;
use assetflow::pipeline::bundler::BundleFuture;
use assetflow::pipeline::server::ToolFuture;
use assetflow::pipeline::{
    AssetPipeline, BuildFuture, BuildOutput, BundleOutput, BundleRequest, Bundler, PipelineError,
    ServerBuildRequest, ServerToolchain, Stage, ToolFailure,
};
use assetflow::report::{RawFailure, SourceLocation};
use assetflow::types::ChangeEvent;

/// Marker that makes the fakes report a located syntax error.
pub const ERROR_MARKER: &str = "@@error";

/// Find the first `@@error` in `source` as a 1-based (line, column).
fn marker_position(source: &str) -> Option<(u32, u32)> {
    source.lines().enumerate().find_map(|(idx, line)| {
        line.find(ERROR_MARKER)
            .map(|col| ((idx + 1) as u32, (line[..col].chars().count() + 1) as u32))
    })
}

fn rel(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// In-process stand-in for esbuild.
///
/// Follows `import '...'` lines relative to the importing file, concatenates
/// every module into the bundle, and fails with a located error wherever it
/// sees [`ERROR_MARKER`]. Minified output drops blank lines and indentation.
#[derive(Debug, Default)]
pub struct FakeBundler {
    requests: Mutex<Vec<BundleRequest>>,
}

impl FakeBundler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<BundleRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn run(&self, request: &BundleRequest) -> Result<BundleOutput, ToolFailure> {
        self.requests.lock().unwrap().push(request.clone());

        let mut inputs = Vec::new();
        let mut code = String::new();
        let mut stack = vec![request.entry.clone()];

        while let Some(file) = stack.pop() {
            let rel_path = rel(&request.root, &file);
            if inputs.contains(&rel_path) {
                continue;
            }
            let source = std::fs::read_to_string(&file).map_err(|_| {
                ToolFailure::new(
                    Stage::Resolve,
                    RawFailure::located(
                        SourceLocation::new(request.entry.clone(), 1, 1),
                        format!("Could not resolve \"{rel_path}\""),
                    ),
                )
            })?;
            if let Some((line, column)) = marker_position(&source) {
                return Err(ToolFailure::new(
                    Stage::Transform,
                    RawFailure::located(
                        SourceLocation::new(file.clone(), line, column),
                        "Unexpected token",
                    ),
                ));
            }

            let dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
            for line in source.lines() {
                let line = line.trim();
                if let Some(spec) = line
                    .strip_prefix("import ")
                    .and_then(|rest| rest.split(['\'', '"']).nth(1))
                {
                    stack.push(dir.join(spec.trim_start_matches("./")));
                    continue;
                }
                if request.minify {
                    if !line.is_empty() {
                        code.push_str(line);
                    }
                } else {
                    code.push_str(line);
                    code.push('\n');
                }
            }
            inputs.push(rel_path);
        }

        let map = request.source_map.then(|| {
            let sources: Vec<String> = inputs.iter().map(|s| format!("\"{s}\"")).collect();
            format!(
                "{{\"version\":3,\"file\":\"{}\",\"sources\":[{}],\"mappings\":\"\"}}",
                request.output_name,
                sources.join(",")
            )
            .into_bytes()
        });

        inputs.sort();
        Ok(BundleOutput {
            code: code.into_bytes(),
            map,
            inputs,
        })
    }
}

impl Bundler for FakeBundler {
    fn bundle<'a>(&'a self, request: &'a BundleRequest) -> BundleFuture<'a> {
        Box::pin(async move { self.run(request) })
    }
}

/// Stand-in for `go build` that writes a placeholder executable.
#[derive(Debug, Default)]
pub struct FakeServerToolchain {
    requests: Mutex<Vec<ServerBuildRequest>>,
}

impl FakeServerToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ServerBuildRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ServerToolchain for FakeServerToolchain {
    fn build<'a>(&'a self, request: &'a ServerBuildRequest) -> ToolFuture<'a> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request.clone());

            let source = tokio::fs::read_to_string(&request.entry)
                .await
                .map_err(|e| ToolFailure::opaque(Stage::Toolchain, format!("no entry: {e}")))?;
            if let Some((line, column)) = marker_position(&source) {
                return Err(ToolFailure::new(
                    Stage::Toolchain,
                    RawFailure::located(
                        SourceLocation::new(request.entry.clone(), line, column),
                        "syntax error: unexpected marker",
                    ),
                ));
            }
            tokio::fs::write(&request.output, b"#!/bin/sh\nexit 0\n")
                .await
                .map_err(|e| ToolFailure::opaque(Stage::Toolchain, e.to_string()))
        })
    }
}

/// Pipeline that records every build and the changes it saw.
#[derive(Debug)]
pub struct CountingPipeline {
    name: String,
    delay: Duration,
    builds: AtomicUsize,
    batches: Mutex<Vec<Vec<ChangeEvent>>>,
    fail: Mutex<bool>,
    tracked_prefix: Option<String>,
}

impl CountingPipeline {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            delay: Duration::ZERO,
            builds: AtomicUsize::new(0),
            batches: Mutex::new(Vec::new()),
            fail: Mutex::new(false),
            tracked_prefix: None,
        }
    }

    /// Each build sleeps for `delay` before finishing.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Only changes under `prefix` trigger rebuilds.
    pub fn tracking(mut self, prefix: &str) -> Self {
        self.tracked_prefix = Some(prefix.to_string());
        self
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn batches(&self) -> Vec<Vec<ChangeEvent>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl AssetPipeline for CountingPipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn error_kind(&self) -> &str {
        "CountingError"
    }

    fn watch_patterns(&self) -> Vec<String> {
        vec!["src/**/*".to_string()]
    }

    fn tracks(&self, rel_path: &str) -> bool {
        match &self.tracked_prefix {
            Some(prefix) => rel_path.starts_with(prefix.as_str()),
            None => true,
        }
    }

    fn build<'a>(
        &'a self,
        _config: &'a VariantConfig,
        changes: &'a [ChangeEvent],
    ) -> BuildFuture<'a> {
        Box::pin(async move {
            self.builds.fetch_add(1, Ordering::SeqCst);
            self.batches.lock().unwrap().push(changes.to_vec());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if *self.fail.lock().unwrap() {
                return Err(PipelineError::new(
                    Stage::Transform,
                    "CountingError",
                    RawFailure::located(
                        SourceLocation::new(PathBuf::from("src/broken.txt"), 3, 7),
                        "broken input",
                    ),
                ));
            }
            Ok(BuildOutput::default())
        })
    }
}
