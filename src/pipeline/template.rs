// src/pipeline/template.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::config::VariantConfig;
use crate::config::layout::templates_dest;
use crate::fs::FileSystem;
use crate::pipeline::{AssetPipeline, BuildFuture, BuildOutput, PipelineError, Stage, write_stage};
use crate::report::RawFailure;
use crate::types::{ChangeEvent, ChangeKind};
use crate::watch::patterns::{WatchProfile, collect_matching_files};

const ERROR_KIND: &str = "TemplateError";

/// Copies template files verbatim into the destination tree.
///
/// Full builds copy every matching file. Watch-triggered builds only touch
/// the changed files, and removals are mirrored.
#[derive(Debug)]
pub struct TemplatePipeline {
    root: PathBuf,
    source_dir: PathBuf,
    profile: WatchProfile,
    watch: Vec<String>,
    fs: Arc<dyn FileSystem>,
}

impl TemplatePipeline {
    /// `glob` is relative to `source_dir`; `watch` is relative to `root`.
    pub fn new(
        root: impl Into<PathBuf>,
        source_dir: impl Into<PathBuf>,
        glob: &str,
        watch: Vec<String>,
        fs: Arc<dyn FileSystem>,
    ) -> crate::errors::Result<Self> {
        let profile = WatchProfile::new(&[glob.to_string()], &[])?;
        Ok(Self {
            root: root.into(),
            source_dir: source_dir.into(),
            profile,
            watch,
            fs,
        })
    }

    async fn run(
        &self,
        config: &VariantConfig,
        changes: &[ChangeEvent],
    ) -> Result<BuildOutput, PipelineError> {
        let dest = templates_dest(config);
        if changes.is_empty() {
            self.copy_all(&dest).await
        } else {
            self.apply_changes(&dest, changes).await
        }
    }

    async fn copy_all(&self, dest: &Path) -> Result<BuildOutput, PipelineError> {
        let mut files = if self.fs.is_dir(&self.source_dir) {
            collect_matching_files(self.fs.as_ref(), &self.source_dir, &self.profile).map_err(
                |e| {
                    PipelineError::new(
                        Stage::Resolve,
                        ERROR_KIND,
                        RawFailure::opaque(format!("{e:#}")),
                    )
                },
            )?
        } else {
            debug!(dir = %self.source_dir.display(), "template directory missing; nothing to copy");
            Vec::new()
        };
        files.sort();

        let mut output = BuildOutput::default();
        for file in files {
            let Ok(rel) = file.strip_prefix(&self.source_dir) else {
                continue;
            };
            let target = dest.join(rel);
            self.copy_one(&file, &target).await?;
            output.push(target);
        }
        Ok(output)
    }

    async fn apply_changes(
        &self,
        dest: &Path,
        changes: &[ChangeEvent],
    ) -> Result<BuildOutput, PipelineError> {
        let mut output = BuildOutput::default();

        for change in changes {
            let source = self.root.join(&change.path);
            let Ok(rel) = source.strip_prefix(&self.source_dir) else {
                continue;
            };
            let rel_str = rel.to_string_lossy().replace('\\', "/");
            if !self.profile.matches(&rel_str) {
                continue;
            }
            let target = dest.join(rel);

            let removed = change.kind == ChangeKind::Removed || !self.fs.is_file(&source);
            if removed {
                match tokio::fs::remove_file(&target).await {
                    Ok(()) => debug!(path = %target.display(), "removed template"),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        return Err(PipelineError::new(
                            Stage::Write,
                            ERROR_KIND,
                            RawFailure::opaque(format!("removing {}: {e}", target.display())),
                        ));
                    }
                }
            } else {
                self.copy_one(&source, &target).await?;
                output.push(target);
            }
        }

        Ok(output)
    }

    async fn copy_one(&self, source: &Path, target: &Path) -> Result<(), PipelineError> {
        let bytes = tokio::fs::read(source).await.map_err(|e| {
            PipelineError::new(
                Stage::Resolve,
                ERROR_KIND,
                RawFailure::opaque(format!("reading {}: {e}", source.display())),
            )
        })?;
        write_stage(target, &bytes, Stage::Write, ERROR_KIND).await
    }
}

impl AssetPipeline for TemplatePipeline {
    fn name(&self) -> &str {
        "templates"
    }

    fn error_kind(&self) -> &str {
        ERROR_KIND
    }

    fn watch_patterns(&self) -> Vec<String> {
        self.watch.clone()
    }

    fn build<'a>(
        &'a self,
        config: &'a VariantConfig,
        changes: &'a [ChangeEvent],
    ) -> BuildFuture<'a> {
        Box::pin(self.run(config, changes))
    }
}
