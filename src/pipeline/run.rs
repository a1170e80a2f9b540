// src/pipeline/run.rs

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::VariantConfig;
use crate::pipeline::{AssetPipeline, BuildOutput, PipelineError, Stage};
use crate::report::{ErrorReporter, RawFailure, ReportedError};
use crate::types::ChangeEvent;

/// How a pipeline run ended.
///
/// `Reported` is a graceful end: the failure has already been classified and
/// logged, and the caller decides whether it matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEnd {
    Success(BuildOutput),
    Reported(ReportedError),
}

impl RunEnd {
    pub fn is_success(&self) -> bool {
        matches!(self, RunEnd::Success(_))
    }

    pub fn reported(&self) -> Option<&ReportedError> {
        match self {
            RunEnd::Reported(err) => Some(err),
            RunEnd::Success(_) => None,
        }
    }
}

/// One execution of a pipeline.
///
/// The build runs on its own Tokio task and signals completion through a
/// dedicated oneshot channel.
#[derive(Debug)]
pub struct PipelineRun {
    pipeline: String,
    kind: String,
    config: VariantConfig,
    reporter: ErrorReporter,
    join: JoinHandle<()>,
    done: oneshot::Receiver<RunEnd>,
}

impl PipelineRun {
    /// Spawn a build of `pipeline` for `config`.
    pub fn start(
        pipeline: Arc<dyn AssetPipeline>,
        config: VariantConfig,
        changes: Vec<ChangeEvent>,
        reporter: ErrorReporter,
    ) -> Self {
        let name = pipeline.name().to_string();
        let kind = pipeline.error_kind().to_string();
        let (tx, rx) = oneshot::channel::<RunEnd>();

        let task_config = config.clone();
        let task_reporter = reporter.clone();
        let join = tokio::spawn(async move {
            debug!(
                pipeline = %pipeline.name(),
                variant = %task_config.variant,
                changes = changes.len(),
                "pipeline build started"
            );
            let end = match pipeline.build(&task_config, &changes).await {
                Ok(output) => {
                    info!(
                        pipeline = %pipeline.name(),
                        variant = %task_config.variant,
                        artifacts = output.artifacts.len(),
                        "pipeline build finished"
                    );
                    RunEnd::Success(output)
                }
                Err(err) => RunEnd::Reported(task_reporter.report(pipeline.name(), &err)),
            };
            let _ = tx.send(end);
        });

        Self {
            pipeline: name,
            kind,
            config,
            reporter,
            join,
            done: rx,
        }
    }

    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    pub fn config(&self) -> &VariantConfig {
        &self.config
    }

    /// Wait for the run to end.
    ///
    /// A build task that dies without signalling (a panic) is reported as a
    /// toolchain error.
    pub async fn finish(self) -> RunEnd {
        match self.done.await {
            Ok(end) => end,
            Err(_) => {
                let message = match self.join.await {
                    Err(e) if e.is_panic() => "build task panicked".to_string(),
                    Err(e) => format!("build task aborted: {e}"),
                    Ok(()) => "build task ended without a result".to_string(),
                };
                let err = PipelineError::new(Stage::Toolchain, self.kind, RawFailure::opaque(message));
                RunEnd::Reported(self.reporter.report(&self.pipeline, &err))
            }
        }
    }
}
