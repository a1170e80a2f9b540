// src/pipeline/server.rs

use std::fmt::Debug;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;
use tracing::{debug, info};

use crate::config::VariantConfig;
use crate::exec::{ProcessSpec, ProcessSupervisor};
use crate::pipeline::{AssetPipeline, BuildFuture, BuildOutput, PipelineError, Stage, ToolFailure};
use crate::report::RawFailure;
use crate::report::diagnostics::parse_go;
use crate::types::ChangeEvent;

const ERROR_KIND: &str = "ServerError";

/// Name the dev server is supervised under.
pub const SERVER_PROCESS: &str = "server";

/// One compile of the server binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerBuildRequest {
    pub root: PathBuf,
    pub entry: PathBuf,
    /// Where the toolchain must place the executable.
    pub output: PathBuf,
}

pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ToolFailure>> + Send + 'a>>;

pub trait ServerToolchain: Send + Sync + Debug {
    fn build<'a>(&'a self, request: &'a ServerBuildRequest) -> ToolFuture<'a>;
}

/// `go build -o <output> <entry>`.
#[derive(Debug, Clone)]
pub struct GoToolchain {
    program: String,
    extra_args: Vec<String>,
}

impl GoToolchain {
    pub fn new(program: impl Into<String>, extra_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            extra_args,
        }
    }

    async fn run(&self, request: &ServerBuildRequest) -> Result<(), ToolFailure> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("build")
            .args(&self.extra_args)
            .arg("-o")
            .arg(&request.output)
            .arg(&request.entry)
            .current_dir(&request.root)
            .stdin(Stdio::null());

        debug!(program = %self.program, entry = %request.entry.display(), "invoking go toolchain");

        let output = cmd.output().await.map_err(|e| {
            ToolFailure::opaque(
                Stage::Toolchain,
                format!("failed to start toolchain '{}': {e}", self.program),
            )
        })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(ToolFailure::new(Stage::Toolchain, parse_go(&stderr)))
        }
    }
}

impl ServerToolchain for GoToolchain {
    fn build<'a>(&'a self, request: &'a ServerBuildRequest) -> ToolFuture<'a> {
        Box::pin(self.run(request))
    }
}

/// How the built binary is launched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchSettings {
    pub binary_name: String,
    /// Variable carrying the runtime mode (`APP_ENV`).
    pub env_var: String,
    pub extra_env: Vec<(String, String)>,
    pub args: Vec<String>,
}

/// Builds the server executable and, when configured, (re)starts it.
#[derive(Debug)]
pub struct ServerPipeline {
    root: PathBuf,
    entry: PathBuf,
    watch: Vec<String>,
    launch: LaunchSettings,
    toolchain: Arc<dyn ServerToolchain>,
    supervisor: ProcessSupervisor,
}

impl ServerPipeline {
    pub fn new(
        root: impl Into<PathBuf>,
        entry: impl Into<PathBuf>,
        watch: Vec<String>,
        launch: LaunchSettings,
        toolchain: Arc<dyn ServerToolchain>,
        supervisor: ProcessSupervisor,
    ) -> Self {
        Self {
            root: root.into(),
            entry: entry.into(),
            watch,
            launch,
            toolchain,
            supervisor,
        }
    }

    /// `server`, or `server.exe` on Windows.
    ///
    /// The binary is a plain file at the root of the variant directory, next
    /// to `templates/` and `assets/`, and is launched with that directory as
    /// its working directory. It finds both trees relative to itself, so the
    /// variant directory can be shipped as is.
    pub fn binary_file_name(&self) -> String {
        format!("{}{}", self.launch.binary_name, std::env::consts::EXE_SUFFIX)
    }

    /// Environment block handed to the launched binary.
    pub fn environment(&self, config: &VariantConfig) -> Vec<(String, String)> {
        let mut env = vec![(
            self.launch.env_var.clone(),
            config.environment().to_string(),
        )];
        env.extend(self.launch.extra_env.iter().cloned());
        env
    }

    async fn run(&self, config: &VariantConfig) -> Result<BuildOutput, PipelineError> {
        let dest_dir = &config.destination;
        let artifact = dest_dir.join(self.binary_file_name());

        let staging = self.staging_dir(dest_dir).await?;
        let staged = staging.path().join(self.binary_file_name());

        let request = ServerBuildRequest {
            root: self.root.clone(),
            entry: self.entry.clone(),
            output: staged.clone(),
        };
        self.toolchain
            .build(&request)
            .await
            .map_err(|f| f.into_pipeline_error(ERROR_KIND))?;

        tokio::fs::rename(&staged, &artifact).await.map_err(|e| {
            PipelineError::new(
                Stage::Write,
                ERROR_KIND,
                RawFailure::opaque(format!("installing {}: {e}", artifact.display())),
            )
        })?;
        info!(pipeline = "server", path = %artifact.display(), "server binary built");

        if config.run_after_build {
            self.launch(config, &artifact).await?;
        }

        Ok(BuildOutput {
            artifacts: vec![artifact],
        })
    }

    /// Staging lives next to the destination so the final rename stays on
    /// one filesystem.
    async fn staging_dir(&self, dest_dir: &Path) -> Result<tempfile::TempDir, PipelineError> {
        let write_err = |e: std::io::Error| {
            PipelineError::new(
                Stage::Write,
                ERROR_KIND,
                RawFailure::opaque(format!("preparing {}: {e}", dest_dir.display())),
            )
        };
        tokio::fs::create_dir_all(dest_dir).await.map_err(write_err)?;
        tempfile::Builder::new()
            .prefix(".assetflow-server-")
            .tempdir_in(dest_dir)
            .map_err(write_err)
    }

    async fn launch(&self, config: &VariantConfig, binary: &Path) -> Result<(), PipelineError> {
        let spec = ProcessSpec {
            program: binary.to_path_buf(),
            args: self.launch.args.clone(),
            cwd: config.destination.clone(),
            env: self.environment(config),
        };
        self.supervisor
            .restart(SERVER_PROCESS, spec)
            .await
            .map_err(|e| {
                PipelineError::new(Stage::Run, ERROR_KIND, RawFailure::opaque(format!("{e:#}")))
            })
    }
}

impl AssetPipeline for ServerPipeline {
    fn name(&self) -> &str {
        "server"
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
        _changes: &'a [ChangeEvent],
    ) -> BuildFuture<'a> {
        Box::pin(self.run(config))
    }
}
