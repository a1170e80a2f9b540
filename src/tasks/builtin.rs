// src/tasks/builtin.rs

//! The built-in task set exposed on the command line.
//!
//! ```text
//! clean-dev ─┬─ js-dev ─────────┐
//!            ├─ css-dev ────────┤
//!            ├─ templates-dev ──┼─ default ── dev
//!            └─ server-dev ─────┘   (server-dev also waits for templates-dev)
//!
//! clean-dist ─┬─ js-dist ─────────┐
//! lint-dist  ─┼─ css-dist ────────┼─ dist
//!             ├─ templates-dist ──┤
//!             └─ server-dist ─────┘
//! ```
//!
//! Dev pipeline tasks absorb reported build failures and, when watching is
//! enabled, leave a watch session behind. Dist pipeline tasks turn a
//! reported failure into a task failure so the run (and exit code) fails.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use tracing::{info, warn};

use crate::config::{ConfigFile, ProjectLayout, ToolchainSection, VariantConfig};
use crate::engine::RunReport;
use crate::errors::Result;
use crate::exec::ProcessSupervisor;
use crate::fs::FileSystem;
use crate::lint::{LintFinding, Linter, Severity, has_errors, log_findings};
use crate::pipeline::{
    AssetPipeline, Bundler, EsbuildBundler, GoToolchain, LaunchSettings, PipelineRun, RunEnd,
    ScriptPipeline, ServerPipeline, ServerToolchain, StylePipeline, TemplatePipeline,
};
use crate::report::ErrorReporter;
use crate::tasks::{TaskRegistry, body};
use crate::types::Variant;
use crate::watch::{RebuildSettings, SessionSet, WatchProfile, start_watch_session};

/// Task run when none is named on the command line.
pub const DEFAULT_TASK: &str = "default";

/// External tools used by the script and server pipelines.
#[derive(Debug, Clone)]
pub struct Toolchains {
    pub bundler: Arc<dyn Bundler>,
    pub server: Arc<dyn ServerToolchain>,
}

impl Toolchains {
    pub fn from_config(section: &ToolchainSection) -> Self {
        Self {
            bundler: Arc::new(EsbuildBundler::new(
                section.bundler.clone(),
                section.bundler_args.clone(),
            )),
            server: Arc::new(GoToolchain::new(section.go.clone(), section.go_args.clone())),
        }
    }
}

/// The four asset pipelines of a project.
#[derive(Clone)]
pub struct Pipelines {
    pub js: Arc<ScriptPipeline>,
    pub css: Arc<StylePipeline>,
    pub templates: Arc<TemplatePipeline>,
    pub server: Arc<ServerPipeline>,
}

impl Pipelines {
    fn get(&self, kind: PipelineKind) -> Arc<dyn AssetPipeline> {
        match kind {
            PipelineKind::Js => Arc::clone(&self.js) as Arc<dyn AssetPipeline>,
            PipelineKind::Css => Arc::clone(&self.css) as Arc<dyn AssetPipeline>,
            PipelineKind::Templates => Arc::clone(&self.templates) as Arc<dyn AssetPipeline>,
            PipelineKind::Server => Arc::clone(&self.server) as Arc<dyn AssetPipeline>,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineKind {
    Js,
    Css,
    Templates,
    Server,
}

impl PipelineKind {
    const ALL: [PipelineKind; 4] = [
        PipelineKind::Js,
        PipelineKind::Css,
        PipelineKind::Templates,
        PipelineKind::Server,
    ];

    fn prefix(self) -> &'static str {
        match self {
            PipelineKind::Js => "js",
            PipelineKind::Css => "css",
            PipelineKind::Templates => "templates",
            PipelineKind::Server => "server",
        }
    }
}

/// Everything a built-in task body needs, shared across all bodies.
pub struct BuildContext {
    config: ConfigFile,
    layout: ProjectLayout,
    fs: Arc<dyn FileSystem>,
    reporter: ErrorReporter,
    supervisor: ProcessSupervisor,
    sessions: SessionSet,
    pipelines: Pipelines,
    watch: bool,
}

impl std::fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildContext")
            .field("root", &self.layout.root)
            .field("watch", &self.watch)
            .finish_non_exhaustive()
    }
}

impl BuildContext {
    pub fn new(
        config: ConfigFile,
        layout: ProjectLayout,
        toolchains: Toolchains,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self> {
        let supervisor = ProcessSupervisor::new();
        let root = layout.root.clone();

        let js = ScriptPipeline::new(
            &root,
            &layout.scripts_entry,
            config.toolchain.bundler_target.clone(),
            layout.scripts_watch.clone(),
            toolchains.bundler,
        );
        let css = StylePipeline::new(&root, &layout.styles_entry, layout.styles_watch.clone());
        let templates = TemplatePipeline::new(
            &root,
            &layout.templates_dir,
            &layout.templates_glob,
            layout.templates_watch(),
            Arc::clone(&fs),
        )?;
        let launch = LaunchSettings {
            binary_name: config.server.binary_name.clone(),
            env_var: config.server.env_var.clone(),
            extra_env: config
                .server
                .env
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            args: config.server.args.clone(),
        };
        let server = ServerPipeline::new(
            &root,
            &layout.server_entry,
            layout.server_watch.clone(),
            launch,
            toolchains.server,
            supervisor.clone(),
        );

        Ok(Self {
            reporter: ErrorReporter::new(&root),
            config,
            layout,
            fs,
            supervisor,
            sessions: SessionSet::new(),
            pipelines: Pipelines {
                js: Arc::new(js),
                css: Arc::new(css),
                templates: Arc::new(templates),
                server: Arc::new(server),
            },
            watch: true,
        })
    }

    /// Enable or disable watch sessions after dev builds.
    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    pub fn pipelines(&self) -> &Pipelines {
        &self.pipelines
    }

    pub fn sessions(&self) -> &SessionSet {
        &self.sessions
    }

    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    pub fn is_watching(&self) -> bool {
        self.watch
    }

    /// Resolved settings for `variant`.
    ///
    /// A one-shot dev build (watching disabled) never launches the server:
    /// nothing would keep it alive.
    pub fn variant_config(&self, variant: Variant) -> VariantConfig {
        let mut resolved = self.layout.variant_config(&self.config, variant);
        if variant == Variant::Dev && !self.watch {
            resolved.run_after_build = false;
        }
        resolved
    }

    /// Remove the variant's destination tree.
    pub async fn clean(&self, variant: Variant) -> anyhow::Result<()> {
        let dest = self.variant_config(variant).destination;
        match tokio::fs::remove_dir_all(&dest).await {
            Ok(()) => {
                info!(variant = %variant, path = %dest.display(), "cleaned build directory");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("removing build directory {}", dest.display()))
            }
        }
    }

    /// Lint the script sources and log every finding.
    pub async fn lint(&self) -> anyhow::Result<Vec<LintFinding>> {
        let profile = WatchProfile::new(&self.layout.scripts_watch, &self.layout.exclude)?;
        let linter = Linter::new(
            Arc::clone(&self.fs),
            &self.layout.root,
            profile,
            self.config.lint.clone(),
        );
        let findings = tokio::task::spawn_blocking(move || linter.lint())
            .await
            .context("lint task panicked")??;
        log_findings(&findings);
        Ok(findings)
    }

    /// The dist lint gate: fail on any error-severity finding.
    pub async fn lint_gate(&self) -> anyhow::Result<()> {
        let findings = self.lint().await?;
        if !self.variant_config(Variant::Dist).lint_gate {
            info!("lint gate disabled for dist; findings are advisory");
            return Ok(());
        }
        if has_errors(&findings) {
            let errors = findings
                .iter()
                .filter(|f| f.severity == Severity::Error)
                .count();
            bail!("lint gate failed with {errors} error(s)");
        }
        Ok(())
    }

    /// Build one pipeline for `variant`.
    ///
    /// dist: a reported failure fails the task. dev: the failure has already
    /// been logged; the task succeeds and, when watching, starts a session.
    async fn build(&self, kind: PipelineKind, variant: Variant) -> anyhow::Result<()> {
        let pipeline = self.pipelines.get(kind);
        let config = self.variant_config(variant);

        let run = PipelineRun::start(
            Arc::clone(&pipeline),
            config.clone(),
            Vec::new(),
            self.reporter.clone(),
        );
        let end = run.finish().await;

        match (variant, end) {
            (Variant::Dist, RunEnd::Reported(err)) => bail!("{err}"),
            (Variant::Dist, RunEnd::Success(_)) => Ok(()),
            (Variant::Dev, end) => {
                if let RunEnd::Reported(err) = &end {
                    warn!(pipeline = %pipeline.name(), "initial build failed: {err}");
                }
                if self.watch {
                    self.start_session(pipeline, config)?;
                }
                Ok(())
            }
        }
    }

    fn start_session(
        &self,
        pipeline: Arc<dyn AssetPipeline>,
        config: VariantConfig,
    ) -> anyhow::Result<()> {
        let session = start_watch_session(
            &self.layout.root,
            pipeline,
            config,
            self.reporter.clone(),
            RebuildSettings::from_config(&self.config.watch),
            &self.layout.exclude,
        )?;
        self.sessions.push(session);
        Ok(())
    }

    /// Settle the context after a run of the requested task finished.
    ///
    /// A failed run is fatal at startup: sessions that other tasks already
    /// started are stopped along with any supervised process. Returns whether
    /// there is anything left to watch.
    pub async fn settle(&self, report: &RunReport) -> bool {
        if !report.is_success() {
            self.shutdown().await;
            return false;
        }
        !self.sessions.is_empty()
    }

    /// Stop every watch session and supervised process.
    pub async fn shutdown(&self) {
        self.sessions.shutdown();
        self.supervisor.stop_all().await;
    }
}

/// Register the built-in tasks against `ctx`.
pub fn register_builtin_tasks(registry: &mut TaskRegistry, ctx: Arc<BuildContext>) -> Result<()> {
    for variant in Variant::ALL {
        let c = Arc::clone(&ctx);
        registry.register(
            clean_task(variant),
            &[],
            Some(body(move || {
                let c = Arc::clone(&c);
                async move { c.clean(variant).await }
            })),
        )?;
    }
    registry.register_aggregate("clean", &["clean-dev", "clean-dist"])?;

    let c = Arc::clone(&ctx);
    registry.register(
        "lint",
        &[],
        Some(body(move || {
            let c = Arc::clone(&c);
            async move { c.lint().await.map(|_| ()) }
        })),
    )?;

    let c = Arc::clone(&ctx);
    registry.register(
        "lint-dist",
        &[],
        Some(body(move || {
            let c = Arc::clone(&c);
            async move { c.lint_gate().await }
        })),
    )?;

    for kind in PipelineKind::ALL {
        for variant in Variant::ALL {
            let deps = pipeline_deps(kind, variant);
            let c = Arc::clone(&ctx);
            registry.register(
                pipeline_task(kind, variant),
                &deps,
                Some(body(move || {
                    let c = Arc::clone(&c);
                    async move { c.build(kind, variant).await }
                })),
            )?;
        }
    }

    registry.register_aggregate(
        DEFAULT_TASK,
        &["js-dev", "css-dev", "templates-dev", "server-dev"],
    )?;
    registry.register_aggregate("dev", &[DEFAULT_TASK])?;
    registry.register_aggregate(
        "dist",
        &["js-dist", "css-dist", "templates-dist", "server-dist"],
    )?;

    Ok(())
}

/// A fresh registry holding only the built-in tasks.
pub fn builtin_registry(ctx: Arc<BuildContext>) -> Result<TaskRegistry> {
    let mut registry = TaskRegistry::new();
    register_builtin_tasks(&mut registry, ctx)?;
    Ok(registry)
}

fn clean_task(variant: Variant) -> String {
    format!("clean-{variant}")
}

fn pipeline_task(kind: PipelineKind, variant: Variant) -> String {
    format!("{}-{variant}", kind.prefix())
}

fn pipeline_deps(kind: PipelineKind, variant: Variant) -> Vec<&'static str> {
    match (kind, variant) {
        (PipelineKind::Server, Variant::Dev) => vec!["clean-dev", "templates-dev"],
        (_, Variant::Dev) => vec!["clean-dev"],
        (_, Variant::Dist) => vec!["clean-dist", "lint-dist"],
    }
}

/// Print the task graph and resolved variants without running anything.
pub fn describe(
    ctx: &BuildContext,
    order: &[String],
    out: &mut impl std::io::Write,
) -> std::io::Result<()> {
    writeln!(out, "assetflow dry-run")?;
    writeln!(out, "  root = {}", ctx.layout.root.display())?;
    writeln!(out)?;

    writeln!(out, "execution order ({}):", order.len())?;
    for name in order {
        writeln!(out, "  - {name}")?;
    }
    writeln!(out)?;

    for variant in Variant::ALL {
        let cfg = ctx.variant_config(variant);
        writeln!(out, "variant {variant}:")?;
        writeln!(
            out,
            "    destination: {}",
            display_rel(&ctx.layout.root, &cfg.destination)
        )?;
        writeln!(out, "    source_maps: {}", cfg.source_maps)?;
        writeln!(out, "    compression: {}", cfg.compression)?;
        writeln!(out, "    run_after_build: {}", cfg.run_after_build)?;
        writeln!(out, "    lint_gate: {}", cfg.lint_gate)?;
        writeln!(out, "    environment: {}", cfg.environment())?;
    }
    Ok(())
}

fn display_rel(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
