// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod lint;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod tasks;
pub mod types;
pub mod watch;

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use crate::cli::CliArgs;
use crate::config::load_or_default;
use crate::errors::AssetflowError;
use crate::fs::RealFileSystem;
use crate::tasks::builtin::{BuildContext, Toolchains, builtin_registry, describe};

/// High-level entry point used by `main.rs`.
///
/// Loads the (optional) config, registers the built-in tasks and runs the
/// requested one. When a successful run leaves watch sessions behind, keeps
/// watching until Ctrl-C. A failed run stops everything it started.
///
/// Returns whether the requested task's run succeeded.
pub async fn run(args: CliArgs) -> Result<bool> {
    let (config, layout) = load_or_default(&args.config)?;
    let toolchains = Toolchains::from_config(&config.toolchain);

    let ctx = BuildContext::new(config, layout, toolchains, Arc::new(RealFileSystem))?
        .with_watch(!args.no_watch);
    let ctx = Arc::new(ctx);

    let runner = builtin_registry(Arc::clone(&ctx))?.into_runner()?;

    if args.dry_run {
        if !runner.graph().contains(&args.task) {
            return Err(AssetflowError::TaskNotFound(args.task).into());
        }
        let order = runner.graph().execution_order(&args.task);
        describe(&ctx, &order, &mut std::io::stdout().lock())?;
        return Ok(true);
    }

    let handle = runner.run(&args.task)?;
    let report = handle
        .wait_or_cancel(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupted; stopping");
            } else {
                std::future::pending::<()>().await;
            }
        })
        .await?;

    if report.is_success() {
        info!("{report}");
    } else {
        error!("{report}");
    }

    if ctx.settle(&report).await {
        info!(
            pipelines = ?ctx.sessions().pipelines(),
            "watching for changes; press Ctrl+C to stop"
        );
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {e}");
        }
    }

    ctx.shutdown().await;
    Ok(report.is_success())
}
