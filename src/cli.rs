// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::tasks::builtin::DEFAULT_TASK;

/// Command-line arguments for `assetflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "assetflow",
    version,
    about = "Build and watch scripts, styles, templates and the server binary.",
    long_about = None
)]
pub struct CliArgs {
    /// Task to run: default, dev, dist, clean, clean-dev, clean-dist, lint,
    /// lint-dist, or a single pipeline task such as js-dev or css-dist.
    #[arg(value_name = "TASK", default_value = DEFAULT_TASK)]
    pub task: String,

    /// Path to the config file (TOML). A missing file means defaults.
    #[arg(long, value_name = "PATH", default_value = "Assetflow.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ASSETFLOW_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print the task graph and resolved variants, but run nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Build once and exit instead of watching after dev builds.
    #[arg(long)]
    pub no_watch: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
