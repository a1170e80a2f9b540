// src/logging.rs

//! `tracing` subscriber setup.
//!
//! The filter is picked in this order:
//! 1. `--log-level` on the command line;
//! 2. `ASSETFLOW_LOG`, which accepts full `EnvFilter` directives such as
//!    `info,assetflow::watch=debug`;
//! 3. `info`.
//!
//! Output goes to stderr; stdout is reserved for `--dry-run`.

use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

/// Environment variable holding filter directives.
pub const LOG_ENV: &str = "ASSETFLOW_LOG";

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    fmt()
        .with_env_filter(resolve_filter(cli_level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("initialising logging: {e}"))
}

/// Filter for the given CLI level, falling back to [`LOG_ENV`] then `info`.
///
/// An unparsable [`LOG_ENV`] value is ignored.
pub fn resolve_filter(cli_level: Option<LogLevel>) -> EnvFilter {
    if let Some(level) = cli_level {
        return EnvFilter::new(level.as_directive());
    }
    std::env::var(LOG_ENV)
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives.trim()).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}
