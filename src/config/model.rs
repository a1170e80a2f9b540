// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::config::variant::VariantOverrides;
use crate::lint::RuleLevel;
use crate::types::{RebuildBehaviour, Variant};

/// Top-level configuration as read from a TOML file (before validation).
///
/// Every section is optional; a project that follows the default layout needs
/// no config file at all:
///
/// ```toml
/// [paths]
/// scripts_entry = "assets/scripts/app.js"
/// styles_entry = "assets/styles/app.scss"
///
/// [watch]
/// triggered_while_running_behaviour = "queue"
/// debounce_ms = 50
///
/// [variants.dev]
/// run_after_build = false
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub paths: PathsSection,

    #[serde(default)]
    pub toolchain: ToolchainSection,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub lint: LintSection,

    #[serde(default)]
    pub variants: VariantsSection,
}

/// Validated configuration.
///
/// Only constructible through `TryFrom<RawConfigFile>` (see `validate.rs`),
/// so holders can rely on globs compiling and entries being non-empty.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub paths: PathsSection,
    pub toolchain: ToolchainSection,
    pub server: ServerSection,
    pub watch: WatchSection,
    pub lint: LintSection,
    pub variants: VariantsSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            paths: raw.paths,
            toolchain: raw.toolchain,
            server: raw.server,
            watch: raw.watch,
            lint: raw.lint,
            variants: raw.variants,
        }
    }

    /// User overrides for the given variant from `[variants.<name>]`.
    pub fn overrides_for(&self, variant: Variant) -> &VariantOverrides {
        match variant {
            Variant::Dev => &self.variants.dev,
            Variant::Dist => &self.variants.dist,
        }
    }
}

/// `[paths]` section. Relative paths are resolved against `root`, which in
/// turn is resolved against the directory holding the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    #[serde(default = "default_root")]
    pub root: PathBuf,

    #[serde(default = "default_build")]
    pub build: PathBuf,

    #[serde(default = "default_scripts_entry")]
    pub scripts_entry: PathBuf,

    #[serde(default = "default_scripts_watch")]
    pub scripts_watch: Vec<String>,

    #[serde(default = "default_styles_entry")]
    pub styles_entry: PathBuf,

    #[serde(default = "default_styles_watch")]
    pub styles_watch: Vec<String>,

    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,

    /// Glob evaluated relative to `templates_dir`.
    #[serde(default = "default_templates_glob")]
    pub templates_glob: String,

    #[serde(default = "default_server_entry")]
    pub server_entry: PathBuf,

    #[serde(default = "default_server_watch")]
    pub server_watch: Vec<String>,

    /// Excludes applied to every watcher.
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_build() -> PathBuf {
    PathBuf::from("build")
}

fn default_scripts_entry() -> PathBuf {
    PathBuf::from("assets/scripts/app.js")
}

fn default_scripts_watch() -> Vec<String> {
    vec!["assets/scripts/**/*.js".to_string()]
}

fn default_styles_entry() -> PathBuf {
    PathBuf::from("assets/styles/app.scss")
}

fn default_styles_watch() -> Vec<String> {
    vec!["assets/styles/**/*.{scss,sass,css}".to_string()]
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("templates")
}

fn default_templates_glob() -> String {
    "**/*.html.tmpl".to_string()
}

fn default_server_entry() -> PathBuf {
    PathBuf::from("app/server.go")
}

fn default_server_watch() -> Vec<String> {
    vec!["app/**/*.go".to_string()]
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            root: default_root(),
            build: default_build(),
            scripts_entry: default_scripts_entry(),
            scripts_watch: default_scripts_watch(),
            styles_entry: default_styles_entry(),
            styles_watch: default_styles_watch(),
            templates_dir: default_templates_dir(),
            templates_glob: default_templates_glob(),
            server_entry: default_server_entry(),
            server_watch: default_server_watch(),
            exclude: Vec::new(),
        }
    }
}

/// `[toolchain]` section: external programs invoked by the pipelines.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolchainSection {
    /// esbuild-compatible bundler binary.
    #[serde(default = "default_bundler")]
    pub bundler: String,

    /// Language level scripts are lowered to.
    #[serde(default = "default_bundler_target")]
    pub bundler_target: String,

    #[serde(default)]
    pub bundler_args: Vec<String>,

    /// Go toolchain binary.
    #[serde(default = "default_go")]
    pub go: String,

    #[serde(default)]
    pub go_args: Vec<String>,
}

fn default_bundler() -> String {
    "esbuild".to_string()
}

fn default_bundler_target() -> String {
    "es2015".to_string()
}

fn default_go() -> String {
    "go".to_string()
}

impl Default for ToolchainSection {
    fn default() -> Self {
        Self {
            bundler: default_bundler(),
            bundler_target: default_bundler_target(),
            bundler_args: Vec::new(),
            go: default_go(),
            go_args: Vec::new(),
        }
    }
}

/// `[server]` section: how the built server binary is named and launched.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    /// Environment variable carrying the runtime mode.
    #[serde(default = "default_env_var")]
    pub env_var: String,

    #[serde(default = "default_binary_name")]
    pub binary_name: String,

    /// Extra environment for the launched binary (e.g. `PORT`).
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub args: Vec<String>,
}

fn default_env_var() -> String {
    "APP_ENV".to_string()
}

fn default_binary_name() -> String {
    "server".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            env_var: default_env_var(),
            binary_name: default_binary_name(),
            env: BTreeMap::new(),
            args: Vec::new(),
        }
    }
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// `"queue"` (default) or `"drop"`.
    #[serde(default)]
    pub triggered_while_running_behaviour: RebuildBehaviour,

    /// Settle window after the first change before a rebuild starts; every
    /// event arriving inside it joins the same rebuild.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    50
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            triggered_while_running_behaviour: RebuildBehaviour::default(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// `[lint]` section: per-rule levels.
#[derive(Debug, Clone, Deserialize)]
pub struct LintSection {
    #[serde(default = "level_error")]
    pub no_debugger: RuleLevel,

    #[serde(default = "level_warn")]
    pub no_console: RuleLevel,

    #[serde(default = "level_warn")]
    pub no_trailing_whitespace: RuleLevel,

    #[serde(default = "level_off")]
    pub no_var: RuleLevel,

    #[serde(default = "level_warn")]
    pub max_line_length: RuleLevel,

    #[serde(default = "default_line_limit")]
    pub max_line_length_limit: usize,
}

fn level_error() -> RuleLevel {
    RuleLevel::Error
}

fn level_warn() -> RuleLevel {
    RuleLevel::Warn
}

fn level_off() -> RuleLevel {
    RuleLevel::Off
}

fn default_line_limit() -> usize {
    120
}

impl Default for LintSection {
    fn default() -> Self {
        Self {
            no_debugger: level_error(),
            no_console: level_warn(),
            no_trailing_whitespace: level_warn(),
            no_var: level_off(),
            max_line_length: level_warn(),
            max_line_length_limit: default_line_limit(),
        }
    }
}

/// `[variants.dev]` / `[variants.dist]`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VariantsSection {
    #[serde(default)]
    pub dev: VariantOverrides,

    #[serde(default)]
    pub dist: VariantOverrides,
}
