// src/config/layout.rs

use std::path::{Path, PathBuf};

use crate::config::model::ConfigFile;
use crate::config::variant::VariantConfig;
use crate::types::Variant;

/// Absolute project paths derived from `[paths]`.
///
/// Watch globs stay relative to `root`; everything else is absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    pub root: PathBuf,
    pub build_root: PathBuf,
    pub scripts_entry: PathBuf,
    pub scripts_watch: Vec<String>,
    pub styles_entry: PathBuf,
    pub styles_watch: Vec<String>,
    pub templates_dir: PathBuf,
    pub templates_glob: String,
    pub server_entry: PathBuf,
    pub server_watch: Vec<String>,
    pub exclude: Vec<String>,
}

impl ProjectLayout {
    /// Anchor the paths of `config` at `base` (the config file's directory).
    pub fn resolve(base: &Path, config: &ConfigFile) -> Self {
        let paths = &config.paths;
        let root = join_clean(base, &paths.root);

        Self {
            build_root: root.join(&paths.build),
            scripts_entry: root.join(&paths.scripts_entry),
            scripts_watch: paths.scripts_watch.clone(),
            styles_entry: root.join(&paths.styles_entry),
            styles_watch: paths.styles_watch.clone(),
            templates_dir: root.join(&paths.templates_dir),
            templates_glob: paths.templates_glob.clone(),
            server_entry: root.join(&paths.server_entry),
            server_watch: paths.server_watch.clone(),
            exclude: paths.exclude.clone(),
            root,
        }
    }

    /// Resolved settings for `variant`, defaults first then `[variants.*]`.
    pub fn variant_config(&self, config: &ConfigFile, variant: Variant) -> VariantConfig {
        let overrides = config.overrides_for(variant);
        let mut resolved = VariantConfig::resolve(variant, &self.build_root, overrides);
        if resolved.destination.is_relative() {
            resolved.destination = self.root.join(&resolved.destination);
        }
        resolved
    }

    /// Template watch glob, relative to `root`.
    pub fn templates_watch(&self) -> Vec<String> {
        let dir = self
            .templates_dir
            .strip_prefix(&self.root)
            .unwrap_or(&self.templates_dir)
            .to_string_lossy()
            .replace('\\', "/");
        let dir = dir.trim_end_matches('/');
        if dir.is_empty() {
            vec![self.templates_glob.clone()]
        } else {
            vec![format!("{dir}/{}", self.templates_glob)]
        }
    }

    /// Relative forward-slash form of `path` for logs and diagnostics.
    pub fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

pub fn js_dest(config: &VariantConfig) -> PathBuf {
    config.destination.join("assets").join("js")
}

pub fn css_dest(config: &VariantConfig) -> PathBuf {
    config.destination.join("assets").join("css")
}

pub fn templates_dest(config: &VariantConfig) -> PathBuf {
    config.destination.join("templates")
}

fn join_clean(base: &Path, rel: &Path) -> PathBuf {
    if rel.is_absolute() {
        return rel.to_path_buf();
    }
    if rel == Path::new(".") {
        return base.to_path_buf();
    }
    base.join(rel)
}
