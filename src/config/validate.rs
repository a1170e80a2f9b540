// src/config/validate.rs

use globset::Glob;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{AssetflowError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::AssetflowError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_entries(cfg)?;
    validate_globs(cfg)?;
    validate_toolchain(cfg)?;
    Ok(())
}

fn validate_entries(cfg: &RawConfigFile) -> Result<()> {
    let entries = [
        ("scripts_entry", &cfg.paths.scripts_entry),
        ("styles_entry", &cfg.paths.styles_entry),
        ("server_entry", &cfg.paths.server_entry),
        ("templates_dir", &cfg.paths.templates_dir),
        ("build", &cfg.paths.build),
    ];

    for (key, path) in entries {
        if path.as_os_str().is_empty() {
            return Err(AssetflowError::ConfigError(format!(
                "[paths].{key} must not be empty"
            )));
        }
    }

    if cfg.server.binary_name.trim().is_empty() {
        return Err(AssetflowError::ConfigError(
            "[server].binary_name must not be empty".to_string(),
        ));
    }
    if cfg.server.env_var.trim().is_empty() {
        return Err(AssetflowError::ConfigError(
            "[server].env_var must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_globs(cfg: &RawConfigFile) -> Result<()> {
    let groups: [(&str, &[String]); 4] = [
        ("scripts_watch", &cfg.paths.scripts_watch),
        ("styles_watch", &cfg.paths.styles_watch),
        ("server_watch", &cfg.paths.server_watch),
        ("exclude", &cfg.paths.exclude),
    ];

    for (key, patterns) in groups {
        for pattern in patterns {
            check_glob(key, pattern)?;
        }
    }
    check_glob("templates_glob", &cfg.paths.templates_glob)?;

    Ok(())
}

fn check_glob(key: &str, pattern: &str) -> Result<()> {
    Glob::new(pattern).map_err(|e| {
        AssetflowError::ConfigError(format!(
            "[paths].{key} contains invalid glob '{pattern}': {e}"
        ))
    })?;
    Ok(())
}

fn validate_toolchain(cfg: &RawConfigFile) -> Result<()> {
    if cfg.toolchain.bundler.trim().is_empty() {
        return Err(AssetflowError::ConfigError(
            "[toolchain].bundler must not be empty".to_string(),
        ));
    }
    if cfg.toolchain.go.trim().is_empty() {
        return Err(AssetflowError::ConfigError(
            "[toolchain].go must not be empty".to_string(),
        ));
    }
    if cfg.lint.max_line_length_limit == 0 {
        return Err(AssetflowError::ConfigError(
            "[lint].max_line_length_limit must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}
