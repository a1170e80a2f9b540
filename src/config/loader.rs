// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::layout::ProjectLayout;
use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; see [`load_and_validate`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to the built-in defaults.
///
/// The project layout is anchored at the directory containing the config
/// file (or at that directory when the file is absent), so `[paths].root`
/// is interpreted relative to it.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<(ConfigFile, ProjectLayout)> {
    let path = path.as_ref();

    let config = if path.exists() {
        debug!(path = %path.display(), "loading config");
        load_and_validate(path)?
    } else {
        debug!(path = %path.display(), "config file not found, using defaults");
        ConfigFile::try_from(RawConfigFile::default())?
    };

    let base = config_base_dir(path)?;
    let layout = ProjectLayout::resolve(&base, &config);
    Ok((config, layout))
}

fn config_base_dir(path: &Path) -> Result<PathBuf> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    if parent.is_absolute() {
        Ok(parent)
    } else {
        Ok(std::env::current_dir()?.join(parent))
    }
}

/// Default config location: `Assetflow.toml` in the current directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Assetflow.toml")
}
