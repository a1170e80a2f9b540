// src/config/mod.rs

//! Configuration loading and validation for assetflow.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Resolve per-variant settings from defaults plus overrides (`variant.rs`).
//! - Anchor project paths to an absolute root (`layout.rs`).
//! - Load a config file from disk (`loader.rs`) and validate it (`validate.rs`).

pub mod layout;
pub mod loader;
pub mod model;
pub mod validate;
pub mod variant;

pub use layout::ProjectLayout;
pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{
    ConfigFile, LintSection, PathsSection, RawConfigFile, ServerSection, ToolchainSection,
    VariantsSection, WatchSection,
};
pub use variant::{VariantConfig, VariantOverrides};
