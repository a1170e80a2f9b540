// src/config/variant.rs

//! Per-invocation variant configuration.
//!
//! A [`VariantConfig`] is always built the same way: start from the
//! hard-coded default record for the variant, then apply a
//! [`VariantOverrides`] on top. Fields set in the overrides win; unset fields
//! keep the default.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::types::Variant;

/// Immutable settings for one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantConfig {
    pub variant: Variant,
    /// Directory the pipeline writes its artifacts into.
    pub destination: PathBuf,
    pub source_maps: bool,
    pub compression: bool,
    pub run_after_build: bool,
    pub lint_gate: bool,
}

/// Optional overrides, right-biased when merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VariantOverrides {
    #[serde(default)]
    pub destination: Option<PathBuf>,
    #[serde(default)]
    pub source_maps: Option<bool>,
    #[serde(default)]
    pub compression: Option<bool>,
    #[serde(default)]
    pub run_after_build: Option<bool>,
    #[serde(default)]
    pub lint_gate: Option<bool>,
}

impl VariantConfig {
    /// The hard-coded default record for a variant.
    ///
    /// dev maps and runs, dist compresses and gates on lint.
    pub fn defaults(variant: Variant, build_root: &Path) -> Self {
        let destination = build_root.join(variant.dir_name());
        match variant {
            Variant::Dev => Self {
                variant,
                destination,
                source_maps: true,
                compression: false,
                run_after_build: true,
                lint_gate: false,
            },
            Variant::Dist => Self {
                variant,
                destination,
                source_maps: false,
                compression: true,
                run_after_build: false,
                lint_gate: true,
            },
        }
    }

    /// Apply overrides on top of this record.
    pub fn with_overrides(self, overrides: &VariantOverrides) -> Self {
        Self {
            variant: self.variant,
            destination: overrides.destination.clone().unwrap_or(self.destination),
            source_maps: overrides.source_maps.unwrap_or(self.source_maps),
            compression: overrides.compression.unwrap_or(self.compression),
            run_after_build: overrides.run_after_build.unwrap_or(self.run_after_build),
            lint_gate: overrides.lint_gate.unwrap_or(self.lint_gate),
        }
    }

    /// Defaults-then-override constructor.
    pub fn resolve(variant: Variant, build_root: &Path, overrides: &VariantOverrides) -> Self {
        Self::defaults(variant, build_root).with_overrides(overrides)
    }

    /// Value of the runtime-mode marker handed to the server binary.
    pub fn environment(&self) -> &'static str {
        self.variant.environment()
    }
}
