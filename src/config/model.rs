// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;
use toml::{Table, Value};

use crate::errors::ConfigError;
use crate::types::Optimizations;

/// Orchestrator option keys understood in the project document and in the
/// `[meta]` table of a build declaration.
pub const KNOWN_OPTION_KEYS: &[&str] = &[
    "watch-dirs",
    "source-paths",
    "target-dir",
    "reload",
    "validate-config",
    "debounce-ms",
    "compiled-extensions",
    "support-extensions",
    "exclude",
    "artifact-extension",
    "build-dir",
    "connect",
    "server",
];

/// A per-build declaration file (`<id>.build.toml`):
///
/// ```toml
/// [meta]
/// watch-dirs = ["src"]
/// validate-config = true
///
/// [compiler]
/// main = "app.core"
/// optimizations = "none"
/// command = "mycompiler --out $BUILDWATCH_OUTPUT_TO"
/// ```
///
/// Both tables are optional. They are kept as raw tables so that they can be
/// merged key by key; typed views are derived on demand.
#[derive(Debug, Clone, Default)]
pub struct BuildDeclaration {
    pub id: String,
    pub path: PathBuf,
    /// Build-specific orchestrator options; override the project document.
    pub meta: Table,
    /// Opaque compiler options.
    pub compiler: Table,
}

/// Typed view over merged orchestrator options.
///
/// Every field is optional; defaults are applied by the resolver.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildOptions {
    #[serde(default)]
    pub watch_dirs: Option<Vec<PathBuf>>,
    #[serde(default)]
    pub source_paths: Option<Vec<PathBuf>>,
    #[serde(default)]
    pub target_dir: Option<PathBuf>,
    #[serde(default)]
    pub reload: Option<bool>,
    #[serde(default)]
    pub validate_config: Option<bool>,
    #[serde(default)]
    pub debounce_ms: Option<u64>,
    #[serde(default)]
    pub compiled_extensions: Option<Vec<String>>,
    #[serde(default)]
    pub support_extensions: Option<Vec<String>>,
    #[serde(default)]
    pub exclude: Option<Vec<String>>,
    #[serde(default)]
    pub artifact_extension: Option<String>,
    #[serde(default)]
    pub build_dir: Option<PathBuf>,
    #[serde(default)]
    pub connect: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub server: Option<Table>,
}

impl BuildOptions {
    pub fn from_table(table: &Table, origin: &str) -> Result<Self, ConfigError> {
        Value::Table(table.clone())
            .try_into()
            .map_err(|e: toml::de::Error| {
                ConfigError::Invalid(format!("{origin}: {}", e.message()))
            })
    }

    /// `validate-config` defaults to on.
    pub fn validation_enabled(&self) -> bool {
        self.validate_config.unwrap_or(true)
    }
}

/// The handful of compiler options the orchestrator itself reads. Everything
/// else in `[compiler]` is passed through untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CompilerView {
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub optimizations: Option<Optimizations>,
    #[serde(default)]
    pub output_to: Option<PathBuf>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub command: Option<String>,
}

impl CompilerView {
    pub fn from_table(table: &Table, origin: &str) -> Result<Self, ConfigError> {
        Value::Table(table.clone())
            .try_into()
            .map_err(|e: toml::de::Error| {
                ConfigError::Invalid(format!("{origin} [compiler]: {}", e.message()))
            })
    }
}
