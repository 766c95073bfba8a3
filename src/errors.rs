// src/errors.rs

//! Crate-wide error types.
//!
//! - [`ConfigError`] is fatal: it aborts a start sequence before any watch is
//!   registered.
//! - [`CompileError`] is recoverable: the dispatcher logs it and the watch
//!   stays live.
//! - Lifecycle warnings (unknown ids and the like) are not errors at all; they
//!   are reported per id by the controller (see `engine::lifecycle`).

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::compiler::Diagnostic;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("watch path does not exist: {0:?}")]
    MissingWatchPath(PathBuf),

    #[error("no build declaration for '{id}' (looked for {path:?})")]
    MissingBuild { id: String, path: PathBuf },

    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("schema validation failed for '{origin}': {message}")]
    Schema { origin: String, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// A compiler rejected its input.
#[derive(Error, Debug, Clone)]
#[error("compilation failed with {} diagnostic(s)", diagnostics.len())]
pub struct CompileError {
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileError {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }

    /// Convenience for failures that carry no file context (e.g. the compiler
    /// process could not be spawned).
    pub fn message(msg: impl Into<String>) -> Self {
        Self {
            diagnostics: vec![Diagnostic::error(msg)],
        }
    }
}

#[derive(Error, Debug)]
pub enum BuildwatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuildwatchError>;
