// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Operating mode derived from the positional command-line words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    Repl,
    Serve,
    BuildOnce,
    #[default]
    Default,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "repl" => Ok(Mode::Repl),
            "serve" => Ok(Mode::Serve),
            "build-once" | "once" => Ok(Mode::BuildOnce),
            other => Err(format!(
                "unknown mode: {other} (expected \"repl\", \"serve\" or \"build-once\")"
            )),
        }
    }
}

/// Optimization level passed through to the compiler.
///
/// Only `None` is compatible with live reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Optimizations {
    #[default]
    None,
    Whitespace,
    Simple,
    Advanced,
}

impl FromStr for Optimizations {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Optimizations::None),
            "whitespace" => Ok(Optimizations::Whitespace),
            "simple" => Ok(Optimizations::Simple),
            "advanced" => Ok(Optimizations::Advanced),
            other => Err(format!(
                "invalid optimizations: {other} (expected none, whitespace, simple or advanced)"
            )),
        }
    }
}

impl fmt::Display for Optimizations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Optimizations::None => "none",
            Optimizations::Whitespace => "whitespace",
            Optimizations::Simple => "simple",
            Optimizations::Advanced => "advanced",
        };
        f.write_str(s)
    }
}

pub const DEFAULT_DEBOUNCE_MS: u64 = 50;
pub const DEFAULT_COMPILED_EXTENSIONS: &[&str] = &["cljs", "cljc"];
pub const DEFAULT_SUPPORT_EXTENSIONS: &[&str] = &["js"];

/// How a changed file is treated by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    /// Requires invoking the compiler.
    Compiled,
    /// Reloaded without recompilation.
    Support,
}

/// Extension table and timing for one build.
///
/// An extension listed in both tables is treated as [`FileClass::Compiled`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadOptions {
    pub compiled_extensions: Vec<String>,
    pub support_extensions: Vec<String>,
    pub exclude: Vec<String>,
    pub debounce_ms: u64,
}

impl Default for ReloadOptions {
    fn default() -> Self {
        Self {
            compiled_extensions: DEFAULT_COMPILED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            support_extensions: DEFAULT_SUPPORT_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            exclude: Vec::new(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl ReloadOptions {
    /// Classify a file extension (without the leading dot).
    pub fn classify(&self, extension: &str) -> Option<FileClass> {
        if self.compiled_extensions.iter().any(|e| e == extension) {
            Some(FileClass::Compiled)
        } else if self.support_extensions.iter().any(|e| e == extension) {
            Some(FileClass::Support)
        } else {
            None
        }
    }
}
