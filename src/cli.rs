// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use toml::{Table, Value};

use crate::config::CliInput;
use crate::types::Optimizations;

/// Command-line arguments for `buildwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "buildwatch",
    version,
    about = "Watch sources and rebuild named builds incrementally.",
    long_about = None
)]
pub struct CliArgs {
    /// Mode word: `repl`, `serve` or `build-once`. Omit for the default mode.
    #[arg(value_name = "MODE")]
    pub positional: Vec<String>,

    /// Build to start in the foreground (repeatable).
    ///
    /// If neither this nor `--background-build` is given, every
    /// `*.build.toml` in the build directory is started.
    #[arg(short = 'b', long = "build", value_name = "ID")]
    pub builds: Vec<String>,

    /// Build to start in the background (repeatable).
    #[arg(short = 'B', long = "background-build", value_name = "ID")]
    pub background_builds: Vec<String>,

    /// Extra path to watch (repeatable). Takes precedence over `watch-dirs`.
    #[arg(short, long, value_name = "PATH")]
    pub watch: Vec<PathBuf>,

    /// Entry point, overriding `[compiler].main`.
    #[arg(short, long, value_name = "NAME")]
    pub main: Option<String>,

    /// Optimization level passed to the compiler.
    #[arg(short = 'O', long, value_name = "LEVEL", value_parser = parse_optimizations)]
    pub optimizations: Option<Optimizations>,

    #[arg(long, value_name = "PATH")]
    pub output_to: Option<PathBuf>,

    #[arg(long, value_name = "PATH")]
    pub output_dir: Option<PathBuf>,

    /// Disable live reload regardless of configuration.
    #[arg(long)]
    pub no_reload: bool,

    /// Server option override, `key=value` (repeatable).
    #[arg(long = "server", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub server: Vec<(String, Value)>,

    /// Path to the project config, relative to the project root.
    ///
    /// Default: `buildwatch.toml`.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Project root. Default: the current working directory.
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BUILDWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl CliArgs {
    /// The part of the command line the config resolver consumes.
    pub fn to_cli_input(&self) -> CliInput {
        let server: Table = self.server.iter().cloned().collect();
        CliInput {
            positional: self.positional.clone(),
            watch: self.watch.clone(),
            main: self.main.clone(),
            optimizations: self.optimizations,
            output_to: self.output_to.clone(),
            output_dir: self.output_dir.clone(),
            no_reload: self.no_reload,
            server,
        }
    }

    /// Foreground and background build ids, each without repeats. An id
    /// named in both lists runs in the foreground.
    pub fn build_selection(&self) -> (Vec<String>, Vec<String>) {
        let mut foreground: Vec<String> = Vec::new();
        for id in &self.builds {
            if !foreground.contains(id) {
                foreground.push(id.clone());
            }
        }
        let mut background: Vec<String> = Vec::new();
        for id in &self.background_builds {
            if !foreground.contains(id) && !background.contains(id) {
                background.push(id.clone());
            }
        }
        (foreground, background)
    }
}

fn parse_optimizations(s: &str) -> Result<Optimizations, String> {
    s.parse()
}

/// Parse `key=value`. The value is read as a TOML scalar when it is one
/// (`port=9000`, `open=true`) and kept as a plain string otherwise.
pub fn parse_key_value(s: &str) -> Result<(String, Value), String> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in `{s}`"));
    }
    let raw = raw.trim();
    let value = toml::from_str::<Table>(&format!("v = {raw}"))
        .ok()
        .and_then(|mut t| t.remove("v"))
        .unwrap_or_else(|| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
