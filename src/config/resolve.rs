// src/config/resolve.rs

//! The configuration resolver.
//!
//! A build's effective configuration is produced by folding its sources
//! through a fixed, ordered list of pure steps (see [`PIPELINE`]). Each step
//! takes the accumulated [`Resolution`] and returns the next one; the order
//! matters because later steps read what earlier steps derived.
//!
//! The result is an immutable [`BuildConfig`]. Nothing patches a
//! `BuildConfig` after the fact: picking up configuration changes means
//! resolving again from the original [`ResolveBase`].

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use toml::{Table, Value};
use tracing::{debug, trace, warn};

use crate::config::loader::{
    load_build_declaration, load_project_document, DEFAULT_PROJECT_CONFIG,
};
use crate::config::merge::{merge_all, merge_tables};
use crate::config::model::{BuildDeclaration, BuildOptions, CompilerView};
use crate::config::validate::validate_document;
use crate::errors::ConfigError;
use crate::types::{Mode, Optimizations, ReloadOptions};

/// Marker directory segment used to derive the public asset path.
pub const PUBLIC_MARKER: &str = "public";
pub const DEFAULT_TARGET_DIR: &str = "target";
pub const DEFAULT_ARTIFACT_EXTENSION: &str = "js";
pub const DEFAULT_SOURCE_PATH: &str = "src";

/// Command-line input, independent of how it was parsed.
#[derive(Debug, Clone, Default)]
pub struct CliInput {
    /// Positional words; the first one selects the mode.
    pub positional: Vec<String>,
    /// Explicit `--watch` paths.
    pub watch: Vec<PathBuf>,
    pub main: Option<String>,
    pub optimizations: Option<Optimizations>,
    pub output_to: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    /// `--no-reload`: explicitly disables live reload.
    pub no_reload: bool,
    /// `--server key=value` overrides for REPL/server-facing options.
    pub server: Table,
}

impl CliInput {
    /// The mode named by the first positional word.
    pub fn mode(&self) -> Result<Mode, ConfigError> {
        match self.positional.first() {
            Some(word) => word.parse::<Mode>().map_err(ConfigError::Invalid),
            None => Ok(Mode::Default),
        }
    }
}

/// The effective configuration of one build.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfig {
    pub id: String,
    pub mode: Mode,
    pub main: Option<String>,
    /// Ordered, deduplicated, all existing.
    pub watch_paths: Vec<PathBuf>,
    /// Opaque options handed to the compiler, including the resolved
    /// `main`, `optimizations`, `output-to` and `output-dir`.
    pub compiler_options: Table,
    pub optimizations: Optimizations,
    pub live_reload: bool,
    pub output_to: PathBuf,
    pub output_dir: PathBuf,
    /// Path of the output directory below the public marker, if any.
    pub asset_path: Option<String>,
    pub reload_options: ReloadOptions,
    /// Identity used to correlate a running client with this build.
    pub connect_metadata: BTreeMap<String, String>,
    /// REPL/server-facing options.
    pub server_options: Table,
}

/// Everything needed to resolve any build again from scratch.
#[derive(Debug, Clone)]
pub struct ResolveBase {
    pub cli: CliInput,
    pub root: PathBuf,
    pub project_config: PathBuf,
}

impl ResolveBase {
    pub fn new(cli: CliInput, root: impl Into<PathBuf>, project_config: Option<PathBuf>) -> Self {
        let root = root.into();
        let project_config = match project_config {
            Some(p) => root.join(p),
            None => root.join(DEFAULT_PROJECT_CONFIG),
        };
        Self {
            cli,
            root,
            project_config,
        }
    }

    /// Directory holding the `<id>.build.toml` declarations.
    pub fn build_dir(&self) -> Result<PathBuf, ConfigError> {
        let project = load_project_document(&self.project_config)?;
        build_dir_from(&self.root, project.as_ref())
    }

    /// Read every source from disk and resolve build `id`.
    pub fn resolve_build(&self, id: &str) -> Result<BuildConfig, ConfigError> {
        let project = load_project_document(&self.project_config)?;
        let build_dir = build_dir_from(&self.root, project.as_ref())?;
        let declaration = load_build_declaration(&build_dir, id)?;
        resolve(&self.cli, &self.root, project, declaration)
    }
}

fn build_dir_from(root: &Path, project: Option<&Table>) -> Result<PathBuf, ConfigError> {
    let dir = match project {
        Some(table) => BuildOptions::from_table(table, "project config")?.build_dir,
        None => None,
    };
    Ok(dir.map(|d| root.join(d)).unwrap_or_else(|| root.to_path_buf()))
}

/// Accumulated state threaded through the pipeline.
#[derive(Debug, Clone)]
pub struct Resolution {
    cli: CliInput,
    root: PathBuf,
    id: String,
    project: Option<Table>,
    declaration: BuildDeclaration,
    options: Table,
    compiler: Table,
    mode: Mode,
    main: Option<String>,
    watch_paths: Vec<PathBuf>,
    live_reload: bool,
    output_to: Option<PathBuf>,
    configured_output_dir: Option<PathBuf>,
    asset_path: Option<String>,
    server: Table,
}

type Step = fn(Resolution) -> Result<Resolution, ConfigError>;

/// The resolver steps, in order.
pub const PIPELINE: &[(&str, Step)] = &[
    ("merge-project-config", merge_project_config),
    ("merge-build-metadata", merge_build_metadata),
    ("derive-mode", derive_mode),
    ("derive-main", derive_main),
    ("derive-watch-paths", derive_watch_paths),
    ("derive-live-reload", derive_live_reload),
    ("default-output-paths", default_output_paths),
    ("default-asset-path", default_asset_path),
    ("finalize-server-options", finalize_server_options),
];

/// Resolve one build from already-loaded sources.
pub fn resolve(
    cli: &CliInput,
    root: &Path,
    project: Option<Table>,
    declaration: BuildDeclaration,
) -> Result<BuildConfig, ConfigError> {
    let mut state = Resolution {
        cli: cli.clone(),
        root: root.to_path_buf(),
        id: declaration.id.clone(),
        project,
        declaration,
        options: Table::new(),
        compiler: Table::new(),
        mode: Mode::Default,
        main: None,
        watch_paths: Vec::new(),
        live_reload: false,
        output_to: None,
        configured_output_dir: None,
        asset_path: None,
        server: Table::new(),
    };

    for (name, step) in PIPELINE {
        trace!(build = %state.id, step = *name, "resolver step");
        state = step(state)?;
    }

    let config = finish(state)?;
    debug!(
        build = %config.id,
        mode = ?config.mode,
        live_reload = config.live_reload,
        watch_paths = ?config.watch_paths,
        "resolved build config"
    );
    Ok(config)
}

fn options_view(state: &Resolution) -> Result<BuildOptions, ConfigError> {
    BuildOptions::from_table(&state.options, &state.id)
}

fn compiler_view(state: &Resolution) -> Result<CompilerView, ConfigError> {
    CompilerView::from_table(&state.compiler, &state.id)
}

fn path_value(path: &Path) -> Value {
    Value::String(path.to_string_lossy().into_owned())
}

// 1.
fn merge_project_config(mut state: Resolution) -> Result<Resolution, ConfigError> {
    if let Some(project) = &state.project {
        state.options = merge_tables(std::mem::take(&mut state.options), project.clone());
    }
    Ok(state)
}

// 2. Build-specific options override the project document. Schema validation
// runs here because `validate-config` itself may come from either source.
fn merge_build_metadata(mut state: Resolution) -> Result<Resolution, ConfigError> {
    let meta = state.declaration.meta.clone();
    state.options = merge_tables(std::mem::take(&mut state.options), meta);

    if options_view(&state)?.validation_enabled() {
        if let Some(project) = &state.project {
            validate_document("project config", project, None)?;
        }
        let origin = state.declaration.path.display().to_string();
        validate_document(
            &origin,
            &state.declaration.meta,
            Some(&state.declaration.compiler),
        )?;
    }

    let mut overrides = Table::new();
    if let Some(opt) = state.cli.optimizations {
        overrides.insert("optimizations".into(), Value::String(opt.to_string()));
    }
    if let Some(p) = &state.cli.output_to {
        overrides.insert("output-to".into(), path_value(p));
    }
    if let Some(p) = &state.cli.output_dir {
        overrides.insert("output-dir".into(), path_value(p));
    }
    state.compiler = merge_all([state.declaration.compiler.clone(), overrides]);
    Ok(state)
}

// 3.
fn derive_mode(mut state: Resolution) -> Result<Resolution, ConfigError> {
    state.mode = state.cli.mode()?;
    if state.cli.positional.len() > 1 {
        warn!(
            ignored = ?&state.cli.positional[1..],
            "only the first positional word selects the mode"
        );
    }
    Ok(state)
}

// 4.
fn derive_main(mut state: Resolution) -> Result<Resolution, ConfigError> {
    let main = match &state.cli.main {
        Some(m) => Some(m.clone()),
        None => compiler_view(&state)?.main,
    };
    if let Some(m) = &main {
        state.compiler.insert("main".into(), Value::String(m.clone()));
    }
    state.main = main;
    Ok(state)
}

// 5.
fn derive_watch_paths(mut state: Resolution) -> Result<Resolution, ConfigError> {
    let opts = options_view(&state)?;

    let mut candidates: Vec<PathBuf> = state.cli.watch.clone();
    candidates.extend(opts.watch_dirs.clone().unwrap_or_default());

    let mut resolved: Vec<PathBuf> = Vec::with_capacity(candidates.len() + 1);
    for path in candidates {
        let abs = state.root.join(&path);
        if !abs.exists() {
            return Err(ConfigError::MissingWatchPath(abs));
        }
        push_distinct(&mut resolved, abs);
    }

    if let Some(main) = &state.main {
        let source_paths = opts
            .source_paths
            .clone()
            .unwrap_or_else(|| vec![PathBuf::from(DEFAULT_SOURCE_PATH)]);
        let extensions = opts
            .compiled_extensions
            .clone()
            .unwrap_or_else(|| ReloadOptions::default().compiled_extensions);
        match implied_watch_path(&state.root, main, &source_paths, &extensions) {
            Some(dir) => push_distinct(&mut resolved, dir),
            None => debug!(build = %state.id, main = %main, "entry point not found in source paths"),
        }
    }

    state.watch_paths = resolved;
    Ok(state)
}

fn push_distinct(paths: &mut Vec<PathBuf>, path: PathBuf) {
    if !paths.contains(&path) {
        paths.push(path);
    }
}

/// Directory implied by the entry point's location.
///
/// `main` is either a file path (its parent directory is watched) or a
/// dotted name such as `app.core`, looked up as `app/core.<ext>` under each
/// source path; the source path that contains it is watched.
fn implied_watch_path(
    root: &Path,
    main: &str,
    source_paths: &[PathBuf],
    extensions: &[String],
) -> Option<PathBuf> {
    if main.contains('/') || main.contains('\\') {
        let file = root.join(main);
        return file
            .is_file()
            .then(|| file.parent().map(Path::to_path_buf))
            .flatten();
    }

    let rel = main.replace('.', "/").replace('-', "_");
    source_paths.iter().map(|sp| root.join(sp)).find(|dir| {
        extensions
            .iter()
            .any(|ext| dir.join(format!("{rel}.{ext}")).is_file())
    })
}

// 6.
fn derive_live_reload(mut state: Resolution) -> Result<Resolution, ConfigError> {
    let reload_enabled = !state.cli.no_reload && options_view(&state)?.reload.unwrap_or(true);
    let optimizations = compiler_view(&state)?.optimizations.unwrap_or_default();
    let watching = state.mode == Mode::Repl || !state.watch_paths.is_empty();

    state.live_reload = reload_enabled && watching && optimizations == Optimizations::None;
    Ok(state)
}

// 7.
fn default_output_paths(mut state: Resolution) -> Result<Resolution, ConfigError> {
    let opts = options_view(&state)?;
    let view = compiler_view(&state)?;

    let out_root = opts
        .target_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TARGET_DIR))
        .join(PUBLIC_MARKER)
        .join("out");
    let ext = opts
        .artifact_extension
        .unwrap_or_else(|| DEFAULT_ARTIFACT_EXTENSION.to_string());

    let output_dir = view.output_dir.unwrap_or_else(|| out_root.join(&state.id));
    let output_to = view
        .output_to
        .unwrap_or_else(|| out_root.join(format!("{}-main.{ext}", state.id)));

    state
        .compiler
        .insert("output-dir".into(), path_value(&state.root.join(&output_dir)));
    state
        .compiler
        .insert("output-to".into(), path_value(&state.root.join(&output_to)));

    state.configured_output_dir = Some(output_dir);
    state.output_to = Some(output_to);
    Ok(state)
}

// 8.
fn default_asset_path(mut state: Resolution) -> Result<Resolution, ConfigError> {
    state.asset_path = state
        .configured_output_dir
        .as_deref()
        .and_then(asset_path_for);
    Ok(state)
}

/// Everything after the last `public` segment, joined with `/`.
pub fn asset_path_for(output_dir: &Path) -> Option<String> {
    let parts: Vec<String> = output_dir
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    let marker = parts.iter().rposition(|p| p == PUBLIC_MARKER)?;
    let rest = &parts[marker + 1..];
    (!rest.is_empty()).then(|| rest.join("/"))
}

// 9. Config file < computed paths < command line.
fn finalize_server_options(mut state: Resolution) -> Result<Resolution, ConfigError> {
    let configured = options_view(&state)?.server.unwrap_or_default();

    let mut computed = Table::new();
    for key in ["output-to", "output-dir"] {
        if let Some(v) = state.compiler.get(key) {
            computed.insert(key.into(), v.clone());
        }
    }
    if let Some(asset) = &state.asset_path {
        computed.insert("asset-path".into(), Value::String(asset.clone()));
    }

    state.server = merge_all([configured, computed, state.cli.server.clone()]);
    Ok(state)
}

fn finish(state: Resolution) -> Result<BuildConfig, ConfigError> {
    let opts = options_view(&state)?;
    let view = compiler_view(&state)?;
    let defaults = ReloadOptions::default();

    let reload_options = ReloadOptions {
        compiled_extensions: opts.compiled_extensions.unwrap_or(defaults.compiled_extensions),
        support_extensions: opts.support_extensions.unwrap_or(defaults.support_extensions),
        exclude: opts.exclude.unwrap_or(defaults.exclude),
        debounce_ms: opts.debounce_ms.unwrap_or(defaults.debounce_ms),
    };

    let mut connect_metadata = opts.connect.unwrap_or_default();
    connect_metadata.insert("build-id".to_string(), state.id.clone());

    let output_to = state
        .output_to
        .map(|p| state.root.join(p))
        .ok_or_else(|| ConfigError::Invalid("output-to was not derived".into()))?;
    let output_dir = state
        .configured_output_dir
        .map(|p| state.root.join(p))
        .ok_or_else(|| ConfigError::Invalid("output-dir was not derived".into()))?;

    Ok(BuildConfig {
        id: state.id,
        mode: state.mode,
        main: state.main,
        watch_paths: state.watch_paths,
        compiler_options: state.compiler,
        optimizations: view.optimizations.unwrap_or_default(),
        live_reload: state.live_reload,
        output_to,
        output_dir,
        asset_path: state.asset_path,
        reload_options,
        connect_metadata,
        server_options: state.server,
    })
}
