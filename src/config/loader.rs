// src/config/loader.rs

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use toml::{Table, Value};
use tracing::debug;

use crate::config::model::BuildDeclaration;
use crate::errors::ConfigError;

/// Project-level document looked up in the project root when `--config` is
/// not given.
pub const DEFAULT_PROJECT_CONFIG: &str = "buildwatch.toml";

/// Suffix of per-build declaration files: build `dev` lives in
/// `dev.build.toml`.
pub const BUILD_FILE_SUFFIX: &str = ".build.toml";

/// Read and parse a TOML document into a raw table.
pub fn load_table(path: &Path) -> Result<Table, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str::<Table>(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the project-level document.
///
/// A missing file is not an error: the first resolver step only merges the
/// document "if present".
pub fn load_project_document(path: &Path) -> Result<Option<Table>, ConfigError> {
    match fs::metadata(path) {
        Ok(_) => {
            debug!(path = ?path, "loading project config");
            load_table(path).map(Some)
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = ?path, "no project config; using defaults");
            Ok(None)
        }
        Err(source) => Err(ConfigError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

pub fn build_declaration_path(build_dir: &Path, id: &str) -> PathBuf {
    build_dir.join(format!("{id}{BUILD_FILE_SUFFIX}"))
}

/// Load `<build_dir>/<id>.build.toml` and split it into `[meta]` and
/// `[compiler]`.
pub fn load_build_declaration(build_dir: &Path, id: &str) -> Result<BuildDeclaration, ConfigError> {
    let path = build_declaration_path(build_dir, id);
    if !path.is_file() {
        return Err(ConfigError::MissingBuild {
            id: id.to_string(),
            path,
        });
    }

    let mut doc = load_table(&path)?;
    let meta = take_table(&mut doc, "meta", &path)?;
    let compiler = take_table(&mut doc, "compiler", &path)?;

    if let Some(extra) = doc.keys().next() {
        return Err(ConfigError::Schema {
            origin: path.display().to_string(),
            message: format!(
                "unexpected top-level key '{extra}' (expected only [meta] and [compiler])"
            ),
        });
    }

    Ok(BuildDeclaration {
        id: id.to_string(),
        path,
        meta,
        compiler,
    })
}

/// List build ids declared in `build_dir`, sorted.
pub fn discover_build_ids(build_dir: &Path) -> Result<Vec<String>, ConfigError> {
    let entries = fs::read_dir(build_dir).map_err(|source| ConfigError::Read {
        path: build_dir.to_path_buf(),
        source,
    })?;

    let mut ids = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        if let Some(id) = name.to_str().and_then(|n| n.strip_suffix(BUILD_FILE_SUFFIX)) {
            if !id.is_empty() {
                ids.push(id.to_string());
            }
        }
    }
    ids.sort();
    Ok(ids)
}

fn take_table(doc: &mut Table, key: &str, path: &Path) -> Result<Table, ConfigError> {
    match doc.remove(key) {
        None => Ok(Table::new()),
        Some(Value::Table(t)) => Ok(t),
        Some(other) => Err(ConfigError::Schema {
            origin: path.display().to_string(),
            message: format!("[{key}] must be a table, found {}", other.type_str()),
        }),
    }
}
