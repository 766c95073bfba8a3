#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use toml::{Table, Value};

use buildwatch::config::{CliInput, ResolveBase, BUILD_FILE_SUFFIX, DEFAULT_PROJECT_CONFIG};

/// A throwaway project directory.
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp project dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Write a file, creating parent directories.
    pub fn write(&self, rel: impl AsRef<Path>, contents: &str) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write file");
        path
    }

    pub fn mkdir(&self, rel: impl AsRef<Path>) -> PathBuf {
        let path = self.path(rel);
        fs::create_dir_all(&path).expect("create dir");
        path
    }

    /// Write `buildwatch.toml` in the project root.
    pub fn write_project_config(&self, options: &Table) -> PathBuf {
        let text = toml::to_string(options).expect("serialise project config");
        self.write(DEFAULT_PROJECT_CONFIG, &text)
    }

    /// Write `<id>.build.toml` into `dir` (relative to the root).
    pub fn write_build_in(&self, dir: impl AsRef<Path>, decl: &BuildDecl) -> PathBuf {
        let rel = dir.as_ref().join(format!("{}{BUILD_FILE_SUFFIX}", decl.id));
        self.write(rel, &decl.to_toml())
    }

    /// Write `<id>.build.toml` into the project root.
    pub fn write_build(&self, decl: &BuildDecl) -> PathBuf {
        self.write_build_in("", decl)
    }

    pub fn base(&self, cli: CliInput) -> ResolveBase {
        ResolveBase::new(cli, self.root(), None)
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for a per-build declaration file.
#[derive(Debug, Clone)]
pub struct BuildDecl {
    pub id: String,
    meta: Table,
    compiler: Table,
}

impl BuildDecl {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            meta: Table::new(),
            compiler: Table::new(),
        }
    }

    pub fn meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }

    pub fn compiler(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.compiler.insert(key.to_string(), value.into());
        self
    }

    pub fn main(self, main: &str) -> Self {
        self.compiler("main", main)
    }

    pub fn watch_dirs(self, dirs: &[&str]) -> Self {
        self.meta("watch-dirs", dirs.to_vec())
    }

    pub fn to_toml(&self) -> String {
        let mut doc = Table::new();
        if !self.meta.is_empty() {
            doc.insert("meta".into(), Value::Table(self.meta.clone()));
        }
        doc.insert("compiler".into(), Value::Table(self.compiler.clone()));
        toml::to_string(&doc).expect("serialise build declaration")
    }
}

/// Build a `toml::Table` from `key => value` pairs.
#[macro_export]
macro_rules! table {
    () => { ::toml::Table::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut t = ::toml::Table::new();
        $( t.insert(($key).to_string(), ::toml::Value::from($value)); )+
        t
    }};
}
