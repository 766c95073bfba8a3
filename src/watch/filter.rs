// src/watch/filter.rs

use std::fmt;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::errors::ConfigError;
use crate::types::{FileClass, ReloadOptions};

/// Change-event filter for one build.
///
/// A path passes when:
/// - its extension is in the compiled or support table,
/// - it is not an editor temp/backup file,
/// - it does not match any `exclude` glob (evaluated relative to the watch
///   root that contains it).
#[derive(Clone)]
pub struct WatchFilter {
    options: ReloadOptions,
    roots: Vec<PathBuf>,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for WatchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchFilter")
            .field("compiled", &self.options.compiled_extensions)
            .field("support", &self.options.support_extensions)
            .finish_non_exhaustive()
    }
}

impl WatchFilter {
    pub fn new(options: &ReloadOptions, roots: &[PathBuf]) -> Result<Self, ConfigError> {
        let exclude_set = if options.exclude.is_empty() {
            None
        } else {
            Some(build_globset(&options.exclude)?)
        };
        Ok(Self {
            options: options.clone(),
            roots: roots.to_vec(),
            exclude_set,
        })
    }

    pub fn reload_options(&self) -> &ReloadOptions {
        &self.options
    }

    /// Classification of `path`, or `None` if the filter rejects it.
    pub fn classify(&self, path: &Path) -> Option<FileClass> {
        if is_temp_file(path) || self.is_excluded(path) {
            return None;
        }
        let ext = path.extension()?.to_str()?;
        self.options.classify(ext)
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.classify(path).is_some()
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let Some(set) = &self.exclude_set else {
            return false;
        };
        match self.relative_str(path) {
            Some(rel) => set.is_match(rel),
            None => set.is_match(path),
        }
    }

    /// Path relative to the first watch root containing it, with forward
    /// slashes.
    fn relative_str(&self, path: &Path) -> Option<String> {
        self.roots
            .iter()
            .find_map(|root| path.strip_prefix(root).ok())
            .map(|rel| rel.to_string_lossy().replace('\\', "/"))
    }
}

/// Editor artifacts: `foo~`, `.#foo`, `foo.swp`, `foo.tmp` and friends.
pub fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "swp" | "swo" | "swx" | "tmp" | "bak")
        || name.ends_with('~')
        || name.starts_with(".#")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat)
            .map_err(|e| ConfigError::Invalid(format!("invalid exclude pattern {pat}: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ConfigError::Invalid(format!("building exclude globset: {e}")))
}
