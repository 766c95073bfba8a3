// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub mod mock;

/// Filesystem operations used to gather compiler inputs and to clean build
/// outputs.
pub trait FileSystem: Send + Sync + Debug {
    fn exists(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;

    /// Return a list of entries in a directory.
    /// Returns full paths.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    fn remove_file(&self, path: &Path) -> Result<()>;
    fn remove_dir_all(&self, path: &Path) -> Result<()>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("reading dir {:?}", path))? {
            let entry = entry?;
            entries.push(entry.path());
        }
        Ok(entries)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).with_context(|| format!("removing file {:?}", path))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path).with_context(|| format!("removing dir {:?}", path))
    }
}

/// Recursively list files below `root` (or `root` itself if it is a file)
/// for which `keep` returns true. Sorted for stable compiler input order.
pub fn collect_files<F>(fs: &dyn FileSystem, root: &Path, keep: F) -> Result<Vec<PathBuf>>
where
    F: Fn(&Path) -> bool,
{
    if fs.is_file(root) {
        return Ok(if keep(root) { vec![root.to_path_buf()] } else { Vec::new() });
    }

    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) && keep(&path) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Delete `output_to` and everything inside `output_dir`, keeping the
/// directory itself. Returns the number of files removed.
pub fn clean_outputs(fs: &dyn FileSystem, output_to: &Path, output_dir: &Path) -> Result<usize> {
    let mut removed = 0;

    if fs.is_file(output_to) {
        fs.remove_file(output_to)?;
        removed += 1;
    }

    if fs.is_dir(output_dir) {
        removed += collect_files(fs, output_dir, |_| true)?.len();
        for entry in fs.read_dir(output_dir)? {
            if fs.is_dir(&entry) {
                fs.remove_dir_all(&entry)?;
            } else {
                fs.remove_file(&entry)?;
            }
        }
    }

    Ok(removed)
}
