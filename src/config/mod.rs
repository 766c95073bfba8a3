// src/config/mod.rs

//! Configuration loading, merging and resolution.
//!
//! Responsibilities:
//! - Load the project document and per-build declarations (`loader.rs`).
//! - Merge tables with the precedence rules shared by every source (`merge.rs`).
//! - Typed views over the raw tables (`model.rs`).
//! - Optional schema validation (`validate.rs`).
//! - Fold all sources into one immutable `BuildConfig` (`resolve.rs`).

pub mod loader;
pub mod merge;
pub mod model;
pub mod resolve;
pub mod validate;

pub use loader::{
    discover_build_ids, load_build_declaration, load_project_document, BUILD_FILE_SUFFIX,
    DEFAULT_PROJECT_CONFIG,
};
pub use merge::{merge, merge_opt, merge_tables};
pub use model::{BuildDeclaration, BuildOptions, CompilerView};
pub use resolve::{resolve, BuildConfig, CliInput, ResolveBase};
pub use validate::validate_document;
