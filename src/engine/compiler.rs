// src/engine/compiler.rs

//! Collaborator seams: the compiler and the hot-reload transport.
//!
//! The orchestrator never compiles anything itself. It talks to a
//! [`Compiler`] and, after a successful compile or a support-file change, to a
//! [`HotReloadTransport`]. Production uses [`super::command::CommandCompiler`]
//! and [`LogTransport`]; tests plug in recording fakes.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use toml::Table;
use tracing::{error, info, warn};

use crate::errors::CompileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// One compiler message, with file context when the compiler gave any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub file: Option<PathBuf>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            file: None,
            line: None,
            column: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(message)
        }
    }

    pub fn at(mut self, file: impl Into<PathBuf>, line: Option<u32>, column: Option<u32>) -> Self {
        self.file = Some(file.into());
        self.line = line;
        self.column = column;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line, self.column) {
            (Some(file), Some(line), Some(col)) => {
                write!(f, "{}:{line}:{col}: {}", file.display(), self.message)
            }
            (Some(file), Some(line), None) => write!(f, "{}:{line}: {}", file.display(), self.message),
            (Some(file), None, _) => write!(f, "{}: {}", file.display(), self.message),
            (None, _, _) => f.write_str(&self.message),
        }
    }
}

/// The single place compiler diagnostics are reported.
pub fn report_diagnostic(build: &str, diagnostic: &Diagnostic) {
    let file = diagnostic.file.as_ref().map(|f| f.display().to_string());
    match diagnostic.severity {
        Severity::Warning => warn!(
            build = %build,
            file = ?file,
            line = ?diagnostic.line,
            column = ?diagnostic.column,
            "compiler warning: {}",
            diagnostic.message
        ),
        Severity::Error => error!(
            build = %build,
            file = ?file,
            line = ?diagnostic.line,
            column = ?diagnostic.column,
            "compiler error: {}",
            diagnostic.message
        ),
    }
}

/// What a successful compile produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub output: PathBuf,
    pub warnings: Vec<Diagnostic>,
}

/// Per-build compiler state, reused across incremental compiles of the same
/// build and never shared between builds.
#[derive(Debug, Clone, Default)]
pub struct CompilerEnv {
    build_id: String,
    invocations: u64,
    last_output: Option<PathBuf>,
    /// Free-form state a compiler may keep between invocations.
    pub state: Table,
}

impl CompilerEnv {
    pub fn new(build_id: impl Into<String>) -> Self {
        Self {
            build_id: build_id.into(),
            ..Self::default()
        }
    }

    pub fn build_id(&self) -> &str {
        &self.build_id
    }

    pub fn invocations(&self) -> u64 {
        self.invocations
    }

    pub fn last_output(&self) -> Option<&Path> {
        self.last_output.as_deref()
    }

    pub(crate) fn record_invocation(&mut self, output: Option<&Path>) {
        self.invocations += 1;
        if let Some(out) = output {
            self.last_output = Some(out.to_path_buf());
        }
    }
}

/// Inputs of one compiler invocation.
#[derive(Debug, Clone, Copy)]
pub struct CompileRequest<'a> {
    pub id: &'a str,
    /// The build's full input set, not just the files that changed.
    pub inputs: &'a [PathBuf],
    pub options: &'a Table,
    pub output_to: &'a Path,
    pub output_dir: &'a Path,
}

pub type CompileFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Artifact, CompileError>> + Send + 'a>>;

/// The external compiler.
///
/// Implementations must tolerate being invoked repeatedly with the same
/// `env`; the caller guarantees invocations for one build never overlap.
pub trait Compiler: Send + Sync {
    fn build<'a>(&'a self, request: CompileRequest<'a>, env: &'a mut CompilerEnv)
        -> CompileFuture<'a>;
}

/// Receives reload notifications for connected clients.
pub trait HotReloadTransport: Send + Sync {
    fn compiled(&self, build: &str, connect: &BTreeMap<String, String>, artifact: &Artifact);
    fn support_files_changed(
        &self,
        build: &str,
        connect: &BTreeMap<String, String>,
        files: &[PathBuf],
    );
}

/// Transport that only logs; used when no client transport is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

impl HotReloadTransport for LogTransport {
    fn compiled(&self, build: &str, connect: &BTreeMap<String, String>, artifact: &Artifact) {
        info!(
            build = %build,
            connect = ?connect,
            output = ?artifact.output,
            "reload: compiled artifact ready"
        );
    }

    fn support_files_changed(
        &self,
        build: &str,
        connect: &BTreeMap<String, String>,
        files: &[PathBuf],
    ) {
        info!(build = %build, connect = ?connect, files = ?files, "reload: support files changed");
    }
}
