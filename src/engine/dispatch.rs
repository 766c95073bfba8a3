// src/engine/dispatch.rs

//! Turning change batches into compiler or reload invocations.
//!
//! Two guarantees live here:
//! - at most one compile/reload per build id is in flight at any time, across
//!   restarts of the same id (a per-id async lock);
//! - a compile failure never escapes: it is reported and becomes a
//!   [`BuildOutcome::Failed`] value.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::BuildConfig;
use crate::engine::compiler::{
    report_diagnostic, Artifact, CompileRequest, Compiler, CompilerEnv, HotReloadTransport,
};
use crate::errors::CompileError;
use crate::fs::{collect_files, FileSystem};
use crate::types::FileClass;
use crate::watch::batch::ChangeBatch;
use crate::watch::debounce::OnBatch;
use crate::watch::filter::is_temp_file;
use crate::watch::registry::Detach;

/// Result of handling one batch (or one explicit build).
#[derive(Debug, Clone)]
pub enum BuildOutcome {
    Compiled { artifact: Artifact, elapsed: Duration },
    Failed { error: CompileError, elapsed: Duration },
    Reloaded { files: Vec<PathBuf> },
    NoOp,
}

impl BuildOutcome {
    /// `false` only for compile failures.
    pub fn is_success(&self) -> bool {
        !matches!(self, BuildOutcome::Failed { .. })
    }
}

impl fmt::Display for BuildOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildOutcome::Compiled { artifact, elapsed } => write!(
                f,
                "compiled in {}ms ({} warning(s))",
                elapsed.as_millis(),
                artifact.warnings.len()
            ),
            BuildOutcome::Failed { error, elapsed } => {
                write!(f, "failed after {}ms: ", elapsed.as_millis())?;
                match error.diagnostics.first() {
                    Some(first) => write!(f, "{first}"),
                    None => write!(f, "{error}"),
                }
            }
            BuildOutcome::Reloaded { files } => write!(f, "reloaded {} support file(s)", files.len()),
            BuildOutcome::NoOp => f.write_str("nothing to do"),
        }
    }
}

pub struct BuildDispatcher {
    compiler: Arc<dyn Compiler>,
    transport: Arc<dyn HotReloadTransport>,
    fs: Arc<dyn FileSystem>,
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    last_outcomes: Mutex<BTreeMap<String, BuildOutcome>>,
}

impl fmt::Debug for BuildDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildDispatcher").finish_non_exhaustive()
    }
}

impl BuildDispatcher {
    pub fn new(
        compiler: Arc<dyn Compiler>,
        transport: Arc<dyn HotReloadTransport>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            compiler,
            transport,
            fs,
            in_flight: Mutex::new(HashMap::new()),
            last_outcomes: Mutex::new(BTreeMap::new()),
        }
    }

    fn build_lock(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(id.to_string()).or_default())
    }

    fn record(&self, id: &str, outcome: &BuildOutcome) {
        self.last_outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), outcome.clone());
    }

    /// Outcome of the most recent dispatch for `id`, if any.
    pub fn last_outcome(&self, id: &str) -> Option<BuildOutcome> {
        self.last_outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Classify `batch` and act on it:
    /// - any compiled source changed: full compile (support files ride along
    ///   and are reloaded after a successful compile);
    /// - only support files changed: lightweight reload;
    /// - otherwise nothing.
    pub async fn handle(
        &self,
        config: &BuildConfig,
        env: &mut CompilerEnv,
        batch: &ChangeBatch,
    ) -> BuildOutcome {
        let lock = self.build_lock(&config.id);
        let _guard = lock.lock().await;

        let outcome = if !batch.compiled_source_files().is_empty() {
            info!(
                build = %config.id,
                changed = ?batch.compiled_source_files(),
                "source change; recompiling"
            );
            let outcome = self.compile_locked(config, env).await;
            if outcome.is_success() && !batch.support_files().is_empty() {
                self.transport.support_files_changed(
                    &config.id,
                    &config.connect_metadata,
                    batch.support_files(),
                );
            }
            outcome
        } else if !batch.support_files().is_empty() {
            info!(build = %config.id, files = ?batch.support_files(), "support files changed; reloading");
            self.transport.support_files_changed(
                &config.id,
                &config.connect_metadata,
                batch.support_files(),
            );
            BuildOutcome::Reloaded {
                files: batch.support_files().to_vec(),
            }
        } else {
            debug!(build = %config.id, events = batch.len(), "batch has nothing to dispatch");
            BuildOutcome::NoOp
        };

        self.record(&config.id, &outcome);
        outcome
    }

    /// Full compile of `config`, serialized with any other dispatch for the
    /// same id.
    pub async fn compile(&self, config: &BuildConfig, env: &mut CompilerEnv) -> BuildOutcome {
        let lock = self.build_lock(&config.id);
        let _guard = lock.lock().await;
        let outcome = self.compile_locked(config, env).await;
        self.record(&config.id, &outcome);
        outcome
    }

    async fn compile_locked(&self, config: &BuildConfig, env: &mut CompilerEnv) -> BuildOutcome {
        let started = Instant::now();
        info!(build = %config.id, "compile started");

        let inputs = match self.collect_inputs(config).await {
            Ok(inputs) => inputs,
            Err(err) => {
                let error = CompileError::message(format!("collecting inputs: {err:#}"));
                return self.failed(config, error, started.elapsed());
            }
        };

        let request = CompileRequest {
            id: &config.id,
            inputs: &inputs,
            options: &config.compiler_options,
            output_to: &config.output_to,
            output_dir: &config.output_dir,
        };

        let result = self.compiler.build(request, env).await;
        let elapsed = started.elapsed();

        match result {
            Ok(artifact) => {
                env.record_invocation(Some(&artifact.output));
                for warning in &artifact.warnings {
                    report_diagnostic(&config.id, warning);
                }
                info!(
                    build = %config.id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    output = ?artifact.output,
                    "compile succeeded"
                );
                self.transport
                    .compiled(&config.id, &config.connect_metadata, &artifact);
                BuildOutcome::Compiled { artifact, elapsed }
            }
            Err(error) => {
                env.record_invocation(None);
                self.failed(config, error, elapsed)
            }
        }
    }

    fn failed(&self, config: &BuildConfig, error: CompileError, elapsed: Duration) -> BuildOutcome {
        for diagnostic in &error.diagnostics {
            report_diagnostic(&config.id, diagnostic);
        }
        error!(
            build = %config.id,
            elapsed_ms = elapsed.as_millis() as u64,
            diagnostics = error.diagnostics.len(),
            "compile failed; still watching"
        );
        BuildOutcome::Failed { error, elapsed }
    }

    /// The build's full input set: every compiled-source file under its watch
    /// paths, sorted.
    async fn collect_inputs(&self, config: &BuildConfig) -> anyhow::Result<Vec<PathBuf>> {
        let fs = Arc::clone(&self.fs);
        let roots = config.watch_paths.clone();
        let options = config.reload_options.clone();

        tokio::task::spawn_blocking(move || {
            let mut inputs = Vec::new();
            for root in &roots {
                let files = collect_files(fs.as_ref(), root, |p| {
                    !is_temp_file(p)
                        && p.extension()
                            .and_then(|e| e.to_str())
                            .and_then(|e| options.classify(e))
                            == Some(FileClass::Compiled)
                })?;
                for f in files {
                    if !inputs.contains(&f) {
                        inputs.push(f);
                    }
                }
            }
            Ok::<_, anyhow::Error>(inputs)
        })
        .await?
    }
}

/// Handle of a build's dispatch worker.
///
/// Retiring it stops the worker from picking up further batches; a dispatch
/// already running finishes normally and its result is only logged.
#[derive(Debug)]
pub struct WorkerHandle {
    id: String,
    active: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn retire(&self) {
        self.active.store(false, Ordering::SeqCst);
        debug!(build = %self.id, "dispatch worker retired");
    }
}

impl Detach for WorkerHandle {
    fn detach(self: Box<Self>) {
        self.retire();
    }
}

pub type BatchReceiver = mpsc::UnboundedReceiver<ChangeBatch>;

/// Create the handler a watch descriptor dispatches into, plus the receiving
/// end for the worker.
pub fn batch_channel(id: &str) -> (OnBatch, BatchReceiver) {
    let (tx, rx) = mpsc::unbounded_channel::<ChangeBatch>();
    let id = id.to_string();
    let handler: OnBatch = Arc::new(move |batch: ChangeBatch| {
        if tx.send(batch).is_err() {
            debug!(build = %id, "batch dropped: dispatch worker gone");
        }
    });
    (handler, rx)
}

/// Spawn the worker that processes a build's batches strictly one after
/// another, in arrival order.
pub fn spawn_worker(
    dispatcher: Arc<BuildDispatcher>,
    config: Arc<BuildConfig>,
    mut env: CompilerEnv,
    mut batches: BatchReceiver,
) -> WorkerHandle {
    let active = Arc::new(AtomicBool::new(true));
    let id = config.id.clone();

    let task = {
        let active = Arc::clone(&active);
        tokio::spawn(async move {
            debug!(build = %config.id, "dispatch worker started");
            while let Some(batch) = batches.recv().await {
                if !active.load(Ordering::SeqCst) {
                    break;
                }
                let outcome = dispatcher.handle(&config, &mut env, &batch).await;
                if active.load(Ordering::SeqCst) {
                    debug!(build = %config.id, %outcome, "batch dispatched");
                } else {
                    warn!(build = %config.id, %outcome, "build stopped during dispatch; result discarded");
                }
            }
            debug!(build = %config.id, "dispatch worker finished");
        })
    };

    WorkerHandle { id, active, task }
}
