use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use toml::{Table, Value};

use buildwatch::engine::{
    Artifact, CompileFuture, CompileRequest, Compiler, CompilerEnv, Diagnostic,
    HotReloadTransport,
};
use buildwatch::errors::CompileError;

/// One recorded compiler invocation.
#[derive(Debug, Clone)]
pub struct CompileCall {
    pub id: String,
    pub inputs: Vec<PathBuf>,
    pub options: Table,
    /// How many times this env had been used before this call.
    pub prior_invocations: u64,
}

/// A fake compiler that:
/// - records every invocation
/// - optionally sleeps to simulate a slow compile
/// - fails for ids marked as failing
/// - writes a small artifact to `output_to` on success
/// - tracks the peak number of overlapping invocations per id
#[derive(Debug, Default)]
pub struct FakeCompiler {
    calls: Arc<Mutex<Vec<CompileCall>>>,
    failing: Mutex<HashSet<String>>,
    delay: Duration,
    warnings: Vec<Diagnostic>,
    running: Mutex<BTreeMap<String, usize>>,
    peak: AtomicUsize,
}

impl FakeCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_warning(mut self, warning: Diagnostic) -> Self {
        self.warnings.push(warning);
        self
    }

    pub fn set_failing(&self, id: &str, failing: bool) {
        let mut set = self.failing.lock().unwrap();
        if failing {
            set.insert(id.to_string());
        } else {
            set.remove(id);
        }
    }

    pub fn calls(&self) -> Vec<CompileCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, id: &str) -> Vec<CompileCall> {
        self.calls().into_iter().filter(|c| c.id == id).collect()
    }

    pub fn call_count(&self, id: &str) -> usize {
        self.calls_for(id).len()
    }

    /// Highest number of simultaneous invocations seen for any single id.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self, id: &str) {
        let mut running = self.running.lock().unwrap();
        let n = running.entry(id.to_string()).or_default();
        *n += 1;
        self.peak.fetch_max(*n, Ordering::SeqCst);
    }

    fn leave(&self, id: &str) {
        let mut running = self.running.lock().unwrap();
        if let Some(n) = running.get_mut(id) {
            *n -= 1;
        }
    }

    async fn run(
        &self,
        request: CompileRequest<'_>,
        env: &mut CompilerEnv,
    ) -> Result<Artifact, CompileError> {
        self.calls.lock().unwrap().push(CompileCall {
            id: request.id.to_string(),
            inputs: request.inputs.to_vec(),
            options: request.options.clone(),
            prior_invocations: env.invocations(),
        });

        let builds = env
            .state
            .get("fake-builds")
            .and_then(Value::as_integer)
            .unwrap_or(0);
        env.state.insert("fake-builds".into(), Value::Integer(builds + 1));

        self.enter(request.id);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.leave(request.id);

        if self.failing.lock().unwrap().contains(request.id) {
            let file = request
                .inputs
                .first()
                .cloned()
                .unwrap_or_else(|| PathBuf::from("unknown.cljs"));
            return Err(CompileError::new(vec![
                Diagnostic::error("unexpected end of input").at(file, Some(3), Some(7)),
            ]));
        }

        std::fs::create_dir_all(request.output_dir)
            .and_then(|_| {
                if let Some(parent) = request.output_to.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(request.output_to, format!("// {}\n", request.id))?;
                std::fs::write(request.output_dir.join("module.js"), "// module\n")
            })
            .map_err(|e| CompileError::message(format!("writing fake output: {e}")))?;

        Ok(Artifact {
            output: request.output_to.to_path_buf(),
            warnings: self.warnings.clone(),
        })
    }
}

impl Compiler for FakeCompiler {
    fn build<'a>(
        &'a self,
        request: CompileRequest<'a>,
        env: &'a mut CompilerEnv,
    ) -> CompileFuture<'a> {
        Box::pin(self.run(request, env))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Compiled {
        build: String,
        connect: BTreeMap<String, String>,
        output: PathBuf,
    },
    SupportFiles {
        build: String,
        files: Vec<PathBuf>,
    },
}

/// Records every notification it receives.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    events: Mutex<Vec<TransportEvent>>,
}

impl RecordingTransport {
    pub fn events(&self) -> Vec<TransportEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl HotReloadTransport for RecordingTransport {
    fn compiled(&self, build: &str, connect: &BTreeMap<String, String>, artifact: &Artifact) {
        self.events.lock().unwrap().push(TransportEvent::Compiled {
            build: build.to_string(),
            connect: connect.clone(),
            output: artifact.output.clone(),
        });
    }

    fn support_files_changed(
        &self,
        build: &str,
        _connect: &BTreeMap<String, String>,
        files: &[PathBuf],
    ) {
        self.events.lock().unwrap().push(TransportEvent::SupportFiles {
            build: build.to_string(),
            files: files.to_vec(),
        });
    }
}
