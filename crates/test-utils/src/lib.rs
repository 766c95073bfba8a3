pub mod builders;
pub mod fake_compiler;

use std::sync::{Arc, Once};
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

use buildwatch::config::ResolveBase;
use buildwatch::engine::{BuildDispatcher, LifecycleController};
use buildwatch::fs::RealFileSystem;
use buildwatch::watch::WatchRegistry;

use crate::fake_compiler::{FakeCompiler, RecordingTransport};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Poll `cond` every 10ms until it holds or `limit` elapses. Returns whether
/// it held.
pub async fn wait_until<F>(limit: Duration, mut cond: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// A controller over the real filesystem with fake collaborators.
pub struct Harness {
    pub controller: LifecycleController,
    pub compiler: Arc<FakeCompiler>,
    pub transport: Arc<RecordingTransport>,
    pub dispatcher: Arc<BuildDispatcher>,
}

impl Harness {
    pub fn new(base: ResolveBase) -> Self {
        Self::with_compiler(base, FakeCompiler::new())
    }

    pub fn with_compiler(base: ResolveBase, compiler: FakeCompiler) -> Self {
        let compiler = Arc::new(compiler);
        let transport = Arc::new(RecordingTransport::default());
        let fs = Arc::new(RealFileSystem);
        let dispatcher = Arc::new(BuildDispatcher::new(
            compiler.clone(),
            transport.clone(),
            fs.clone(),
        ));
        let controller = LifecycleController::new(
            base,
            Arc::new(WatchRegistry::new()),
            dispatcher.clone(),
            fs,
        );
        Self {
            controller,
            compiler,
            transport,
            dispatcher,
        }
    }
}
