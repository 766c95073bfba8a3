// tests/dispatch.rs

mod common;
use crate::common::{dev_decl, dev_project, init_tracing, resolve, wait_until, with_timeout};

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use buildwatch::engine::{
    batch_channel, spawn_worker, BuildDispatcher, BuildOutcome, CompilerEnv, Diagnostic,
};
use buildwatch::fs::RealFileSystem;
use buildwatch::types::FileClass;
use buildwatch::watch::{ChangeBatch, ChangeKind, FileChangeEvent, WatchFilter};
use buildwatch_test_utils::fake_compiler::{FakeCompiler, RecordingTransport, TransportEvent};

type TestResult = Result<(), Box<dyn Error>>;

struct Setup {
    compiler: Arc<FakeCompiler>,
    transport: Arc<RecordingTransport>,
    dispatcher: Arc<BuildDispatcher>,
}

fn setup(compiler: FakeCompiler) -> Setup {
    let compiler = Arc::new(compiler);
    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = Arc::new(BuildDispatcher::new(
        compiler.clone(),
        transport.clone(),
        Arc::new(RealFileSystem),
    ));
    Setup {
        compiler,
        transport,
        dispatcher,
    }
}

fn batch(paths: &[PathBuf], config: &buildwatch::config::BuildConfig) -> ChangeBatch {
    let filter = WatchFilter::new(&config.reload_options, &config.watch_paths).unwrap();
    let events = paths
        .iter()
        .map(|p| FileChangeEvent::new(p.clone(), ChangeKind::Modified))
        .collect();
    ChangeBatch::classify(events, &filter)
}

#[tokio::test]
async fn compiled_change_recompiles_the_full_input_set() -> TestResult {
    init_tracing();
    let project = dev_project();
    project.write("src/app/.#core.cljs", "lock file");
    project.write("src/app/style.js", "");
    let config = resolve(&project, "dev");
    let s = setup(FakeCompiler::new());
    let mut env = CompilerEnv::new("dev");

    let changed = batch(&[project.path("src/app/util.cljs")], &config);
    let outcome = s.dispatcher.handle(&config, &mut env, &changed).await;

    assert!(matches!(outcome, BuildOutcome::Compiled { .. }), "got {outcome}");
    let calls = s.compiler.calls_for("dev");
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].inputs,
        vec![project.path("src/app/core.cljs"), project.path("src/app/util.cljs")]
    );
    assert_eq!(calls[0].options["main"].as_str(), Some("app.core"));

    match &s.transport.events()[..] {
        [TransportEvent::Compiled { build, connect, output }] => {
            assert_eq!(build, "dev");
            assert_eq!(connect.get("build-id").map(String::as_str), Some("dev"));
            assert_eq!(output, &config.output_to);
        }
        other => panic!("unexpected transport events: {other:?}"),
    }
    assert!(config.output_to.is_file());
    Ok(())
}

#[tokio::test]
async fn support_only_change_reloads_without_compiling() -> TestResult {
    let project = dev_project();
    let style = project.write("src/app/style.js", "");
    let config = resolve(&project, "dev");
    let s = setup(FakeCompiler::new());
    let mut env = CompilerEnv::new("dev");

    let outcome = s.dispatcher.handle(&config, &mut env, &batch(&[style.clone()], &config)).await;

    assert!(matches!(&outcome, BuildOutcome::Reloaded { files } if files == &vec![style.clone()]));
    assert_eq!(s.compiler.call_count("dev"), 0);
    assert_eq!(
        s.transport.events(),
        vec![TransportEvent::SupportFiles {
            build: "dev".into(),
            files: vec![style],
        }]
    );
    Ok(())
}

#[tokio::test]
async fn mixed_batch_compiles_then_reloads_support_files() -> TestResult {
    let project = dev_project();
    let style = project.write("src/app/style.js", "");
    let config = resolve(&project, "dev");
    let s = setup(FakeCompiler::new());
    let mut env = CompilerEnv::new("dev");

    let mixed = batch(&[style.clone(), project.path("src/app/core.cljs")], &config);
    let outcome = s.dispatcher.handle(&config, &mut env, &mixed).await;

    assert!(outcome.is_success());
    assert_eq!(s.compiler.call_count("dev"), 1);
    let events = s.transport.events();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], TransportEvent::Compiled { .. }));
    assert!(matches!(&events[1], TransportEvent::SupportFiles { files, .. } if files == &vec![style.clone()]));
    Ok(())
}

#[tokio::test]
async fn batch_without_relevant_files_is_a_no_op() -> TestResult {
    let project = dev_project();
    let config = resolve(&project, "dev");
    let s = setup(FakeCompiler::new());
    let mut env = CompilerEnv::new("dev");

    let outcome = s
        .dispatcher
        .handle(&config, &mut env, &batch(&[project.path("README.md")], &config))
        .await;

    assert!(matches!(outcome, BuildOutcome::NoOp));
    assert_eq!(s.compiler.call_count("dev"), 0);
    assert!(s.transport.events().is_empty());
    Ok(())
}

#[tokio::test]
async fn compile_failure_is_an_outcome_not_an_error() -> TestResult {
    let project = dev_project();
    let config = resolve(&project, "dev");
    let s = setup(FakeCompiler::new());
    s.compiler.set_failing("dev", true);
    let mut env = CompilerEnv::new("dev");

    let outcome = s.dispatcher.compile(&config, &mut env).await;
    match &outcome {
        BuildOutcome::Failed { error, .. } => {
            let first = &error.diagnostics[0];
            assert_eq!(first.line, Some(3));
            assert_eq!(first.file.as_deref(), Some(project.path("src/app/core.cljs").as_path()));
        }
        other => panic!("expected failure, got {other}"),
    }
    assert!(!s.dispatcher.last_outcome("dev").unwrap().is_success());
    assert!(s.transport.events().is_empty());

    s.compiler.set_failing("dev", false);
    let outcome = s.dispatcher.compile(&config, &mut env).await;
    assert!(outcome.is_success());
    assert_eq!(env.invocations(), 2);
    Ok(())
}

#[tokio::test]
async fn warnings_ride_along_with_a_successful_artifact() -> TestResult {
    let project = dev_project();
    let config = resolve(&project, "dev");
    let warning = Diagnostic::warning("shadowed var: name").at(project.path("src/app/util.cljs"), Some(4), None);
    let s = setup(FakeCompiler::new().with_warning(warning.clone()));
    let mut env = CompilerEnv::new("dev");

    match s.dispatcher.compile(&config, &mut env).await {
        BuildOutcome::Compiled { artifact, .. } => assert_eq!(artifact.warnings, vec![warning]),
        other => panic!("expected success, got {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn compiles_of_one_build_never_overlap() -> TestResult {
    let project = dev_project();
    let config = resolve(&project, "dev");
    let s = setup(FakeCompiler::new().with_delay(Duration::from_millis(60)));

    let (mut a, mut b, mut c) = (
        CompilerEnv::new("dev"),
        CompilerEnv::new("dev"),
        CompilerEnv::new("dev"),
    );
    with_timeout(async {
        tokio::join!(
            s.dispatcher.compile(&config, &mut a),
            s.dispatcher.compile(&config, &mut b),
            s.dispatcher.compile(&config, &mut c),
        )
    })
    .await;

    assert_eq!(s.compiler.call_count("dev"), 3);
    assert_eq!(s.compiler.peak_concurrency(), 1);
    Ok(())
}

#[tokio::test]
async fn worker_processes_batches_in_order_with_one_env() -> TestResult {
    let project = dev_project();
    let config = resolve(&project, "dev");
    let s = setup(FakeCompiler::new().with_delay(Duration::from_millis(20)));

    let (handler, rx) = batch_channel("dev");
    let worker = spawn_worker(s.dispatcher.clone(), config.clone(), CompilerEnv::new("dev"), rx);

    for _ in 0..3 {
        handler(batch(&[project.path("src/app/core.cljs")], &config));
    }

    assert!(wait_until(Duration::from_secs(3), || s.compiler.call_count("dev") == 3).await);
    let prior: Vec<u64> = s
        .compiler
        .calls_for("dev")
        .iter()
        .map(|c| c.prior_invocations)
        .collect();
    assert_eq!(prior, vec![0, 1, 2]);
    assert_eq!(s.compiler.peak_concurrency(), 1);

    worker.retire();
    Ok(())
}

#[tokio::test]
async fn retired_worker_ignores_further_batches() -> TestResult {
    let project = dev_project();
    let config = resolve(&project, "dev");
    let s = setup(FakeCompiler::new());

    let (handler, rx) = batch_channel("dev");
    let worker = spawn_worker(s.dispatcher.clone(), config.clone(), CompilerEnv::new("dev"), rx);
    worker.retire();

    handler(batch(&[project.path("src/app/core.cljs")], &config));
    assert!(wait_until(Duration::from_secs(2), || worker.is_finished()).await);
    assert_eq!(s.compiler.call_count("dev"), 0);
    Ok(())
}

#[tokio::test]
async fn extension_in_both_tables_counts_as_compiled() -> TestResult {
    let project = dev_project();
    project.write_build(
        &dev_decl()
            .meta("compiled-extensions", vec!["cljs", "cljc", "js"])
            .meta("support-extensions", vec!["js"]),
    );
    project.write("src/app/style.js", "");
    let config = resolve(&project, "dev");

    let filter = WatchFilter::new(&config.reload_options, &config.watch_paths)?;
    let style = project.path("src/app/style.js");
    assert_eq!(filter.classify(&style), Some(FileClass::Compiled));

    let s = setup(FakeCompiler::new());
    let mut env = CompilerEnv::new("dev");
    let changed = batch(&[style], &config);
    assert!(changed.support_files().is_empty());

    let outcome = s.dispatcher.handle(&config, &mut env, &changed).await;
    assert!(matches!(outcome, BuildOutcome::Compiled { .. }), "got {outcome}");
    assert_eq!(s.compiler.call_count("dev"), 1);
    assert!(
        s.transport
            .events()
            .iter()
            .all(|e| matches!(e, TransportEvent::Compiled { .. }))
    );
    Ok(())
}
