// tests/watch_debounce.rs

mod common;
use crate::common::{init_tracing, wait_until};

use std::error::Error;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use buildwatch::types::ReloadOptions;
use buildwatch::watch::{
    attach, spawn_manual, ChangeBatch, ChangeKind, FileChangeEvent, OnBatch, WatchFilter,
};

type TestResult = Result<(), Box<dyn Error>>;

fn recorder() -> (OnBatch, Arc<Mutex<Vec<ChangeBatch>>>) {
    let batches = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&batches);
    let on_batch: OnBatch = Arc::new(move |batch| sink.lock().unwrap().push(batch));
    (on_batch, batches)
}

fn filter(roots: &[PathBuf]) -> WatchFilter {
    WatchFilter::new(&ReloadOptions::default(), roots).unwrap()
}

fn modified(path: &str) -> FileChangeEvent {
    FileChangeEvent::new(path, ChangeKind::Modified)
}

#[tokio::test]
async fn burst_of_events_becomes_one_deduplicated_batch() -> TestResult {
    init_tracing();
    let (on_batch, batches) = recorder();
    let handle = spawn_manual(filter(&[]), Duration::from_millis(50), on_batch);

    for _ in 0..3 {
        handle.inject(modified("/p/src/app/core.cljs"));
        handle.inject(modified("/p/src/app/util.cljs"));
    }
    handle.inject(modified("/p/src/app/style.js"));

    assert!(wait_until(Duration::from_secs(2), || !batches.lock().unwrap().is_empty()).await);
    tokio::time::sleep(Duration::from_millis(120)).await;

    let batches = batches.lock().unwrap();
    assert_eq!(batches.len(), 1);
    let batch = &batches[0];
    assert_eq!(batch.len(), 3);
    assert_eq!(
        batch.compiled_source_files(),
        &[PathBuf::from("/p/src/app/core.cljs"), PathBuf::from("/p/src/app/util.cljs")]
    );
    assert_eq!(batch.support_files(), &[PathBuf::from("/p/src/app/style.js")]);
    Ok(())
}

#[tokio::test]
async fn each_new_event_restarts_the_quiet_period() -> TestResult {
    let (on_batch, batches) = recorder();
    let handle = spawn_manual(filter(&[]), Duration::from_millis(150), on_batch);

    for i in 0..5 {
        handle.inject(modified(&format!("/p/src/f{i}.cljs")));
        tokio::time::sleep(Duration::from_millis(40)).await;
    }
    // 200ms since the first event, but only 40ms since the last one.
    assert!(batches.lock().unwrap().is_empty());

    assert!(wait_until(Duration::from_secs(2), || !batches.lock().unwrap().is_empty()).await);
    assert_eq!(batches.lock().unwrap()[0].len(), 5);
    Ok(())
}

#[tokio::test]
async fn filtered_events_never_produce_a_batch() -> TestResult {
    let (on_batch, batches) = recorder();
    let handle = spawn_manual(filter(&[]), Duration::from_millis(20), on_batch);

    handle.inject(modified("/p/README.md"));
    handle.inject(modified("/p/src/.#core.cljs"));
    handle.inject(modified("/p/src/core.cljs~"));
    handle.inject(modified("/p/src/core.cljs.swp"));

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(batches.lock().unwrap().is_empty());
    Ok(())
}

#[test]
fn exclude_globs_apply_relative_to_the_watch_root() -> TestResult {
    let options = ReloadOptions {
        exclude: vec!["vendor/**".to_string()],
        ..ReloadOptions::default()
    };
    let filter = WatchFilter::new(&options, &[PathBuf::from("/p/src")])?;

    assert!(!filter.matches(&PathBuf::from("/p/src/vendor/lib.js")));
    assert!(filter.matches(&PathBuf::from("/p/src/app/core.cljs")));
    Ok(())
}

#[tokio::test]
async fn detaching_discards_pending_events() -> TestResult {
    let (on_batch, batches) = recorder();
    let handle = spawn_manual(filter(&[]), Duration::from_millis(50), on_batch);

    handle.inject(modified("/p/src/app/core.cljs"));
    tokio::time::sleep(Duration::from_millis(10)).await;
    handle.detach();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(batches.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn attach_reports_real_file_changes() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let src = dir.path().join("src");
    std::fs::create_dir_all(&src)?;

    let (on_batch, batches) = recorder();
    let handle = attach(&[src.clone()], filter(&[src.clone()]), Duration::from_millis(30), on_batch)?;

    tokio::time::sleep(Duration::from_millis(100)).await;
    std::fs::write(src.join("core.cljs"), "(ns core)")?;

    let seen = wait_until(Duration::from_secs(5), || {
        batches
            .lock()
            .unwrap()
            .iter()
            .any(|b| b.compiled_source_files().iter().any(|p| p.ends_with("core.cljs")))
    })
    .await;
    assert!(seen, "no batch for the written file");

    handle.detach();
    Ok(())
}
