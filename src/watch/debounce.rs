// src/watch/debounce.rs

//! Debounced filesystem monitoring for one build.
//!
//! Raw notify events are forwarded from the (synchronous) notify callback into
//! an unbounded tokio channel. A per-build task collects matching events and
//! restarts a quiet-period timer on each one; when the timer elapses the
//! collected events are handed to `on_batch` as one [`ChangeBatch`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, trace};

use crate::errors::Result;
use crate::watch::batch::{ChangeBatch, ChangeKind, FileChangeEvent, PendingEvents};
use crate::watch::filter::WatchFilter;
use crate::watch::registry::Detach;

/// Callback receiving one coalesced batch per quiet period.
pub type OnBatch = Arc<dyn Fn(ChangeBatch) + Send + Sync>;

/// A running debouncer.
///
/// Dropping or detaching the handle stops the notify watcher, cancels any
/// pending timer and discards buffered events without invoking `on_batch`.
pub struct DebouncerHandle {
    _watcher: Option<RecommendedWatcher>,
    events_tx: mpsc::UnboundedSender<FileChangeEvent>,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for DebouncerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebouncerHandle")
            .field("finished", &self.task.is_finished())
            .finish_non_exhaustive()
    }
}

impl DebouncerHandle {
    /// Inject an event as if it came from the filesystem.
    pub fn inject(&self, event: FileChangeEvent) -> bool {
        self.events_tx.send(event).is_ok()
    }

    pub fn detach(self) {
        self.task.abort();
    }
}

impl Drop for DebouncerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl Detach for DebouncerHandle {
    fn detach(self: Box<Self>) {
        DebouncerHandle::detach(*self);
    }
}

/// Start monitoring `paths` and dispatch debounced batches to `on_batch`.
///
/// Directories are watched recursively, plain files on their own.
pub fn attach(
    paths: &[PathBuf],
    filter: WatchFilter,
    window: Duration,
    on_batch: OnBatch,
) -> Result<DebouncerHandle> {
    let (events_tx, events_rx) = mpsc::unbounded_channel::<FileChangeEvent>();

    // Closure called synchronously by notify whenever an event arrives.
    let mut watcher = RecommendedWatcher::new(
        {
            let events_tx = events_tx.clone();
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let Some(kind) = ChangeKind::from_event_kind(&event.kind) else {
                        return;
                    };
                    for path in event.paths {
                        // Receiver gone means the debouncer was detached.
                        let _ = events_tx.send(FileChangeEvent::new(path, kind));
                    }
                }
                Err(err) => {
                    eprintln!("buildwatch: file watch error: {err}");
                }
            }
        },
        Config::default(),
    )?;

    for path in paths {
        let mode = if path.is_dir() {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(path, mode)?;
    }
    info!(paths = ?paths, window_ms = window.as_millis() as u64, "file watcher started");

    let task = tokio::spawn(debounce_loop(events_rx, filter, window, on_batch));

    Ok(DebouncerHandle {
        _watcher: Some(watcher),
        events_tx,
        task,
    })
}

/// Debouncer without a filesystem watcher; events arrive only through
/// [`DebouncerHandle::inject`].
pub fn spawn_manual(
    filter: WatchFilter,
    window: Duration,
    on_batch: OnBatch,
) -> DebouncerHandle {
    let (events_tx, events_rx) = mpsc::unbounded_channel::<FileChangeEvent>();
    let task = tokio::spawn(debounce_loop(events_rx, filter, window, on_batch));
    DebouncerHandle {
        _watcher: None,
        events_tx,
        task,
    }
}

async fn debounce_loop(
    mut events_rx: mpsc::UnboundedReceiver<FileChangeEvent>,
    filter: WatchFilter,
    window: Duration,
    on_batch: OnBatch,
) {
    let mut pending = PendingEvents::default();
    let mut deadline: Option<Instant> = None;

    loop {
        let next = match deadline {
            None => events_rx.recv().await,
            Some(at) => match timeout_at(at, events_rx.recv()).await {
                Ok(next) => next,
                Err(_elapsed) => {
                    let batch = pending.take(&filter);
                    deadline = None;
                    debug!(events = batch.len(), "debounce window closed; dispatching batch");
                    on_batch(batch);
                    continue;
                }
            },
        };

        let Some(event) = next else {
            break;
        };

        if filter.matches(&event.path) {
            trace!(path = ?event.path, kind = ?event.kind, "matching change");
            pending.push(event);
            deadline = Some(Instant::now() + window);
        } else {
            trace!(path = ?event.path, "ignoring change (filtered)");
        }
    }

    debug!(discarded = pending.len(), "debouncer loop finished");
}
