// src/watch/registry.rs

//! The watch registry: build id -> active watch.
//!
//! This is the only shared mutable state of the orchestrator. Every
//! operation takes the same mutex, so concurrent register/unregister/list
//! calls never observe a torn table. Instances are plain values: callers own
//! (and tests create) their own registry.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::debug;

use crate::config::BuildConfig;
use crate::watch::batch::ChangeBatch;
use crate::watch::debounce::OnBatch;
use crate::watch::filter::WatchFilter;

/// Something that must be shut down when its build is unregistered
/// (a debouncer, a dispatch worker).
pub trait Detach: Send {
    fn detach(self: Box<Self>);
}

/// Runtime record of one watched build.
#[derive(Clone)]
pub struct WatchDescriptor {
    pub id: String,
    pub watch_paths: Vec<PathBuf>,
    pub filter: WatchFilter,
    /// Receives debounced batches; captures the build's config and compiler
    /// environment on the dispatch side.
    pub handler: OnBatch,
    pub debounce_window: Duration,
    pub config: Arc<BuildConfig>,
}

impl fmt::Debug for WatchDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchDescriptor")
            .field("id", &self.id)
            .field("watch_paths", &self.watch_paths)
            .field("debounce_window", &self.debounce_window)
            .finish_non_exhaustive()
    }
}

impl WatchDescriptor {
    pub fn new(config: Arc<BuildConfig>, filter: WatchFilter, handler: OnBatch) -> Self {
        Self {
            id: config.id.clone(),
            watch_paths: config.watch_paths.clone(),
            filter,
            handler,
            debounce_window: Duration::from_millis(config.reload_options.debounce_ms),
            config,
        }
    }

    /// Hand a batch to this build's handler.
    pub fn dispatch(&self, batch: ChangeBatch) {
        (self.handler)(batch)
    }
}

struct Entry {
    descriptor: WatchDescriptor,
    attachments: Vec<Box<dyn Detach>>,
}

#[derive(Default)]
pub struct WatchRegistry {
    entries: Mutex<BTreeMap<String, Entry>>,
}

impl fmt::Debug for WatchRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchRegistry")
            .field("ids", &self.list_ids())
            .finish()
    }
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Entry>> {
        // A panic while holding the lock cannot leave the map half-updated
        // (every mutation is a single insert/remove), so poisoning is ignored.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a descriptor. Returns `false` (and does nothing) if the id is
    /// already present.
    pub fn register(&self, id: &str, descriptor: WatchDescriptor) -> bool {
        let mut entries = self.lock();
        if entries.contains_key(id) {
            debug!(build = %id, "register: already present");
            return false;
        }
        entries.insert(
            id.to_string(),
            Entry {
                descriptor,
                attachments: Vec::new(),
            },
        );
        debug!(build = %id, "registered watch");
        true
    }

    /// Tie a running component to a registered id. If the id is gone (e.g. it
    /// was stopped meanwhile) the component is detached immediately and
    /// `false` is returned.
    pub fn attach(&self, id: &str, component: Box<dyn Detach>) -> bool {
        let rejected = {
            let mut entries = self.lock();
            match entries.get_mut(id) {
                Some(entry) => {
                    entry.attachments.push(component);
                    None
                }
                None => Some(component),
            }
        };
        match rejected {
            Some(component) => {
                component.detach();
                false
            }
            None => true,
        }
    }

    /// Remove an id and detach everything attached to it. Returns `false` if
    /// the id was not registered.
    pub fn unregister(&self, id: &str) -> bool {
        let removed = self.lock().remove(id);
        match removed {
            Some(entry) => {
                for component in entry.attachments {
                    component.detach();
                }
                debug!(build = %id, "unregistered watch");
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<WatchDescriptor> {
        self.lock().get(id).map(|e| e.descriptor.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn list_ids(&self) -> BTreeSet<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
