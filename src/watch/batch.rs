// src/watch/batch.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use notify::EventKind;

use crate::types::FileClass;
use crate::watch::filter::WatchFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    /// Map a notify event kind; access and metadata-less "other" events are
    /// not changes.
    pub fn from_event_kind(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(ChangeKind::Created),
            EventKind::Modify(_) | EventKind::Any => Some(ChangeKind::Modified),
            EventKind::Remove(_) => Some(ChangeKind::Removed),
            EventKind::Access(_) | EventKind::Other => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub timestamp: SystemTime,
}

impl FileChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            timestamp: SystemTime::now(),
        }
    }
}

/// Events collected during one debounce window.
///
/// Paths are deduplicated: a path seen several times keeps its first position
/// and its latest event.
#[derive(Debug, Default)]
pub struct PendingEvents {
    events: Vec<FileChangeEvent>,
    index: HashMap<PathBuf, usize>,
}

impl PendingEvents {
    pub fn push(&mut self, event: FileChangeEvent) {
        match self.index.get(&event.path) {
            Some(&i) => self.events[i] = event,
            None => {
                self.index.insert(event.path.clone(), self.events.len());
                self.events.push(event);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Drain into a classified batch, leaving `self` empty.
    pub fn take(&mut self, filter: &WatchFilter) -> ChangeBatch {
        self.index.clear();
        ChangeBatch::classify(std::mem::take(&mut self.events), filter)
    }
}

/// A coalesced, deduplicated set of changes for one build.
#[derive(Debug, Clone, Default)]
pub struct ChangeBatch {
    events: Vec<FileChangeEvent>,
    compiled: Vec<PathBuf>,
    support: Vec<PathBuf>,
}

impl ChangeBatch {
    pub fn classify(events: Vec<FileChangeEvent>, filter: &WatchFilter) -> Self {
        let mut compiled = Vec::new();
        let mut support = Vec::new();
        for event in &events {
            match filter.classify(&event.path) {
                Some(FileClass::Compiled) => compiled.push(event.path.clone()),
                Some(FileClass::Support) => support.push(event.path.clone()),
                None => {}
            }
        }
        Self {
            events,
            compiled,
            support,
        }
    }

    pub fn events(&self) -> &[FileChangeEvent] {
        &self.events
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.events.iter().map(|e| e.path.as_path())
    }

    pub fn compiled_source_files(&self) -> &[PathBuf] {
        &self.compiled
    }

    pub fn support_files(&self) -> &[PathBuf] {
        &self.support
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
