// src/watch/mod.rs

//! File watching and change batching.
//!
//! This module is responsible for:
//! - Deciding which changed paths matter to a build (`filter.rs`).
//! - Coalescing bursts of notify events into one batch per quiet period
//!   (`debounce.rs`, `batch.rs`).
//! - Tracking which builds are currently watched (`registry.rs`).
//!
//! It does **not** know about compilers; batches are handed to whatever
//! callback the lifecycle controller wires in.

pub mod batch;
pub mod debounce;
pub mod filter;
pub mod registry;

pub use batch::{ChangeBatch, ChangeKind, FileChangeEvent};
pub use debounce::{attach, spawn_manual, DebouncerHandle, OnBatch};
pub use filter::WatchFilter;
pub use registry::{Detach, WatchDescriptor, WatchRegistry};
