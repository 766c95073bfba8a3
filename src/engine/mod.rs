// src/engine/mod.rs

//! Build orchestration engine.
//!
//! This module ties together:
//! - the compiler and hot-reload seams (`compiler.rs`) and the shell-command
//!   compiler used in production (`command.rs`)
//! - the dispatcher that turns change batches into compiles or reloads, one
//!   at a time per build (`dispatch.rs`)
//! - the lifecycle controller behind start/stop/clean/reset/status
//!   (`lifecycle.rs`)

pub mod command;
pub mod compiler;
pub mod dispatch;
pub mod lifecycle;

pub use command::CommandCompiler;
pub use compiler::{
    report_diagnostic, Artifact, CompileFuture, CompileRequest, Compiler, CompilerEnv, Diagnostic,
    HotReloadTransport, LogTransport, Severity,
};
pub use dispatch::{batch_channel, spawn_worker, BuildDispatcher, BuildOutcome, WorkerHandle};
pub use lifecycle::{BuildStatus, IdStatus, LifecycleController, LifecycleWarning, OpReport};
