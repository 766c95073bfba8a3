// src/engine/lifecycle.rs

//! Start/stop/clean/reset/status over the watch registry.
//!
//! Every operation takes an explicit list of build ids and reports one
//! [`OpReport`] per id. Addressing an id that is not in the expected state is
//! a warning for that id, never an error for the whole call. Only
//! configuration errors abort an operation, and they do so before any watch
//! is registered.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{BuildConfig, ResolveBase};
use crate::engine::compiler::CompilerEnv;
use crate::engine::dispatch::{batch_channel, spawn_worker, BuildDispatcher, BuildOutcome};
use crate::errors::ConfigError;
use crate::fs::{clean_outputs, FileSystem};
use crate::watch::debounce;
use crate::watch::filter::WatchFilter;
use crate::watch::registry::{WatchDescriptor, WatchRegistry};

/// A per-id condition that is reported, not raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleWarning {
    /// The id has no active watch.
    NotWatching,
}

#[derive(Debug, Clone)]
pub enum IdStatus {
    Started { initial: BuildOutcome },
    AlreadyBuilding,
    Stopped,
    Cleaned { removed: usize },
    Built { outcome: BuildOutcome },
    Warning(LifecycleWarning),
    /// The id could not be processed; other ids in the same call were.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct OpReport {
    pub id: String,
    pub status: IdStatus,
}

impl OpReport {
    fn new(id: &str, status: IdStatus) -> Self {
        Self {
            id: id.to_string(),
            status,
        }
    }
}

impl fmt::Display for OpReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = &self.id;
        match &self.status {
            IdStatus::Started { initial } => write!(f, "{id}: started, initial build {initial}"),
            IdStatus::AlreadyBuilding => write!(f, "{id}: already building"),
            IdStatus::Stopped => write!(f, "{id}: stopped"),
            IdStatus::Cleaned { removed } => write!(f, "{id}: cleaned ({removed} file(s) removed)"),
            IdStatus::Built { outcome } => write!(f, "{id}: {outcome}"),
            IdStatus::Warning(LifecycleWarning::NotWatching) => {
                write!(f, "{id}: not currently building")
            }
            IdStatus::Failed(msg) => write!(f, "{id}: failed: {msg}"),
        }
    }
}

/// One line of `status` output.
#[derive(Debug, Clone)]
pub struct BuildStatus {
    pub id: String,
    pub last_outcome: Option<BuildOutcome>,
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.last_outcome {
            Some(outcome) => write!(f, "{}: watching (last: {outcome})", self.id),
            None => write!(f, "{}: watching", self.id),
        }
    }
}

pub struct LifecycleController {
    base: ResolveBase,
    registry: Arc<WatchRegistry>,
    dispatcher: Arc<BuildDispatcher>,
    fs: Arc<dyn FileSystem>,
}

impl fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleController")
            .field("root", &self.base.root)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// A build whose configuration resolved and is ready to be registered.
struct Prepared {
    config: Arc<BuildConfig>,
    filter: WatchFilter,
}

impl LifecycleController {
    pub fn new(
        base: ResolveBase,
        registry: Arc<WatchRegistry>,
        dispatcher: Arc<BuildDispatcher>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            base,
            registry,
            dispatcher,
            fs,
        }
    }

    pub fn base(&self) -> &ResolveBase {
        &self.base
    }

    pub fn registry(&self) -> &Arc<WatchRegistry> {
        &self.registry
    }

    fn prepare(&self, id: &str) -> Result<Prepared, ConfigError> {
        let config = self.base.resolve_build(id)?;
        let filter = WatchFilter::new(&config.reload_options, &config.watch_paths)?;
        Ok(Prepared {
            config: Arc::new(config),
            filter,
        })
    }

    /// Start watching each id that is not already watched.
    ///
    /// All configurations are resolved before anything is registered, so a
    /// configuration error leaves the registry untouched. For each new id:
    /// register, run one full build (awaited), then attach the debouncer.
    pub async fn start(&self, ids: &[String]) -> Result<Vec<OpReport>, ConfigError> {
        let mut plan: Vec<(String, Option<Prepared>)> = Vec::with_capacity(ids.len());
        for id in ids {
            if self.registry.contains(id) {
                plan.push((id.clone(), None));
            } else {
                plan.push((id.clone(), Some(self.prepare(id)?)));
            }
        }

        let mut reports = Vec::with_capacity(plan.len());
        for (id, prepared) in plan {
            let status = match prepared {
                None => IdStatus::AlreadyBuilding,
                Some(prepared) => self.start_prepared(prepared).await,
            };
            if matches!(status, IdStatus::AlreadyBuilding) {
                info!(build = %id, "already building");
            }
            reports.push(OpReport::new(&id, status));
        }
        Ok(reports)
    }

    async fn start_prepared(&self, prepared: Prepared) -> IdStatus {
        let Prepared { config, filter } = prepared;
        let id = config.id.clone();

        let (handler, batches) = batch_channel(&id);
        let descriptor = WatchDescriptor::new(Arc::clone(&config), filter.clone(), handler.clone());
        let window = descriptor.debounce_window;

        if !self.registry.register(&id, descriptor) {
            return IdStatus::AlreadyBuilding;
        }

        info!(
            build = %id,
            watch_paths = ?config.watch_paths,
            live_reload = config.live_reload,
            "starting build"
        );

        let mut env = CompilerEnv::new(&id);
        let initial = self.dispatcher.compile(&config, &mut env).await;

        let debouncer = match debounce::attach(&config.watch_paths, filter, window, handler) {
            Ok(handle) => handle,
            Err(err) => {
                warn!(build = %id, error = %err, "could not attach file watcher");
                self.registry.unregister(&id);
                return IdStatus::Failed(format!("attaching file watcher: {err}"));
            }
        };

        let worker = spawn_worker(Arc::clone(&self.dispatcher), Arc::clone(&config), env, batches);
        if !self.registry.attach(&id, Box::new(worker)) || !self.registry.attach(&id, Box::new(debouncer)) {
            warn!(build = %id, "build was stopped while starting");
            return IdStatus::Stopped;
        }

        IdStatus::Started { initial }
    }

    /// Stop watching each id. Pending debounce timers are cancelled; a compile
    /// already running finishes on its own.
    pub fn stop(&self, ids: &[String]) -> Vec<OpReport> {
        ids.iter()
            .map(|id| {
                if self.registry.unregister(id) {
                    info!(build = %id, "stopped");
                    OpReport::new(id, IdStatus::Stopped)
                } else {
                    warn!(build = %id, "stop: not currently building");
                    OpReport::new(id, IdStatus::Warning(LifecycleWarning::NotWatching))
                }
            })
            .collect()
    }

    /// Delete each watched build's artifact and the contents of its output
    /// directory. The watch keeps running.
    pub fn clean(&self, ids: &[String]) -> Vec<OpReport> {
        ids.iter()
            .map(|id| {
                let Some(descriptor) = self.registry.get(id) else {
                    warn!(build = %id, "clean: not currently building");
                    return OpReport::new(id, IdStatus::Warning(LifecycleWarning::NotWatching));
                };
                let config = &descriptor.config;
                match clean_outputs(self.fs.as_ref(), &config.output_to, &config.output_dir) {
                    Ok(removed) => {
                        info!(build = %id, removed, output_dir = ?config.output_dir, "cleaned");
                        OpReport::new(id, IdStatus::Cleaned { removed })
                    }
                    Err(err) => {
                        warn!(build = %id, error = %err, "clean failed");
                        OpReport::new(id, IdStatus::Failed(format!("{err:#}")))
                    }
                }
            })
            .collect()
    }

    /// `clean`, `stop`, then `start` with freshly resolved configuration.
    /// An empty id list means every currently watched build.
    ///
    /// Ids that are not watched are reported as warnings and skipped. Every
    /// remaining id is re-resolved before anything is cleaned or stopped, so
    /// a configuration error leaves all running builds as they were.
    pub async fn reset(&self, ids: &[String]) -> Result<Vec<OpReport>, ConfigError> {
        let ids: Vec<String> = if ids.is_empty() {
            self.registry.list_ids().into_iter().collect()
        } else {
            ids.to_vec()
        };

        let mut reports = Vec::new();
        let mut plan = Vec::with_capacity(ids.len());
        for id in &ids {
            if self.registry.contains(id) {
                plan.push(self.prepare(id)?);
            } else {
                warn!(build = %id, "reset: not currently building");
                reports.push(OpReport::new(id, IdStatus::Warning(LifecycleWarning::NotWatching)));
            }
        }

        let watched: Vec<String> = plan.iter().map(|p| p.config.id.clone()).collect();
        info!(builds = ?watched, "reset: restarting with re-resolved configuration");

        // Successful clean/stop lines are implied by the restart.
        for report in self.clean(&watched).into_iter().chain(self.stop(&watched)) {
            if !matches!(report.status, IdStatus::Cleaned { .. } | IdStatus::Stopped) {
                reports.push(report);
            }
        }

        for prepared in plan {
            let id = prepared.config.id.clone();
            let status = self.start_prepared(prepared).await;
            reports.push(OpReport::new(&id, status));
        }
        Ok(reports)
    }

    /// Currently watched ids. No side effects.
    pub fn status_ids(&self) -> BTreeSet<String> {
        self.registry.list_ids()
    }

    /// Currently watched ids with their last dispatch outcome.
    pub fn status(&self) -> Vec<BuildStatus> {
        self.registry
            .list_ids()
            .into_iter()
            .map(|id| BuildStatus {
                last_outcome: self.dispatcher.last_outcome(&id),
                id,
            })
            .collect()
    }

    /// Compile each id once without registering a watch.
    pub async fn build_once(&self, ids: &[String]) -> Result<Vec<OpReport>, ConfigError> {
        let mut configs = Vec::with_capacity(ids.len());
        for id in ids {
            configs.push(self.base.resolve_build(id)?);
        }

        let mut reports = Vec::with_capacity(configs.len());
        for config in configs {
            let mut env = CompilerEnv::new(&config.id);
            let outcome = self.dispatcher.compile(&config, &mut env).await;
            reports.push(OpReport::new(&config.id, IdStatus::Built { outcome }));
        }
        Ok(reports)
    }

    /// Stop everything; used on shutdown.
    pub fn stop_all(&self) -> Vec<OpReport> {
        let ids: Vec<String> = self.registry.list_ids().into_iter().collect();
        self.stop(&ids)
    }
}
