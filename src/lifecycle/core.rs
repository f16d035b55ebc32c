//! # Core
//!
//! [`Core`] owns the plugin collections, the root work source, the job queue
//! and fetcher collaborators, and both dispatcher pipelines. It drives them
//! through one state machine:
//!
//! ```text
//! Resetting ──build──▶ Uninitialized ──start──▶ Starting ──▶ Started
//!                           ▲                                   │
//!                           └──────────── Stopping ◀──stop──────┘
//! ```
//!
//! ## Locking
//!
//! One wide async lock serializes `start`, `stop`, `reset` and every
//! lifecycle-coupled mutation (`add_*`/`remove_*` of frontends and workers,
//! `set_root_work_source`). Each collection additionally guards its own
//! sequence with a narrow lock that is only ever taken while the wide one is
//! held (or, for blockchains, on its own). The narrow lock is never held
//! across an await.
//!
//! Plugin hooks run with the wide lock held, so a hook must not call back
//! into `add_*`, `remove_*` or `set_root_work_source` of the same core.
//!
//! ## Failure model
//!
//! Every per-item hook call is guarded: a failing `start`/`stop` is logged
//! through the Log Pipeline and the sequence carries on. Transitions always
//! run to completion.

use crate::collections::Collection;
use crate::framework::{
    Blockchain, CoreError, Frontend, LogSource, PersistenceError, Plugin, PluginError, PluginId, PluginInstance,
    PluginKind, StatisticsList, WorkSource, Worker,
};
use crate::lifecycle::{CoreConfig, CoreHandle};
use crate::persistence::{ConfigStore, Snapshot};
use crate::pipeline::{EventPipeline, EventRecord, LogLevel, LogPipeline, OutputRedirector};
use crate::registry::{ModuleLoader, PluginModule, PluginRegistry};
use crate::work::{IdleFetcher, IdleJobQueue, JobQueue, JobRef, WorkFetcher};
use crate::worksource::{WorkSourceGroup, DEFAULT_ROOT_NAME};
use chrono::{DateTime, Local};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const CORE_SOURCE_ID: PluginId = -1;
pub const STDOUT_SOURCE_ID: PluginId = -4;
pub const STDERR_SOURCE_ID: PluginId = -5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Resetting,
    Starting,
    Started,
    Stopping,
}

/// Volatile runtime counters, cleared by [`Core::reset`].
#[derive(Debug, Clone, PartialEq)]
pub struct CoreStats {
    pub start_time: DateTime<Local>,
    /// Cumulative work done, in gigahashes.
    pub ghashes: f64,
}

impl CoreStats {
    fn fresh() -> Self {
        Self {
            start_time: Local::now(),
            ghashes: 0.0,
        }
    }
}

// =============================================================================
// BUILDER
// =============================================================================

/// Assembles a [`Core`].
///
/// # Example
/// ```ignore
/// let core = CoreBuilder::new(CoreConfig::new("rig"))
///     .module(PluginModule { maintainer: "theseven", name: "cpuminer", exports })
///     .job_queue(Arc::new(queue))
///     .build();
/// core.start().await?;
/// ```
pub struct CoreBuilder {
    config: CoreConfig,
    loader: ModuleLoader,
    use_inventory: bool,
    job_queue: Option<Arc<dyn JobQueue>>,
    fetcher: Option<Arc<dyn WorkFetcher>>,
    fallback: Option<Box<dyn Write + Send>>,
}

impl CoreBuilder {
    pub fn new(config: CoreConfig) -> Self {
        Self {
            config,
            loader: ModuleLoader::new(),
            use_inventory: true,
            job_queue: None,
            fetcher: None,
            fallback: None,
        }
    }

    pub fn module(mut self, module: PluginModule) -> Self {
        self.loader.add(module);
        self
    }

    /// Only load modules passed to [`module`](Self::module).
    pub fn without_inventory(mut self) -> Self {
        self.use_inventory = false;
        self
    }

    pub fn job_queue(mut self, queue: Arc<dyn JobQueue>) -> Self {
        self.job_queue = Some(queue);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn WorkFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Replaces standard error as the pre-startup fallback stream.
    pub fn fallback(mut self, out: Box<dyn Write + Send>) -> Self {
        self.fallback = Some(out);
        self
    }

    /// Discovers modules, populates and freezes the registry, then loads the
    /// saved configuration of the instance (or the default one).
    pub fn build(self) -> Core {
        let CoreBuilder {
            config,
            mut loader,
            use_inventory,
            job_queue,
            fetcher,
            fallback,
        } = self;

        let fallback = fallback.unwrap_or_else(|| Box::new(io::stderr()));
        let log = Arc::new(LogPipeline::new(config.default_loglevel, fallback));
        let events = Arc::new(EventPipeline::new(Arc::clone(&log)));
        let handle = CoreHandle::new(Arc::new(PluginRegistry::new()), log, events);
        let source = LogSource::new(CORE_SOURCE_ID, "Core");

        handle.event(EventRecord::new(LogLevel::BANNER, source.clone(), "initializing").message("Core initializing"));
        handle.log(&source, format!("hashvisor v{VERSION}\n"), LogLevel::BANNER, "B");
        handle.log(&source, "hashvisor comes with ABSOLUTELY NO WARRANTY.\n", LogLevel::BANNER, "");

        handle.log(&source, "Loading modules...\n", LogLevel::INFO, "B");
        if use_inventory {
            loader.add_inventory();
        }
        let classes = loader.discover(&handle, &source);
        ModuleLoader::register_all(&classes, handle.registry(), &handle, &source);
        handle.registry().freeze();

        let root: Arc<dyn WorkSource> = WorkSourceGroup::named(&handle, DEFAULT_ROOT_NAME);
        let core = Core {
            store: ConfigStore::new(&config.config_dir, &config.instance),
            config,
            source,
            state: Mutex::new(LifecycleState::Resetting),
            transition: tokio::sync::Mutex::new(()),
            frontends: Arc::new(Collection::new()),
            workers: Collection::new(),
            blockchains: Collection::new(),
            root: Mutex::new(root),
            job_queue: job_queue.unwrap_or_else(|| Arc::new(IdleJobQueue)),
            fetcher: fetcher.unwrap_or_else(|| Arc::new(IdleFetcher)),
            stats: Mutex::new(CoreStats::fresh()),
            new_instance: AtomicBool::new(true),
            handle,
        };
        core.reset_counters();
        core.load();
        core.set_state(LifecycleState::Uninitialized);
        core
    }
}

// =============================================================================
// CORE
// =============================================================================

pub struct Core {
    config: CoreConfig,
    handle: CoreHandle,
    source: LogSource,
    store: ConfigStore,
    state: Mutex<LifecycleState>,
    /// The wide start/stop lock.
    transition: tokio::sync::Mutex<()>,
    frontends: Arc<Collection<dyn Frontend>>,
    workers: Collection<dyn Worker>,
    blockchains: Collection<dyn Blockchain>,
    root: Mutex<Arc<dyn WorkSource>>,
    job_queue: Arc<dyn JobQueue>,
    fetcher: Arc<dyn WorkFetcher>,
    stats: Mutex<CoreStats>,
    new_instance: AtomicBool,
}

/// Generates the lifecycle-coupled accessors of one collection.
macro_rules! coupled_collection {
    ($kind:ident: dyn $trait:ident in $field:ident, $label:literal) => {
        paste::paste! {
            #[doc = concat!("Adds a ", $label, ", starting it first if the core is running.")]
            ///
            /// No-op if it is already tracked. A failed start is logged and the
            /// instance is tracked regardless.
            pub async fn [<add_ $kind>](&self, item: Arc<dyn $trait>) {
                let _transition = self.transition.lock().await;
                if self.$field.contains(&item) {
                    return;
                }
                if self.is_started() {
                    let name = item.name();
                    self.check(item.start().await, "start", &format!("{} {name}", $label), "yB");
                }
                self.$field.insert(item);
            }

            #[doc = concat!("Removes a ", $label, ", stopping it first if the core is running.")]
            ///
            /// A failed stop is logged and the instance is removed regardless.
            pub async fn [<remove_ $kind>](&self, item: &Arc<dyn $trait>) {
                let _transition = self.transition.lock().await;
                if !self.$field.contains(item) {
                    return;
                }
                if self.is_started() {
                    let name = item.name();
                    self.check(item.stop().await, "stop", &format!("{} {name}", $label), "yB");
                }
                self.$field.remove(item);
            }

            #[doc = concat!("The tracked ", $label, "s, in insertion order.")]
            pub fn [<$kind s>](&self) -> Vec<Arc<dyn $trait>> {
                self.$field.list()
            }
        }
    };
}

impl Core {
    pub fn builder(config: CoreConfig) -> CoreBuilder {
        CoreBuilder::new(config)
    }

    pub fn handle(&self) -> CoreHandle {
        self.handle.clone()
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn instance(&self) -> &str {
        &self.config.instance
    }

    /// `true` when no saved configuration could be loaded at build time.
    pub fn is_new_instance(&self) -> bool {
        self.new_instance.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: LifecycleState) {
        debug!(?state, "Lifecycle transition");
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub fn is_started(&self) -> bool {
        self.state() == LifecycleState::Started
    }

    pub fn source(&self) -> &LogSource {
        &self.source
    }

    fn say(&self, text: impl Into<String>, level: LogLevel, format: &str) {
        self.handle.log(&self.source, text, level, format);
    }

    fn emit(&self, event: &str, message: &str) {
        self.handle
            .event(EventRecord::new(LogLevel::ERROR, self.source.clone(), event).message(message));
    }

    /// Logs a failed hook call as `Could not <action> <what>: <error>`.
    fn check(&self, result: Result<(), PluginError>, action: &str, what: &str, format: &str) {
        if let Err(e) = result {
            self.say(format!("Could not {action} {what}: {e}\n"), LogLevel::ERROR, format);
        }
    }

    // -------------------------------------------------------------------------
    // Start / stop
    // -------------------------------------------------------------------------

    /// Brings every subsystem up in dependency order.
    ///
    /// Fails only if the core is not idle; individual subsystem failures are
    /// logged and skipped.
    pub async fn start(&self) -> Result<(), CoreError> {
        let _transition = self.transition.lock().await;
        if self.state() != LifecycleState::Uninitialized {
            return Err(CoreError::AlreadyStarted);
        }
        self.set_state(LifecycleState::Starting);
        self.emit("starting", "Starting core");
        self.say("Starting up...\n", LogLevel::ERROR, "B");

        self.say("Starting up frontends...\n", LogLevel::DEBUG, "");
        let mut have_logger = false;
        let mut have_configurator = false;
        for frontend in self.frontends.list() {
            let name = frontend.name();
            self.say(format!("Starting up frontend {name}...\n"), LogLevel::TRACE, "");
            match frontend.start().await {
                Ok(()) => {
                    have_logger |= frontend.can_log();
                    have_configurator |= frontend.can_configure();
                }
                Err(e) => self.say(format!("Could not start frontend {name}: {e}\n"), LogLevel::ERROR, "rB"),
            }
        }

        // Still on the fallback path here, so this reaches the operator either way.
        if !have_logger {
            self.say(
                "No working logger frontend module present!\n\
                 Run detect_frontends after ensuring that all necessary modules are installed.\n",
                LogLevel::CRITICAL,
                "rB",
            );
        }

        self.say("Starting up logging dispatcher...\n", LogLevel::DEBUG, "");
        if !self.handle.log_pipeline().start_dispatcher(Arc::clone(&self.frontends)) {
            warn!(pipeline = "log", "Dispatcher already running");
        }
        self.handle.log_pipeline().set_live(true);

        self.say("Starting up event dispatcher...\n", LogLevel::DEBUG, "");
        if !self.handle.event_pipeline().start_dispatcher(Arc::clone(&self.frontends)) {
            warn!(pipeline = "event", "Dispatcher already running");
        }

        if !have_configurator {
            self.say(
                "No working configuration frontend module present!\n\
                 Run detect_frontends after ensuring that all necessary modules are installed.\n",
                LogLevel::ERROR,
                "yB",
            );
        }

        self.say("Starting up work queue...\n", LogLevel::DEBUG, "");
        self.check(self.job_queue.start().await, "start", "work queue", "rB");

        self.start_all(PluginKind::Blockchain, self.blockchains.list()).await;

        self.say("Starting up work source tree...\n", LogLevel::DEBUG, "");
        let root = self.root_work_source();
        let name = root.name();
        self.say(format!("Starting up work source {name}...\n"), LogLevel::TRACE, "");
        self.check(root.start().await, "start", &format!("root work source {name}"), "rB");

        self.say("Starting up work fetcher...\n", LogLevel::DEBUG, "");
        self.check(self.fetcher.start().await, "start", "work fetcher", "rB");

        self.start_all(PluginKind::Worker, self.workers.list()).await;

        self.set_state(LifecycleState::Started);
        self.say("Startup completed\n", LogLevel::NOTICE, "");
        self.emit("started", "Successfully started core");
        info!(instance = %self.config.instance, "Core started");
        Ok(())
    }

    /// Tears everything down in reverse order and saves the configuration.
    ///
    /// No-op unless the core is started, so repeated calls are harmless.
    pub async fn stop(&self) {
        let _transition = self.transition.lock().await;
        if self.state() != LifecycleState::Started {
            debug!(state = ?self.state(), "Stop requested while not started");
            return;
        }
        self.set_state(LifecycleState::Stopping);
        self.emit("stopping", "Stopping core");
        self.say("Shutting down...\n", LogLevel::ERROR, "B");

        self.stop_all(PluginKind::Worker, self.workers.list()).await;

        self.say("Shutting down work fetcher...\n", LogLevel::DEBUG, "");
        self.check(self.fetcher.stop().await, "stop", "work fetcher", "rB");

        self.say("Shutting down work source tree...\n", LogLevel::DEBUG, "");
        let root = self.root_work_source();
        let name = root.name();
        self.say(format!("Shutting down work source {name}...\n"), LogLevel::TRACE, "");
        self.check(root.stop().await, "stop", &format!("root work source {name}"), "rB");

        self.stop_all(PluginKind::Blockchain, self.blockchains.list()).await;

        self.say("Shutting down work queue...\n", LogLevel::DEBUG, "");
        self.check(self.job_queue.stop().await, "stop", "work queue", "rB");

        // Reported through the pipelines by save itself.
        let _ = self.save();

        let timeout = self.config.join_timeout();
        self.say("Shutting down event dispatcher...\n", LogLevel::DEBUG, "");
        self.handle.event_pipeline().stop_dispatcher(timeout).await;

        self.say("Shutting down logging dispatcher...\n", LogLevel::DEBUG, "");
        self.handle.log_pipeline().set_live(false);
        self.handle.log_pipeline().stop_dispatcher(timeout).await;

        self.stop_all(PluginKind::Frontend, self.frontends.list()).await;

        self.set_state(LifecycleState::Uninitialized);
        self.say("Shutdown completed\n", LogLevel::NOTICE, "");
        self.emit("stopped", "Successfully stopped core");
        info!(instance = %self.config.instance, "Core stopped");
    }

    async fn start_all<T: ?Sized + Plugin>(&self, kind: PluginKind, items: Vec<Arc<T>>) {
        self.say(format!("Starting up {kind}s...\n"), LogLevel::DEBUG, "");
        for item in items {
            let name = item.name();
            self.say(format!("Starting up {kind} {name}...\n"), LogLevel::TRACE, "");
            self.check(item.start().await, "start", &format!("{kind} {name}"), "rB");
        }
    }

    async fn stop_all<T: ?Sized + Plugin>(&self, kind: PluginKind, items: Vec<Arc<T>>) {
        self.say(format!("Shutting down {kind}s...\n"), LogLevel::DEBUG, "");
        for item in items {
            let name = item.name();
            self.say(format!("Shutting down {kind} {name}...\n"), LogLevel::TRACE, "");
            self.check(item.stop().await, "stop", &format!("{kind} {name}"), "rB");
        }
    }

    /// Clears the runtime counters. Waits for an ongoing transition to finish.
    pub async fn reset(&self) {
        let _transition = self.transition.lock().await;
        let idle = self.state() == LifecycleState::Uninitialized;
        if idle {
            self.set_state(LifecycleState::Resetting);
        }
        self.reset_counters();
        if idle {
            self.set_state(LifecycleState::Uninitialized);
        }
    }

    fn reset_counters(&self) {
        self.emit("reset", "Resetting core state");
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner) = CoreStats::fresh();
    }

    pub fn stats(&self) -> CoreStats {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn record_hashes(&self, ghashes: f64) {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).ghashes += ghashes;
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    fn load(&self) {
        self.emit("loading_config", "Loading configuration");
        let restored = self
            .store
            .read()
            .and_then(|snapshot| snapshot.restore(&self.handle));
        match restored {
            Ok(state) => {
                for frontend in state.frontends {
                    self.frontends.insert(frontend);
                }
                for worker in state.workers {
                    self.workers.insert(worker);
                }
                for blockchain in state.blockchains {
                    self.blockchains.insert(blockchain);
                }
                if let Some(root) = state.root_work_source {
                    root.set_parent(None);
                    *self.root.lock().unwrap_or_else(PoisonError::into_inner) = root;
                }
                self.new_instance.store(false, Ordering::SeqCst);
                self.emit("loaded_config", "Successfully loaded configuration");
            }
            Err(e) => {
                self.emit("loading_config_failed", "Loading configuration failed");
                self.say(
                    format!("Could not load instance configuration: {e}\nLoading default configuration...\n"),
                    LogLevel::WARNING,
                    "yB",
                );
            }
        }
    }

    /// Deflated records of everything the core currently tracks.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            frontends: self.frontends.list().iter().map(|f| f.deflate()).collect(),
            workers: self.workers.list().iter().map(|w| w.deflate()).collect(),
            blockchains: self.blockchains.list().iter().map(|b| b.deflate()).collect(),
            root_work_source: Some(self.root_work_source().deflate()),
        }
    }

    /// Writes the snapshot to `<config_dir>/<instance>.cfg`.
    ///
    /// The outcome is also reported as `saved_config`/`saving_config_failed`.
    pub fn save(&self) -> Result<(), PersistenceError> {
        self.emit("saving_config", "Saving configuration");
        self.say("Saving instance configuration...\n", LogLevel::INFO, "B");
        match self.store.save(&self.snapshot()) {
            Ok(()) => {
                self.emit("saved_config", "Successfully saved configuration");
                Ok(())
            }
            Err(e) => {
                self.emit("saving_config_failed", "Saving configuration failed");
                self.say(format!("Could not save instance configuration: {e}\n"), LogLevel::ERROR, "rB");
                Err(e)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Collections
    // -------------------------------------------------------------------------

    coupled_collection!(frontend: dyn Frontend in frontends, "frontend");
    coupled_collection!(worker: dyn Worker in workers, "worker");

    /// Adds a blockchain. Blockchains are not started or stopped on add/remove.
    pub fn add_blockchain(&self, blockchain: Arc<dyn Blockchain>) {
        self.blockchains.insert(blockchain);
    }

    pub fn remove_blockchain(&self, blockchain: &Arc<dyn Blockchain>) {
        self.blockchains.remove(blockchain);
    }

    pub fn blockchains(&self) -> Vec<Arc<dyn Blockchain>> {
        self.blockchains.list()
    }

    pub fn blockchain_by_name(&self, name: &str) -> Option<Arc<dyn Blockchain>> {
        self.blockchains.find_by_name(name)
    }

    pub fn root_work_source(&self) -> Arc<dyn WorkSource> {
        self.root.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replaces the root of the work-source tree.
    ///
    /// While started, the outgoing root is stopped and the new one started;
    /// failures of either are logged. The new root always ends up installed
    /// without a parent.
    pub async fn set_root_work_source(&self, root: Arc<dyn WorkSource>) {
        let _transition = self.transition.lock().await;
        let started = self.is_started();
        let old = self.root_work_source();
        if started {
            let name = old.name();
            self.check(old.stop().await, "stop", &format!("root work source {name}"), "yB");
        }
        old.set_parent(None);
        root.set_parent(None);
        *self.root.lock().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&root);
        if started {
            let name = root.name();
            self.check(root.start().await, "start", &format!("root work source {name}"), "yB");
        }
    }

    // -------------------------------------------------------------------------
    // Autodetection
    // -------------------------------------------------------------------------

    fn autodetect(&self, kind: PluginKind) -> Vec<PluginInstance> {
        let mut found = Vec::new();
        for class in self.handle.registry().classes_of(kind) {
            let Some(autodetect) = class.autodetect else {
                continue;
            };
            match autodetect(&self.handle) {
                Ok(instances) => found.extend(instances),
                Err(e) => self.say(
                    format!("{} autodetection failed: {e}\n", class.type_tag),
                    LogLevel::WARNING,
                    "yB",
                ),
            }
        }
        found
    }

    /// Runs every frontend class's autodetection and adds what it finds.
    pub async fn detect_frontends(&self) {
        self.say("Autodetecting frontends...\n", LogLevel::INFO, "B");
        for instance in self.autodetect(PluginKind::Frontend) {
            match instance.into_frontend() {
                Some(frontend) => self.add_frontend(frontend).await,
                None => self.say("Autodetection produced a non-frontend, ignoring it\n", LogLevel::WARNING, "yB"),
            }
        }
    }

    /// Runs every worker class's autodetection and adds what it finds.
    pub async fn detect_workers(&self) {
        self.say("Autodetecting workers...\n", LogLevel::INFO, "B");
        for instance in self.autodetect(PluginKind::Worker) {
            match instance.into_worker() {
                Some(worker) => self.add_worker(worker).await,
                None => self.say("Autodetection produced a non-worker, ignoring it\n", LogLevel::WARNING, "yB"),
            }
        }
    }

    // -------------------------------------------------------------------------
    // Collaborators & statistics
    // -------------------------------------------------------------------------

    pub async fn get_job(
        &self,
        worker: &Arc<dyn Worker>,
        expiry_min_ahead: Duration,
        async_mode: bool,
    ) -> Result<Option<JobRef>, PluginError> {
        self.job_queue.get_job(worker, expiry_min_ahead, async_mode).await
    }

    pub fn notify_speed_changed(&self, worker: &Arc<dyn Worker>) {
        self.fetcher.notify_speed_changed(worker);
    }

    pub fn get_blockchain_statistics(&self) -> StatisticsList {
        self.blockchains.list().iter().map(|b| b.get_statistics()).collect()
    }

    pub fn get_worker_statistics(&self) -> StatisticsList {
        self.workers.list().iter().map(|w| w.get_statistics()).collect()
    }

    pub fn get_work_source_statistics(&self) -> StatisticsList {
        std::iter::once(self.root_work_source().get_statistics()).collect()
    }

    // -------------------------------------------------------------------------
    // Output redirection
    // -------------------------------------------------------------------------

    /// A writer feeding standard-output style text into the log at level 500.
    pub fn stdout_redirector(&self) -> OutputRedirector {
        OutputRedirector::new(
            self.handle.log_pipeline(),
            LogSource::new(STDOUT_SOURCE_ID, "stdout"),
            LogLevel::INFO,
            "",
        )
    }

    /// A writer feeding standard-error style text into the log at level 100.
    pub fn stderr_redirector(&self) -> OutputRedirector {
        OutputRedirector::new(
            self.handle.log_pipeline(),
            LogSource::new(STDERR_SOURCE_ID, "stderr"),
            LogLevel::ERROR,
            "rB",
        )
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        // Handles may outlive the core; without this the dispatchers would wait on them forever.
        if self.is_started() {
            warn!(instance = %self.config.instance, "Core dropped while started");
        }
        self.handle.log_pipeline().close_channel();
        self.handle.event_pipeline().close_channel();
    }
}
