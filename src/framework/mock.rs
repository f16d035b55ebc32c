//! # Mock Plugins
//!
//! Utilities for testing the core without real hardware or network plugins.
//!
//! - [`MockPlugin`] implements every plugin kind. Its behaviour (capabilities,
//!   failing hooks) is scripted through [`MockPlugin::builder`] and stored in
//!   its settings, so it survives a save/load round-trip.
//! - [`CallJournal`] records `start:<name>` / `stop:<name>` calls in the order
//!   they happened, across any number of plugins.
//! - [`CapturedOutput`] stands in for standard error as the fallback writer.
//! - [`MockJobQueue`] / [`MockFetcher`] stand in for the work collaborators.
//!
//! # Example
//! ```ignore
//! let journal = CallJournal::default();
//! let worker = MockPlugin::builder(PluginKind::Worker, "w1")
//!     .fail_start()
//!     .build(&core.handle(), &journal);
//! core.add_worker(worker).await;
//! assert_eq!(journal.entries(), vec!["start:w1"]);
//! ```

use crate::framework::{
    Blockchain, Frontend, ParentLink, Plugin, PluginError, PluginId, PluginInstance, PluginKind, Settings,
    Statistics, WorkSource, Worker,
};
use crate::lifecycle::CoreHandle;
use crate::persistence::DeflatedRecord;
use crate::pipeline::{EventRecord, LogRecord};
use crate::registry::PluginClass;
use crate::work::{JobQueue, JobRef, WorkFetcher};
use async_trait::async_trait;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

// =============================================================================
// CALL JOURNAL & CAPTURED OUTPUT
// =============================================================================

/// Shared, ordered record of lifecycle calls.
#[derive(Debug, Clone, Default)]
pub struct CallJournal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallJournal {
    pub fn record(&self, entry: impl Into<String>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Entries starting with `prefix`, e.g. `"start:"`.
    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.starts_with(prefix))
            .collect()
    }

    /// Position of the first entry equal to `entry`.
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }
}

/// An in-memory [`io::Write`] whose contents can be inspected from clones.
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CapturedOutput {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap_or_else(PoisonError::into_inner)).into_owned()
    }
}

impl io::Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// =============================================================================
// MOCK PLUGIN
// =============================================================================

const LOGS: &str = "logs";
const CONFIGURES: &str = "configures";
const HANDLES_EVENTS: &str = "handles_events";
const FAIL_START: &str = "fail_start";
const FAIL_STOP: &str = "fail_stop";
const FAIL_LOG: &str = "fail_log";
const FAIL_EVENTS: &str = "fail_events";
const FAIL_INFLATE: &str = "fail_inflate";

fn type_tag_of(kind: PluginKind) -> &'static str {
    match kind {
        PluginKind::Frontend => "mock.frontend",
        PluginKind::Worker => "mock.worker",
        PluginKind::Blockchain => "mock.blockchain",
        PluginKind::WorkSource => "mock.worksource",
    }
}

/// A scriptable plugin of any kind.
pub struct MockPlugin {
    id: PluginId,
    kind: PluginKind,
    settings: Mutex<Settings>,
    journal: CallJournal,
    running: AtomicBool,
    logs: Mutex<Vec<LogRecord>>,
    events: Mutex<Vec<EventRecord>>,
    parent: ParentLink,
}

impl MockPlugin {
    pub fn builder(kind: PluginKind, name: &str) -> MockPluginBuilder {
        MockPluginBuilder {
            kind,
            settings: Settings::named(name),
        }
    }

    fn from_settings(id: PluginId, kind: PluginKind, settings: Settings, journal: &CallJournal) -> Arc<Self> {
        Arc::new(Self {
            id,
            kind,
            settings: Mutex::new(settings),
            journal: journal.clone(),
            running: AtomicBool::new(false),
            logs: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            parent: ParentLink::default(),
        })
    }

    pub fn kind(&self) -> PluginKind {
        self.kind
    }

    pub fn journal(&self) -> &CallJournal {
        &self.journal
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Log records delivered to this plugin, if it is a logging frontend.
    pub fn logs(&self) -> Vec<LogRecord> {
        self.logs.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Text of every delivered log record.
    pub fn log_lines(&self) -> Vec<String> {
        self.logs().iter().map(|r| r.text()).collect()
    }

    pub fn events(&self) -> Vec<EventRecord> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Names of every delivered event, in delivery order.
    pub fn event_names(&self) -> Vec<String> {
        self.events().iter().map(|e| e.event.clone()).collect()
    }

    fn flag(&self, key: &str) -> bool {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner).flag(key)
    }

    pub fn set_flag(&self, key: &str, value: bool) {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .options
            .insert(key.to_string(), value.into());
    }

    pub fn into_instance(self: Arc<Self>) -> PluginInstance {
        match self.kind {
            PluginKind::Frontend => PluginInstance::Frontend(self),
            PluginKind::Worker => PluginInstance::Worker(self),
            PluginKind::Blockchain => PluginInstance::Blockchain(self),
            PluginKind::WorkSource => PluginInstance::WorkSource(self),
        }
    }
}

#[async_trait]
impl Plugin for MockPlugin {
    fn id(&self) -> PluginId {
        self.id
    }

    fn type_tag(&self) -> &'static str {
        type_tag_of(self.kind)
    }

    fn settings(&self) -> Settings {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    async fn start(&self) -> Result<(), PluginError> {
        self.journal.record(format!("start:{}", self.name()));
        if self.flag(FAIL_START) {
            return Err(PluginError::failed(format!("{} refused to start", self.name())));
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), PluginError> {
        self.journal.record(format!("stop:{}", self.name()));
        self.running.store(false, Ordering::SeqCst);
        if self.flag(FAIL_STOP) {
            return Err(PluginError::failed(format!("{} refused to stop", self.name())));
        }
        Ok(())
    }

    fn get_statistics(&self) -> Statistics {
        Statistics::new(self.name()).with_value("running", self.is_running())
    }
}

#[async_trait]
impl Frontend for MockPlugin {
    fn can_log(&self) -> bool {
        self.flag(LOGS)
    }

    fn can_configure(&self) -> bool {
        self.flag(CONFIGURES)
    }

    fn can_handle_events(&self) -> bool {
        self.flag(HANDLES_EVENTS)
    }

    async fn write_log_message(&self, record: &LogRecord) -> Result<(), PluginError> {
        if self.flag(FAIL_LOG) {
            return Err(PluginError::failed("log sink unavailable"));
        }
        self.logs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }

    async fn handle_stats_event(&self, event: &EventRecord) -> Result<(), PluginError> {
        if self.flag(FAIL_EVENTS) {
            return Err(PluginError::failed("event sink unavailable"));
        }
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}

impl Worker for MockPlugin {}

impl Blockchain for MockPlugin {}

impl WorkSource for MockPlugin {
    fn parent(&self) -> Option<Arc<dyn WorkSource>> {
        self.parent.get()
    }

    fn set_parent(&self, parent: Option<&Arc<dyn WorkSource>>) {
        self.parent.set(parent);
    }
}

/// Builder for [`MockPlugin`]; every switch lands in the settings options.
pub struct MockPluginBuilder {
    kind: PluginKind,
    settings: Settings,
}

impl MockPluginBuilder {
    fn set(mut self, key: &str) -> Self {
        self.settings.options.insert(key.to_string(), true.into());
        self
    }

    pub fn logs(self) -> Self {
        self.set(LOGS)
    }

    pub fn configures(self) -> Self {
        self.set(CONFIGURES)
    }

    pub fn handles_events(self) -> Self {
        self.set(HANDLES_EVENTS)
    }

    pub fn fail_start(self) -> Self {
        self.set(FAIL_START)
    }

    pub fn fail_stop(self) -> Self {
        self.set(FAIL_STOP)
    }

    pub fn fail_log(self) -> Self {
        self.set(FAIL_LOG)
    }

    pub fn fail_events(self) -> Self {
        self.set(FAIL_EVENTS)
    }

    /// The saved record of this plugin cannot be inflated again.
    pub fn fail_inflate(self) -> Self {
        self.set(FAIL_INFLATE)
    }

    pub fn option(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.settings.options.insert(key.to_string(), value.into());
        self
    }

    /// Builds with an instance id from the core's registry.
    pub fn build(self, handle: &CoreHandle, journal: &CallJournal) -> Arc<MockPlugin> {
        self.build_detached(handle.allocate_id(), journal)
    }

    pub fn build_detached(self, id: PluginId, journal: &CallJournal) -> Arc<MockPlugin> {
        MockPlugin::from_settings(id, self.kind, self.settings, journal)
    }
}

// =============================================================================
// MOCK CLASSES
// =============================================================================

fn inflate_as(kind: PluginKind, handle: &CoreHandle, record: &DeflatedRecord) -> Result<PluginInstance, PluginError> {
    if record.settings.flag(FAIL_INFLATE) {
        return Err(PluginError::InvalidSettings(format!(
            "{} cannot be restored",
            record.settings.name
        )));
    }
    let plugin = MockPlugin::from_settings(handle.allocate_id(), kind, record.settings.clone(), &CallJournal::default());
    Ok(plugin.into_instance())
}

fn inflate_frontend(handle: &CoreHandle, record: &DeflatedRecord) -> Result<PluginInstance, PluginError> {
    inflate_as(PluginKind::Frontend, handle, record)
}

fn inflate_worker(handle: &CoreHandle, record: &DeflatedRecord) -> Result<PluginInstance, PluginError> {
    inflate_as(PluginKind::Worker, handle, record)
}

fn inflate_blockchain(handle: &CoreHandle, record: &DeflatedRecord) -> Result<PluginInstance, PluginError> {
    inflate_as(PluginKind::Blockchain, handle, record)
}

fn inflate_worksource(handle: &CoreHandle, record: &DeflatedRecord) -> Result<PluginInstance, PluginError> {
    inflate_as(PluginKind::WorkSource, handle, record)
}

fn autodetect_frontend(handle: &CoreHandle) -> Result<Vec<PluginInstance>, PluginError> {
    let frontend = MockPlugin::builder(PluginKind::Frontend, "Autodetected frontend")
        .logs()
        .configures()
        .build(handle, &CallJournal::default());
    Ok(vec![frontend.into_instance()])
}

fn autodetect_worker(handle: &CoreHandle) -> Result<Vec<PluginInstance>, PluginError> {
    let workers = (0..2)
        .map(|i| {
            MockPlugin::builder(PluginKind::Worker, &format!("Autodetected worker {i}"))
                .build(handle, &CallJournal::default())
                .into_instance()
        })
        .collect();
    Ok(workers)
}

pub static MOCK_FRONTEND_CLASS: PluginClass = PluginClass {
    kind: PluginKind::Frontend,
    type_tag: "mock.frontend",
    inflate: inflate_frontend,
    autodetect: Some(autodetect_frontend),
};

pub static MOCK_WORKER_CLASS: PluginClass = PluginClass {
    kind: PluginKind::Worker,
    type_tag: "mock.worker",
    inflate: inflate_worker,
    autodetect: Some(autodetect_worker),
};

pub static MOCK_BLOCKCHAIN_CLASS: PluginClass = PluginClass {
    kind: PluginKind::Blockchain,
    type_tag: "mock.blockchain",
    inflate: inflate_blockchain,
    autodetect: None,
};

pub static MOCK_WORKSOURCE_CLASS: PluginClass = PluginClass {
    kind: PluginKind::WorkSource,
    type_tag: "mock.worksource",
    inflate: inflate_worksource,
    autodetect: None,
};

// =============================================================================
// MOCK WORK COLLABORATORS
// =============================================================================

/// Job queue that journals its lifecycle and hands out string jobs.
#[derive(Debug, Clone, Default)]
pub struct MockJobQueue {
    journal: CallJournal,
    fail_start: bool,
}

impl MockJobQueue {
    pub fn new(journal: &CallJournal) -> Self {
        Self {
            journal: journal.clone(),
            fail_start: false,
        }
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }
}

#[async_trait]
impl JobQueue for MockJobQueue {
    async fn start(&self) -> Result<(), PluginError> {
        self.journal.record("start:jobqueue");
        if self.fail_start {
            return Err(PluginError::failed("job queue refused to start"));
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), PluginError> {
        self.journal.record("stop:jobqueue");
        Ok(())
    }

    async fn get_job(
        &self,
        worker: &Arc<dyn Worker>,
        _expiry_min_ahead: Duration,
        _async_mode: bool,
    ) -> Result<Option<JobRef>, PluginError> {
        self.journal.record(format!("get_job:{}", worker.name()));
        let job: JobRef = Arc::new(format!("job for {}", worker.name()));
        Ok(Some(job))
    }
}

/// Fetcher that journals its lifecycle and speed notifications.
#[derive(Debug, Clone, Default)]
pub struct MockFetcher {
    journal: CallJournal,
}

impl MockFetcher {
    pub fn new(journal: &CallJournal) -> Self {
        Self {
            journal: journal.clone(),
        }
    }
}

#[async_trait]
impl WorkFetcher for MockFetcher {
    async fn start(&self) -> Result<(), PluginError> {
        self.journal.record("start:fetcher");
        Ok(())
    }

    async fn stop(&self) -> Result<(), PluginError> {
        self.journal.record("stop:fetcher");
        Ok(())
    }

    fn notify_speed_changed(&self, worker: &Arc<dyn Worker>) {
        self.journal.record(format!("speed:{}", worker.name()));
    }
}
