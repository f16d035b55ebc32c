//! The context handed to plugins.

use crate::framework::{LogSource, PersistenceError, PluginId, PluginInstance};
use crate::persistence::{self, DeflatedRecord};
use crate::pipeline::{EventPipeline, EventRecord, LineBuilder, LogLevel, LogPipeline};
use crate::registry::PluginRegistry;
use std::io::Write;
use std::sync::Arc;

/// A cheap, cloneable view of the core's registry and pipelines.
///
/// Inflate and autodetect functions receive one; plugins keep a clone to log
/// and emit events for as long as they live.
#[derive(Clone)]
pub struct CoreHandle {
    registry: Arc<PluginRegistry>,
    log: Arc<LogPipeline>,
    events: Arc<EventPipeline>,
}

impl CoreHandle {
    pub(crate) fn new(registry: Arc<PluginRegistry>, log: Arc<LogPipeline>, events: Arc<EventPipeline>) -> Self {
        Self { registry, log, events }
    }

    /// A handle with its own empty registry and idle pipelines at [`LogLevel::INFO`].
    ///
    /// Useful for exercising plugins outside a running core.
    pub fn detached(fallback: Box<dyn Write + Send>) -> Self {
        let log = Arc::new(LogPipeline::new(LogLevel::INFO, fallback));
        let events = Arc::new(EventPipeline::new(Arc::clone(&log)));
        Self::new(Arc::new(PluginRegistry::new()), log, events)
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn log_pipeline(&self) -> &Arc<LogPipeline> {
        &self.log
    }

    pub fn event_pipeline(&self) -> &Arc<EventPipeline> {
        &self.events
    }

    /// Logs one complete line (text must end with `'\n'`).
    pub fn log(&self, source: &LogSource, text: impl Into<String>, level: LogLevel, format: &str) {
        self.log.log(source, text, level, format);
    }

    pub fn line(&self, source: LogSource) -> LineBuilder {
        self.log.line(source)
    }

    pub fn event(&self, record: EventRecord) {
        self.events.submit(record);
    }

    pub fn allocate_id(&self) -> PluginId {
        self.registry.allocate_instance_id()
    }

    /// Reconstructs a plugin instance from its deflated record.
    pub fn inflate(&self, record: &DeflatedRecord) -> Result<PluginInstance, PersistenceError> {
        persistence::inflate(self, record)
    }
}
