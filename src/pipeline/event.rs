//! # Event Pipeline
//!
//! Structured lifecycle and telemetry events. Unlike log lines there is no
//! buffering step: every [`EventPipeline::submit`] enqueues one record.

use crate::collections::Collection;
use crate::framework::{Blockchain, Frontend, LogSource, Plugin, WorkSource, Worker};
use crate::pipeline::{Channel, DispatcherSlot, LogLevel, LogPipeline};
use crate::work::JobRef;
use chrono::{DateTime, Local};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{info, warn};

/// An immutable, structured event.
#[derive(Clone)]
pub struct EventRecord {
    pub level: LogLevel,
    pub source: LogSource,
    pub event: String,
    pub arg: Option<serde_json::Value>,
    pub message: Option<String>,
    pub worker: Option<Arc<dyn Worker>>,
    pub worksource: Option<Arc<dyn WorkSource>>,
    pub blockchain: Option<Arc<dyn Blockchain>>,
    pub job: Option<JobRef>,
    pub timestamp: DateTime<Local>,
}

impl EventRecord {
    pub fn new(level: LogLevel, source: LogSource, event: impl Into<String>) -> Self {
        Self {
            level,
            source,
            event: event.into(),
            arg: None,
            message: None,
            worker: None,
            worksource: None,
            blockchain: None,
            job: None,
            timestamp: Local::now(),
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<serde_json::Value>) -> Self {
        self.arg = Some(arg.into());
        self
    }

    pub fn worker(mut self, worker: Arc<dyn Worker>) -> Self {
        self.worker = Some(worker);
        self
    }

    pub fn worksource(mut self, worksource: Arc<dyn WorkSource>) -> Self {
        self.worksource = Some(worksource);
        self
    }

    pub fn blockchain(mut self, blockchain: Arc<dyn Blockchain>) -> Self {
        self.blockchain = Some(blockchain);
        self
    }

    pub fn job(mut self, job: JobRef) -> Self {
        self.job = Some(job);
        self
    }
}

impl fmt::Debug for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRecord")
            .field("level", &self.level)
            .field("source", &self.source)
            .field("event", &self.event)
            .field("arg", &self.arg)
            .field("message", &self.message)
            .field("worker", &self.worker.as_ref().map(|w| w.name()))
            .field("worksource", &self.worksource.as_ref().map(|w| w.name()))
            .field("blockchain", &self.blockchain.as_ref().map(|b| b.name()))
            .field("job", &self.job.is_some())
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

/// Multiplexes events to the event-capable frontends.
pub struct EventPipeline {
    channel: Mutex<Channel<EventRecord>>,
    dispatcher: DispatcherSlot,
    log: Arc<LogPipeline>,
}

impl EventPipeline {
    /// `log` receives delivery-failure diagnostics.
    pub fn new(log: Arc<LogPipeline>) -> Self {
        Self {
            channel: Mutex::new(Channel::new()),
            dispatcher: DispatcherSlot::default(),
            log,
        }
    }

    pub fn submit(&self, record: EventRecord) {
        let sent = self
            .channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(record);
        if !sent {
            warn!(pipeline = "event", "Event channel closed, record dropped");
        }
    }

    /// Spawns the dispatcher task. Returns `false` if one is already running.
    pub fn start_dispatcher(&self, frontends: Arc<Collection<dyn Frontend>>) -> bool {
        let receiver = self
            .channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take_receiver();
        let Some(receiver) = receiver else {
            return false;
        };
        let handle = tokio::spawn(dispatch(receiver, Arc::clone(&self.log), frontends));
        self.dispatcher.set(handle);
        true
    }

    pub async fn stop_dispatcher(&self, timeout: Duration) {
        self.close_channel();
        self.dispatcher.join("event", timeout).await;
    }

    /// Ends the current channel so the dispatcher exits once it has drained.
    pub(crate) fn close_channel(&self) {
        self.channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .close();
    }

    pub fn is_dispatching(&self) -> bool {
        self.dispatcher.is_running()
    }
}

async fn dispatch(
    mut receiver: tokio::sync::mpsc::UnboundedReceiver<EventRecord>,
    log: Arc<LogPipeline>,
    frontends: Arc<Collection<dyn Frontend>>,
) {
    info!(pipeline = "event", "Dispatcher started");
    let mut delivered: u64 = 0;

    while let Some(record) = receiver.recv().await {
        for frontend in frontends.list() {
            if !frontend.can_handle_events() {
                continue;
            }
            if let Err(e) = frontend.handle_stats_event(&record).await {
                log.log(
                    &frontend.source(),
                    format!("Exception while logging event: {e}\n"),
                    LogLevel::NOTICE,
                    "r",
                );
            }
        }
        delivered += 1;
    }

    info!(pipeline = "event", delivered, "Dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::mock::{CallJournal, CapturedOutput, MockPlugin};
    use crate::framework::PluginKind;

    #[tokio::test]
    async fn events_reach_frontends_in_order_and_failures_are_isolated() {
        let log = Arc::new(LogPipeline::new(LogLevel::INFO, Box::new(CapturedOutput::default())));
        let events = EventPipeline::new(Arc::clone(&log));
        let journal = CallJournal::default();

        let failing = MockPlugin::builder(PluginKind::Frontend, "broken")
            .handles_events()
            .fail_events()
            .build_detached(1, &journal);
        let healthy = MockPlugin::builder(PluginKind::Frontend, "healthy")
            .handles_events()
            .build_detached(2, &journal);
        let frontends: Arc<Collection<dyn Frontend>> = Arc::new(Collection::new());
        frontends.insert(failing.clone());
        frontends.insert(healthy.clone());

        let source = LogSource::new(-1, "Core");
        events.submit(EventRecord::new(LogLevel::ERROR, source.clone(), "e1"));
        events.submit(EventRecord::new(LogLevel::ERROR, source.clone(), "e2").arg(42));

        assert!(events.start_dispatcher(Arc::clone(&frontends)));
        assert!(!events.start_dispatcher(Arc::clone(&frontends)));
        events.stop_dispatcher(Duration::from_secs(5)).await;

        let seen: Vec<_> = healthy.events().iter().map(|e| e.event.clone()).collect();
        assert_eq!(seen, vec!["e1", "e2"]);
        assert_eq!(healthy.events()[1].arg, Some(serde_json::json!(42)));
        assert!(failing.events().is_empty());
    }
}
