//! # Log Pipeline
//!
//! Producers build a line incrementally through a [`LineBuilder`]; the line
//! becomes one immutable [`LogRecord`] the moment a fragment ends with `'\n'`.
//! The dispatcher task fans records out to every log-capable frontend.
//!
//! Until the core is live (the dispatcher running and frontends started),
//! records at or below the default level are also printed synchronously to
//! the fallback writer, normally the process's standard error, so that early
//! failures are never invisible.

use crate::collections::Collection;
use crate::framework::{Frontend, LogSource, PluginId};
use crate::pipeline::{Channel, DispatcherSlot};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Numeric severity; lower is more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogLevel(pub u32);

impl LogLevel {
    pub const BANNER: LogLevel = LogLevel(0);
    pub const CRITICAL: LogLevel = LogLevel(10);
    pub const FAULT: LogLevel = LogLevel(50);
    pub const ERROR: LogLevel = LogLevel(100);
    pub const NOTICE: LogLevel = LogLevel(200);
    pub const WARNING: LogLevel = LogLevel(300);
    pub const INFO: LogLevel = LogLevel(500);
    pub const DEBUG: LogLevel = LogLevel(700);
    pub const TRACE: LogLevel = LogLevel(800);
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:3}", self.0)
    }
}

/// One piece of a log line together with its style hint (e.g. `"rB"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFragment {
    pub text: String,
    pub format: String,
}

/// A finished log line.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub source: LogSource,
    /// Time of the first fragment.
    pub timestamp: DateTime<Local>,
    /// Most severe level among the fragments.
    pub level: LogLevel,
    pub fragments: Vec<LogFragment>,
}

impl LogRecord {
    pub fn text(&self) -> String {
        self.fragments.iter().map(|f| f.text.as_str()).collect()
    }
}

/// Multiplexes finished log lines to the log-capable frontends.
pub struct LogPipeline {
    channel: Mutex<Channel<LogRecord>>,
    dispatcher: DispatcherSlot,
    live: AtomicBool,
    default_level: LogLevel,
    // Doubles as the print lock for the fallback path.
    fallback: Mutex<Box<dyn Write + Send>>,
    broken: Mutex<HashSet<PluginId>>,
}

impl LogPipeline {
    pub fn new(default_level: LogLevel, fallback: Box<dyn Write + Send>) -> Self {
        Self {
            channel: Mutex::new(Channel::new()),
            dispatcher: DispatcherSlot::default(),
            live: AtomicBool::new(false),
            default_level,
            fallback: Mutex::new(fallback),
            broken: Mutex::new(HashSet::new()),
        }
    }

    pub fn default_level(&self) -> LogLevel {
        self.default_level
    }

    /// Whether the fallback path is switched off.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub fn set_live(&self, live: bool) {
        self.live.store(live, Ordering::SeqCst);
    }

    /// Starts a line for `source`.
    pub fn line(self: &Arc<Self>, source: LogSource) -> LineBuilder {
        LineBuilder {
            pipeline: Arc::clone(self),
            source,
            pending: None,
        }
    }

    /// Logs one complete line. Text without a trailing `'\n'` is dropped.
    pub fn log(self: &Arc<Self>, source: &LogSource, text: impl Into<String>, level: LogLevel, format: &str) {
        self.line(source.clone()).append(text, level, format);
    }

    /// Enqueues a finished record, echoing it to the fallback writer while not live.
    pub fn submit(&self, record: LogRecord) {
        if !self.is_live() && record.level <= self.default_level {
            self.write_fallback(&record);
        }
        let sent = self
            .channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(record);
        if !sent {
            warn!(pipeline = "log", "Log channel closed, record dropped");
        }
    }

    fn write_fallback(&self, record: &LogRecord) {
        let prefix = format!(
            "{} [{}] {}: ",
            record.timestamp.format("%Y-%m-%d %H:%M:%S%.6f"),
            record.level,
            record.source.name
        );
        let text = record.text();
        let mut out = self.fallback.lock().unwrap_or_else(PoisonError::into_inner);
        for line in text.split_inclusive('\n') {
            // Nowhere left to report a failing fallback stream.
            let _ = write!(out, "{prefix}{line}");
        }
        let _ = out.flush();
    }

    /// Flags a frontend whose log delivery failed. Returns `true` the first time only.
    pub fn mark_broken(&self, frontend: PluginId) -> bool {
        self.broken
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(frontend)
    }

    pub fn is_broken(&self, frontend: PluginId) -> bool {
        self.broken
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&frontend)
    }

    /// Spawns the dispatcher task. Returns `false` if one is already running.
    pub fn start_dispatcher(self: &Arc<Self>, frontends: Arc<Collection<dyn Frontend>>) -> bool {
        let receiver = self
            .channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take_receiver();
        let Some(receiver) = receiver else {
            return false;
        };
        let handle = tokio::spawn(dispatch(receiver, Arc::clone(self), frontends));
        self.dispatcher.set(handle);
        true
    }

    /// Closes the channel, then waits up to `timeout` for the dispatcher to drain and exit.
    pub async fn stop_dispatcher(&self, timeout: Duration) {
        self.close_channel();
        self.dispatcher.join("log", timeout).await;
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
    mut receiver: tokio::sync::mpsc::UnboundedReceiver<LogRecord>,
    pipeline: Arc<LogPipeline>,
    frontends: Arc<Collection<dyn Frontend>>,
) {
    info!(pipeline = "log", "Dispatcher started");
    let mut delivered: u64 = 0;

    while let Some(record) = receiver.recv().await {
        for frontend in frontends.list() {
            if !frontend.can_log() {
                continue;
            }
            if let Err(e) = frontend.write_log_message(&record).await {
                if pipeline.mark_broken(frontend.id()) {
                    warn!(pipeline = "log", frontend = %frontend.name(), error = %e, "Frontend log delivery broken");
                    pipeline.log(
                        &frontend.source(),
                        format!("Exception while logging message: {e}\n"),
                        LogLevel::FAULT,
                        "rB",
                    );
                }
            }
        }
        delivered += 1;
    }

    info!(pipeline = "log", delivered, "Dispatcher stopped");
}

#[derive(Debug)]
struct PendingLine {
    timestamp: DateTime<Local>,
    level: LogLevel,
    fragments: Vec<LogFragment>,
}

/// A producer's handle for building one log line at a time.
///
/// Fragments accumulate until one ends with `'\n'`, at which point the whole
/// line is submitted and the builder is empty again. A builder dropped with
/// an unterminated line discards it.
pub struct LineBuilder {
    pipeline: Arc<LogPipeline>,
    source: LogSource,
    pending: Option<PendingLine>,
}

impl LineBuilder {
    pub fn append(&mut self, text: impl Into<String>, level: LogLevel, format: &str) -> &mut Self {
        let text = text.into();
        let complete = text.ends_with('\n');

        let pending = self.pending.get_or_insert_with(|| PendingLine {
            timestamp: Local::now(),
            level,
            fragments: Vec::new(),
        });
        pending.level = pending.level.min(level);
        pending.fragments.push(LogFragment {
            text,
            format: format.to_string(),
        });

        if complete {
            if let Some(line) = self.pending.take() {
                self.pipeline.submit(LogRecord {
                    source: self.source.clone(),
                    timestamp: line.timestamp,
                    level: line.level,
                    fragments: line.fragments,
                });
            }
        }
        self
    }

    pub fn source(&self) -> &LogSource {
        &self.source
    }

    /// `true` when no unterminated fragments are buffered.
    pub fn is_empty(&self) -> bool {
        self.pending.is_none()
    }

    pub fn discard(&mut self) {
        self.pending = None;
    }
}

impl Drop for LineBuilder {
    fn drop(&mut self) {
        if let Some(line) = &self.pending {
            debug!(
                source = %self.source.name,
                fragments = line.fragments.len(),
                "Discarding unterminated log line"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::mock::CapturedOutput;

    fn pipeline(level: LogLevel) -> (Arc<LogPipeline>, CapturedOutput) {
        let out = CapturedOutput::default();
        (Arc::new(LogPipeline::new(level, Box::new(out.clone()))), out)
    }

    fn drain(pipeline: &LogPipeline) -> Vec<LogRecord> {
        let mut receiver = pipeline.channel.lock().unwrap().take_receiver().unwrap();
        let mut records = Vec::new();
        while let Ok(record) = receiver.try_recv() {
            records.push(record);
        }
        records
    }

    #[test]
    fn partial_lines_are_not_enqueued() {
        let (pipeline, _) = pipeline(LogLevel::INFO);
        let mut line = pipeline.line(LogSource::new(1, "w1"));
        line.append("hashing ", LogLevel::DEBUG, "");
        line.append("at 4 GH/s", LogLevel::INFO, "B");
        assert!(!line.is_empty());
        line.discard();
        drop(line);
        assert!(drain(&pipeline).is_empty());
    }

    #[test]
    fn completed_line_keeps_fragment_order_and_minimum_level() {
        let (pipeline, _) = pipeline(LogLevel::INFO);
        let mut line = pipeline.line(LogSource::new(1, "w1"));
        line.append("a", LogLevel::DEBUG, "")
            .append("b", LogLevel::ERROR, "r")
            .append("c\n", LogLevel::INFO, "");
        assert!(line.is_empty());

        let records = drain(&pipeline);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, LogLevel::ERROR);
        assert_eq!(records[0].text(), "abc\n");
        let formats: Vec<_> = records[0].fragments.iter().map(|f| f.format.as_str()).collect();
        assert_eq!(formats, vec!["", "r", ""]);
    }

    #[test]
    fn builder_is_reusable_after_flush() {
        let (pipeline, _) = pipeline(LogLevel::INFO);
        let mut line = pipeline.line(LogSource::new(1, "w1"));
        line.append("one\n", LogLevel::INFO, "");
        line.append("two", LogLevel::WARNING, "").append("\n", LogLevel::INFO, "");
        let records = drain(&pipeline);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].text(), "two\n");
        assert_eq!(records[1].level, LogLevel::WARNING);
    }

    #[test]
    fn fallback_prints_each_line_with_prefix_until_live() {
        let (pipeline, out) = pipeline(LogLevel::INFO);
        let source = LogSource::new(-1, "Core");
        pipeline.log(&source, "first\nsecond\n", LogLevel::ERROR, "rB");
        pipeline.log(&source, "too verbose\n", LogLevel::DEBUG, "");
        pipeline.set_live(true);
        pipeline.log(&source, "after startup\n", LogLevel::ERROR, "");

        let text = out.contents();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("[100] Core: first"));
        assert!(lines[1].ends_with("[100] Core: second"));
        // All records still reach the queue.
        assert_eq!(drain(&pipeline).len(), 3);
    }

    #[test]
    fn broken_flag_is_reported_once() {
        let (pipeline, _) = pipeline(LogLevel::INFO);
        assert!(pipeline.mark_broken(7));
        assert!(!pipeline.mark_broken(7));
        assert!(pipeline.is_broken(7));
        assert!(!pipeline.is_broken(8));
    }
}
