//! # Dispatcher Pipelines
//!
//! Two asynchronous fan-out pipelines feed the frontends:
//!
//! - [`LogPipeline`]: finished log lines, assembled per producer by a [`LineBuilder`].
//! - [`EventPipeline`]: structured lifecycle/telemetry [`EventRecord`]s.
//!
//! Both follow the same shape. Producers push onto an unbounded channel and
//! never block. One dispatcher task owns the receiving half and delivers each
//! record, in order, to every capable frontend. Stopping a dispatcher closes
//! the channel it is reading from: the task drains what was already queued,
//! sees `None`, and exits. The orchestrator waits for that at most a bounded
//! interval.

mod event;
mod log;
mod redirect;

pub use event::*;
pub use log::*;
pub use redirect::*;

use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// An unbounded channel whose receiving half is parked here until a dispatcher claims it.
pub(crate) struct Channel<T> {
    sender: mpsc::UnboundedSender<T>,
    receiver: Option<mpsc::UnboundedReceiver<T>>,
}

impl<T> Channel<T> {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Some(receiver),
        }
    }

    pub(crate) fn send(&self, item: T) -> bool {
        self.sender.send(item).is_ok()
    }

    pub(crate) fn take_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<T>> {
        self.receiver.take()
    }

    /// Closes the channel a running dispatcher reads from and opens a fresh one.
    ///
    /// No-op while the receiver is still parked, so nothing queued before the
    /// first start is lost.
    pub(crate) fn close(&mut self) {
        if self.receiver.is_none() {
            *self = Channel::new();
        }
    }
}

/// Join handle of a running dispatcher task.
#[derive(Default)]
pub(crate) struct DispatcherSlot {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl DispatcherSlot {
    pub(crate) fn set(&self, handle: JoinHandle<()>) {
        *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// `true` while a spawned dispatcher has not yet exited.
    pub(crate) fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Waits up to `timeout` for the dispatcher to exit, then proceeds regardless.
    pub(crate) async fn join(&self, pipeline: &'static str, timeout: Duration) {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            debug!(pipeline, "Dispatcher not running");
            return;
        };
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => debug!(pipeline, "Dispatcher joined"),
            Ok(Err(e)) => warn!(pipeline, error = %e, "Dispatcher task failed"),
            Err(_) => warn!(pipeline, ?timeout, "Dispatcher did not exit in time, detaching"),
        }
    }
}
