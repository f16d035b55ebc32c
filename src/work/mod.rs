//! # Work Collaborators
//!
//! The job queue and the work fetcher live outside this crate. The core only
//! starts and stops them in lifecycle order and forwards calls to them; these
//! traits are the boundary it relies on.

use crate::framework::{PluginError, Worker};
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

/// An opaque unit of work handed to a worker.
pub type JobRef = Arc<dyn Any + Send + Sync>;

#[async_trait]
pub trait JobQueue: Send + Sync + 'static {
    async fn start(&self) -> Result<(), PluginError>;

    async fn stop(&self) -> Result<(), PluginError>;

    /// Next job for `worker` that stays valid for at least `expiry_min_ahead`.
    async fn get_job(
        &self,
        worker: &Arc<dyn Worker>,
        expiry_min_ahead: Duration,
        async_mode: bool,
    ) -> Result<Option<JobRef>, PluginError>;
}

#[async_trait]
pub trait WorkFetcher: Send + Sync + 'static {
    async fn start(&self) -> Result<(), PluginError>;

    async fn stop(&self) -> Result<(), PluginError>;

    fn notify_speed_changed(&self, worker: &Arc<dyn Worker>);
}

/// Job queue that never has work.
#[derive(Debug, Default)]
pub struct IdleJobQueue;

#[async_trait]
impl JobQueue for IdleJobQueue {
    async fn start(&self) -> Result<(), PluginError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), PluginError> {
        Ok(())
    }

    async fn get_job(
        &self,
        _worker: &Arc<dyn Worker>,
        _expiry_min_ahead: Duration,
        _async_mode: bool,
    ) -> Result<Option<JobRef>, PluginError> {
        Ok(None)
    }
}

/// Fetcher that fetches nothing.
#[derive(Debug, Default)]
pub struct IdleFetcher;

#[async_trait]
impl WorkFetcher for IdleFetcher {
    async fn start(&self) -> Result<(), PluginError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), PluginError> {
        Ok(())
    }

    fn notify_speed_changed(&self, _worker: &Arc<dyn Worker>) {}
}
