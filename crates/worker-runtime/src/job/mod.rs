//! # Jobs
//!
//! A job is a unit of scheduled work. The runtime only holds jobs and hands
//! them to whatever scheduler the service runs; it never executes them.

mod heartbeat;

pub use heartbeat::{HeartbeatJob, HEARTBEATS_METRIC};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use worker_chain::ChainClient;
use worker_telemetry::{Logger, Metrics};

use crate::ports::{KVStoreError, KeyValueStore};

/// When a job should run. Interpreted by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Schedule {
    /// Run once at startup.
    #[default]
    Once,
    /// Run repeatedly, `period` apart.
    Every(Duration),
}

/// Job failures reported back to the scheduler.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("required resource not registered: {0}")]
    MissingResource(&'static str),

    #[error(transparent)]
    Store(#[from] KVStoreError),

    #[error("job failed: {0}")]
    Failed(String),
}

/// Scheduled work unit.
#[async_trait]
pub trait Job: Send + Sync {
    /// Unique identifier of the job within an app.
    fn registry_key(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str {
        ""
    }

    fn schedule(&self) -> Schedule {
        Schedule::Once
    }

    /// Run the job once.
    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError>;
}

impl fmt::Debug for dyn Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("registry_key", &self.registry_key())
            .field("schedule", &self.schedule())
            .finish()
    }
}

/// Shared resources a job runs against.
#[derive(Clone)]
pub struct JobContext {
    pub app_name: Arc<str>,
    pub store: Option<Arc<dyn KeyValueStore>>,
    pub chain_client: Option<Arc<dyn ChainClient>>,
    pub metrics: Arc<dyn Metrics>,
    pub logger: Logger,
}

impl JobContext {
    /// Registered store, or `MissingResource`.
    pub fn require_store(&self) -> Result<&Arc<dyn KeyValueStore>, JobError> {
        self.store.as_ref().ok_or(JobError::MissingResource("store"))
    }

    /// Registered chain client, or `MissingResource`.
    pub fn require_chain_client(&self) -> Result<&Arc<dyn ChainClient>, JobError> {
        self.chain_client
            .as_ref()
            .ok_or(JobError::MissingResource("chain client"))
    }
}

impl fmt::Debug for JobContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobContext")
            .field("app_name", &self.app_name)
            .field("store", &self.store.is_some())
            .field("chain_client", &self.chain_client.is_some())
            .field("metrics_enabled", &self.metrics.is_enabled())
            .finish()
    }
}
