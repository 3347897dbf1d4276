//! Liveness job.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tracing::debug;

use super::{Job, JobContext, JobError, Schedule};

/// Counter of completed heartbeats.
pub const HEARTBEATS_METRIC: &str = "heartbeats_total";

/// Writes the current unix time (big-endian seconds) under
/// `heartbeat:<app name>` on every run.
#[derive(Debug, Clone)]
pub struct HeartbeatJob {
    interval: Duration,
}

impl HeartbeatJob {
    pub const KEY: &'static str = "heartbeat";

    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Store key written for `app_name`.
    pub fn store_key(app_name: &str) -> Vec<u8> {
        format!("{}:{}", Self::KEY, app_name).into_bytes()
    }
}

#[async_trait]
impl Job for HeartbeatJob {
    fn registry_key(&self) -> &str {
        Self::KEY
    }

    fn description(&self) -> &str {
        "Records the last time the worker was alive"
    }

    fn schedule(&self) -> Schedule {
        Schedule::Every(self.interval)
    }

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        ctx.require_store()?
            .put(&Self::store_key(&ctx.app_name), &now.to_be_bytes())?;
        ctx.metrics.incr(HEARTBEATS_METRIC, &[]);

        debug!(app = %ctx.app_name, at = now, "Heartbeat");
        Ok(())
    }
}
