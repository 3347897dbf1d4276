//! Metrics-capable client decorator.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;
use worker_telemetry::Metrics;

use crate::{ChainClient, ChainError, MetricsAware};

/// Counter of calls, tagged by `method` and `status`.
pub const RPC_REQUESTS_METRIC: &str = "chain_rpc_requests_total";

/// Histogram of call latency in seconds, tagged by `method`.
pub const RPC_DURATION_METRIC: &str = "chain_rpc_duration_seconds";

/// Wraps a [`ChainClient`] and reports per-call metrics once a provider has
/// been enabled.
pub struct ChainProvider {
    inner: Arc<dyn ChainClient>,
    metrics: RwLock<Option<Arc<dyn Metrics>>>,
}

impl ChainProvider {
    pub fn new(inner: Arc<dyn ChainClient>) -> Self {
        Self {
            inner,
            metrics: RwLock::new(None),
        }
    }

    pub fn inner(&self) -> &Arc<dyn ChainClient> {
        &self.inner
    }

    async fn instrumented<T, F>(&self, method: &'static str, call: F) -> Result<T, ChainError>
    where
        F: Future<Output = Result<T, ChainError>>,
    {
        let metrics = self.metrics.read().clone();
        let Some(metrics) = metrics else {
            return call.await;
        };

        let start = Instant::now();
        let result = call.await;
        let status = if result.is_ok() { "ok" } else { "error" };

        metrics.incr(RPC_REQUESTS_METRIC, &[("method", method), ("status", status)]);
        metrics.time(RPC_DURATION_METRIC, start, &[("method", method)]);
        result
    }
}

#[async_trait]
impl ChainClient for ChainProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn chain_id(&self) -> Result<u64, ChainError> {
        self.instrumented("chain_id", self.inner.chain_id()).await
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        self.instrumented("block_number", self.inner.block_number()).await
    }

    fn as_metrics_aware(&self) -> Option<&dyn MetricsAware> {
        Some(self)
    }
}

impl MetricsAware for ChainProvider {
    fn enable_metrics(&self, metrics: Arc<dyn Metrics>) {
        debug!(client = self.inner.name(), "Enabling chain client metrics");
        *self.metrics.write() = Some(metrics);
    }

    fn metrics(&self) -> Option<Arc<dyn Metrics>> {
        self.metrics.read().clone()
    }
}
