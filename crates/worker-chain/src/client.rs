//! Client contracts.

use std::sync::Arc;

use async_trait::async_trait;
use worker_telemetry::Metrics;

use crate::ChainError;

/// Base capability set of a blockchain client.
///
/// Connection lifecycle belongs to whoever constructed the client.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Client name for logging and metrics.
    fn name(&self) -> &str;

    /// Chain identifier reported by the node.
    async fn chain_id(&self) -> Result<u64, ChainError>;

    /// Latest block height.
    async fn block_number(&self) -> Result<u64, ChainError>;

    /// Whether the node currently answers.
    async fn health_check(&self) -> bool {
        self.block_number().await.is_ok()
    }

    /// Capability query for metrics activation.
    ///
    /// Clients that can report to a metrics provider return `Some(self)`.
    fn as_metrics_aware(&self) -> Option<&dyn MetricsAware> {
        None
    }
}

/// Optional capability: accept a metrics provider and start reporting to it.
pub trait MetricsAware: Send + Sync {
    /// Replace the active provider.
    fn enable_metrics(&self, metrics: Arc<dyn Metrics>);

    /// Currently active provider, if any.
    fn metrics(&self) -> Option<Arc<dyn Metrics>>;
}
