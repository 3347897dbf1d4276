//! # Worker Chain
//!
//! Blockchain client contract consumed by the worker runtime.
//!
//! The runtime only holds a client; it never drives RPC itself. The one
//! thing it asks of a client is whether it supports metrics activation,
//! which a client answers through [`ChainClient::as_metrics_aware`].
//!
//! [`ChainProvider`] is the metrics-capable variant: it decorates any client
//! and reports per-call counters and latencies to the enabled provider.

mod client;
mod provider;

pub use client::{ChainClient, MetricsAware};
pub use provider::{ChainProvider, RPC_DURATION_METRIC, RPC_REQUESTS_METRIC};

use thiserror::Error;

/// Client errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("RPC call {method} failed: {message}")]
    Rpc { method: String, message: String },

    #[error("Chain client unavailable: {0}")]
    Unavailable(String),
}
