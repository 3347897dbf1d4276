//! # Worker Telemetry
//!
//! Metrics and logging for worker services.
//!
//! ## Components
//!
//! - **Metrics providers**: [`NoopMetrics`] (default) and
//!   [`PrometheusMetrics`] (built from [`MetricsConfig`])
//! - **Exposition**: [`encode_metrics`] renders the process registry in
//!   Prometheus text format; [`spawn_pusher`] pushes it periodically
//! - **Logging**: [`init_logging`] and the [`Logger`] handle
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use worker_telemetry::{Metrics, MetricsConfig, PrometheusMetrics};
//!
//! let config = MetricsConfig::with_endpoint("http://pushgateway:9091").label("env", "prod");
//! let metrics: Arc<dyn Metrics> = Arc::new(PrometheusMetrics::new(&config)?);
//! metrics.incr("jobs_executed", &[("job", "poller")]);
//! ```

mod config;
mod logging;
pub mod metrics;
mod push;

pub use config::{parse_labels, MetricsConfig, DEFAULT_FLUSH_INTERVAL, DEFAULT_NAMESPACE};
pub use logging::{init_logging, LogConfig, Logger};
pub use metrics::{encode_metrics, Metrics, MetricsTimer, NoopMetrics, PrometheusMetrics, REGISTRY};
pub use push::{push_once, push_target, spawn_pusher};

/// Content type of [`encode_metrics`] output.
pub const METRICS_CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

use thiserror::Error;

/// Telemetry errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to push metrics: {0}")]
    Push(String),
}

/// Record a counter increment.
#[macro_export]
macro_rules! metric_inc {
    ($metrics:expr, $name:expr) => {
        $metrics.incr($name, &[])
    };
    ($metrics:expr, $name:expr, $($key:expr => $value:expr),+ $(,)?) => {
        $metrics.incr($name, &[$(($key, $value)),+])
    };
}
