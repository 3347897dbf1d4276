//! Structured logging.
//!
//! `init_logging` installs the global `tracing` subscriber. [`Logger`] is the
//! handle a service passes to its application: a root span tagged with the
//! service name, under which components open child spans.

use std::env;
use std::sync::Arc;

use tracing::{info_span, Span};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::TelemetryError;

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Service name attached to the root span.
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full
    /// `EnvFilter` directive.
    pub level: String,

    /// Emit JSON lines instead of the pretty console format.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "worker".to_string(),
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LogConfig {
    /// Create configuration from environment variables.
    ///
    /// - `WORKER_SERVICE_NAME`: service name (default: worker)
    /// - `WORKER_LOG_LEVEL` or `RUST_LOG`: log level (default: info)
    /// - `WORKER_JSON_LOGS`: JSON output (default: true inside containers)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("WORKER_SERVICE_NAME").unwrap_or_else(|_| "worker".to_string()),

            level: env::var("WORKER_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json: env::var("WORKER_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),
        }
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails if the level directive is invalid or a subscriber is already set.
pub fn init_logging(config: &LogConfig) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_new(&config.level)
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    if config.json {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    }

    tracing::info!(
        service = %config.service_name,
        level = %config.level,
        json = config.json,
        "Logging initialized"
    );

    Ok(())
}

/// Logger handle passed to an application.
#[derive(Debug, Clone)]
pub struct Logger {
    service: Arc<str>,
    span: Span,
}

impl Logger {
    /// Root logger for `service`.
    pub fn new(service: impl Into<String>) -> Self {
        let service: String = service.into();
        let span = info_span!("service", name = %service);
        Self {
            service: Arc::from(service),
            span,
        }
    }

    /// Logger for a named component under this one.
    pub fn component(&self, component: &str) -> Self {
        Self {
            service: Arc::clone(&self.service),
            span: info_span!(parent: &self.span, "component", name = component),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Run `f` inside this logger's span.
    pub fn in_scope<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.span.in_scope(f)
    }
}
