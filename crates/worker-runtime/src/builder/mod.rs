//! # App Builder
//!
//! Collects the subsystems of a worker service and assembles them into an
//! [`App`].
//!
//! ## Ordering
//!
//! Registrations may happen in any order, except that HTTP handlers,
//! middleware and the metrics endpoint need a server to attach to:
//!
//! ```text
//! register_http_server ──→ register_http_handler
//!                     ├──→ register_middleware
//!                     └──→ register_metrics_endpoint
//! ```
//!
//! `register_metrics` activates the new provider on the chain client
//! registered at that moment, so register the client first when it should
//! report metrics.
//!
//! `build` takes `&self`: the builder stays usable, and every app built from
//! it shares the same component handles.


use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use worker_chain::ChainClient;
use worker_http::{Handler, HttpServer, Middleware};
use worker_telemetry::{
    Logger, Metrics, MetricsConfig, NoopMetrics, PrometheusMetrics, TelemetryError,
};

use crate::app::App;
use crate::job::Job;
use crate::ports::KeyValueStore;

/// Builder errors.
#[derive(Debug, Error)]
pub enum BuilderError {
    /// An HTTP-dependent registration was attempted before a server.
    #[error("HTTP server not enabled: register an HTTP server before registering {what}")]
    HttpServerNotEnabled { what: &'static str },

    /// The metrics provider rejected its configuration.
    #[error("invalid metrics configuration: {0}")]
    InvalidMetricsConfig(#[from] TelemetryError),
}

/// What `register_metrics` did with the registered chain client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsActivation {
    /// The client supports metrics and now reports to the new provider.
    Activated,
    /// No client was registered.
    SkippedNoClient,
    /// The registered client does not support metrics activation.
    SkippedUnsupported,
}

/// Registry of subsystems for one worker service.
pub struct AppBuilder {
    name: String,
    jobs: Vec<Arc<dyn Job>>,
    store: Option<Arc<dyn KeyValueStore>>,
    chain_client: Option<Arc<dyn ChainClient>>,
    http_server: Option<Arc<HttpServer>>,
    metrics: Arc<dyn Metrics>,
}

impl AppBuilder {
    /// Empty builder with a fresh no-op metrics provider.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            jobs: Vec::new(),
            store: None,
            chain_client: None,
            http_server: None,
            metrics: Arc::new(NoopMetrics::new()),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.name
    }

    /// Append a job. Order is kept and duplicates are allowed.
    pub fn register_job(&mut self, job: Arc<dyn Job>) -> &mut Self {
        self.jobs.push(job);
        self
    }

    /// Set the key-value store, replacing any previous one.
    pub fn register_store(&mut self, store: Arc<dyn KeyValueStore>) -> &mut Self {
        self.store = Some(store);
        self
    }

    /// Set the chain client, replacing any previous one.
    pub fn register_chain_client(&mut self, client: Arc<dyn ChainClient>) -> &mut Self {
        self.chain_client = Some(client);
        self
    }

    /// Set the HTTP server, replacing any previous one.
    pub fn register_http_server(&mut self, server: Arc<HttpServer>) -> &mut Self {
        self.http_server = Some(server);
        self
    }

    /// Add a handler to the registered server.
    pub fn register_http_handler(&self, handler: Handler) -> Result<(), BuilderError> {
        self.require_http_server("an HTTP handler")?
            .register_handler(handler);
        Ok(())
    }

    /// Append to the registered server's middleware chain.
    pub fn register_middleware(&self, middleware: Middleware) -> Result<(), BuilderError> {
        self.require_http_server("middleware")?
            .register_middleware(middleware);
        Ok(())
    }

    /// Serve the metrics exposition at `/metrics` on the registered server.
    pub fn register_metrics_endpoint(&self) -> Result<(), BuilderError> {
        self.require_http_server("the metrics endpoint")?
            .register_handler(Handler::metrics_endpoint());
        Ok(())
    }

    /// Replace the metrics provider with one built from `config`, then
    /// enable it on the registered chain client if the client supports it.
    ///
    /// Samples are exposed through [`register_metrics_endpoint`](Self::register_metrics_endpoint).
    /// A configured `endpoint` is not pushed to until the owner calls
    /// [`worker_telemetry::spawn_pusher`] with the same config.
    ///
    /// # Errors
    ///
    /// `InvalidMetricsConfig` if `config` is rejected. The current provider
    /// is kept.
    pub fn register_metrics(
        &mut self,
        config: &MetricsConfig,
    ) -> Result<MetricsActivation, BuilderError> {
        let provider: Arc<dyn Metrics> = Arc::new(PrometheusMetrics::new(config)?);
        self.metrics = Arc::clone(&provider);

        let Some(client) = &self.chain_client else {
            return Ok(MetricsActivation::SkippedNoClient);
        };
        match client.as_metrics_aware() {
            Some(aware) => {
                aware.enable_metrics(provider);
                Ok(MetricsActivation::Activated)
            }
            None => Ok(MetricsActivation::SkippedUnsupported),
        }
    }

    pub fn jobs(&self) -> &[Arc<dyn Job>] {
        &self.jobs
    }

    pub fn store(&self) -> Option<&Arc<dyn KeyValueStore>> {
        self.store.as_ref()
    }

    pub fn chain_client(&self) -> Option<&Arc<dyn ChainClient>> {
        self.chain_client.as_ref()
    }

    pub fn http_server(&self) -> Option<&Arc<HttpServer>> {
        self.http_server.as_ref()
    }

    pub fn metrics(&self) -> &Arc<dyn Metrics> {
        &self.metrics
    }

    /// Snapshot the current registrations into an app.
    pub fn build(&self, logger: Logger) -> App {
        App::new(
            self.name.clone(),
            self.jobs.clone(),
            self.store.clone(),
            self.chain_client.clone(),
            self.http_server.clone(),
            Arc::clone(&self.metrics),
            logger,
        )
    }

    fn require_http_server(&self, what: &'static str) -> Result<&Arc<HttpServer>, BuilderError> {
        self.http_server
            .as_ref()
            .ok_or(BuilderError::HttpServerNotEnabled { what })
    }
}

impl fmt::Debug for AppBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppBuilder")
            .field("name", &self.name)
            .field("jobs", &self.jobs)
            .field("store", &self.store.is_some())
            .field("chain_client", &self.chain_client.as_ref().map(|c| c.name()))
            .field("http_server", &self.http_server)
            .field("metrics_enabled", &self.metrics.is_enabled())
            .finish()
    }
}
