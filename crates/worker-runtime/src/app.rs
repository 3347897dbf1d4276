//! Assembled application.

use std::fmt;
use std::sync::Arc;

use worker_chain::ChainClient;
use worker_http::HttpServer;
use worker_telemetry::{Logger, Metrics};

use crate::job::{Job, JobContext};
use crate::ports::KeyValueStore;

/// Immutable snapshot of a builder's registrations plus a logger.
///
/// Components are shared with the builder and with every other app built
/// from it. Starting and stopping them is up to whoever created them.
#[derive(Clone)]
pub struct App {
    name: Arc<str>,
    jobs: Vec<Arc<dyn Job>>,
    store: Option<Arc<dyn KeyValueStore>>,
    chain_client: Option<Arc<dyn ChainClient>>,
    http_server: Option<Arc<HttpServer>>,
    metrics: Arc<dyn Metrics>,
    logger: Logger,
}

impl App {
    pub(crate) fn new(
        name: String,
        jobs: Vec<Arc<dyn Job>>,
        store: Option<Arc<dyn KeyValueStore>>,
        chain_client: Option<Arc<dyn ChainClient>>,
        http_server: Option<Arc<HttpServer>>,
        metrics: Arc<dyn Metrics>,
        logger: Logger,
    ) -> Self {
        Self {
            name: name.into(),
            jobs,
            store,
            chain_client,
            http_server,
            metrics,
            logger,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Jobs in registration order.
    pub fn jobs(&self) -> &[Arc<dyn Job>] {
        &self.jobs
    }

    /// First job registered under `key`.
    pub fn job(&self, key: &str) -> Option<&Arc<dyn Job>> {
        self.jobs.iter().find(|job| job.registry_key() == key)
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

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Handles a scheduler passes to [`Job::execute`].
    pub fn job_context(&self) -> JobContext {
        JobContext {
            app_name: Arc::clone(&self.name),
            store: self.store.clone(),
            chain_client: self.chain_client.clone(),
            metrics: Arc::clone(&self.metrics),
            logger: self.logger.component("jobs"),
        }
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("name", &self.name)
            .field("jobs", &self.jobs)
            .field("store", &self.store.is_some())
            .field("chain_client", &self.chain_client.as_ref().map(|c| c.name()))
            .field("http_server", &self.http_server)
            .field("metrics_enabled", &self.metrics.is_enabled())
            .field("logger", &self.logger)
            .finish()
    }
}
