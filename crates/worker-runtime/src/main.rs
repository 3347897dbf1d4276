//! # Worker
//!
//! Runs a worker service wired from `WORKER_*` environment variables.
//!
//! ## Startup Sequence
//!
//! 1. Load and validate configuration
//! 2. Initialize logging
//! 3. Open the store and create the HTTP server
//! 4. Register jobs, metrics and handlers on the builder
//! 5. Build the app, start jobs and the HTTP server
//! 6. Run until Ctrl+C, then shut the server down

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::get;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn, Instrument};

use worker_http::{Handler, HttpError, HttpServer, Middleware};
use worker_runtime::{
    App, AppBuilder, HeartbeatJob, InMemoryKVStore, KeyValueStore, Schedule, StoreConfig,
    WorkerConfig,
};
use worker_telemetry::{init_logging, spawn_pusher, Logger};

#[tokio::main]
async fn main() -> Result<()> {
    let config = WorkerConfig::from_env().context("failed to read configuration")?;
    init_logging(&config.log).context("failed to initialize logging")?;
    config.validate().context("invalid configuration")?;

    info!(app = %config.app_name, "Starting worker");

    let app = wire(&config)?;
    let pusher = match &config.metrics {
        Some(metrics) => spawn_pusher(metrics).context("failed to start metrics pusher")?,
        None => None,
    };
    let jobs = spawn_jobs(&app);

    let server = app
        .http_server()
        .cloned()
        .context("HTTP server not registered")?;
    let mut serving = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.start().await })
    };

    info!("Worker is running. Press Ctrl+C to stop.");
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for Ctrl+C")?;
            info!("Shutting down");
        }
        joined = &mut serving => {
            error!("HTTP server exited");
            stop_tasks(jobs, pusher);
            return server_result(joined);
        }
    }

    server.shutdown();
    stop_tasks(jobs, pusher);
    server_result(serving.await)?;

    info!("Worker stopped");
    Ok(())
}

fn server_result(joined: Result<Result<(), HttpError>, JoinError>) -> Result<()> {
    joined
        .context("HTTP server task panicked")?
        .context("HTTP server failed")
}

fn stop_tasks(jobs: Vec<JoinHandle<()>>, pusher: Option<JoinHandle<()>>) {
    for job in jobs.into_iter().chain(pusher) {
        job.abort();
    }
}

fn wire(config: &WorkerConfig) -> Result<App> {
    let mut builder = AppBuilder::new(config.app_name.clone());

    builder
        .register_store(open_store(&config.store)?)
        .register_http_server(Arc::new(HttpServer::new(config.server.clone())))
        .register_job(Arc::new(HeartbeatJob::new(config.heartbeat_interval)));

    if let Some(metrics) = &config.metrics {
        let activation = builder
            .register_metrics(metrics)
            .context("failed to register metrics")?;
        info!(?activation, namespace = %metrics.namespace, "Metrics enabled");
        builder.register_metrics_endpoint()?;
        let provider = Arc::clone(builder.metrics());
        builder.register_middleware(Middleware::request_metrics(provider))?;
    }

    builder.register_http_handler(Handler::new("/health", get(|| async { "ok" })))?;
    builder.register_middleware(Middleware::timeout(config.server.request_timeout))?;
    builder.register_middleware(Middleware::trace())?;

    Ok(builder.build(Logger::new(config.app_name.clone())))
}

fn open_store(config: &StoreConfig) -> Result<Arc<dyn KeyValueStore>> {
    match config {
        StoreConfig::Memory => Ok(Arc::new(InMemoryKVStore::new())),
        #[cfg(feature = "rocksdb")]
        StoreConfig::RocksDb { path } => {
            let store = worker_runtime::RocksDbStore::open_default(path)
                .with_context(|| format!("failed to open store at {}", path.display()))?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "rocksdb"))]
        StoreConfig::RocksDb { .. } => anyhow::bail!("built without the rocksdb feature"),
    }
}

/// Drive each job on its schedule.
fn spawn_jobs(app: &App) -> Vec<JoinHandle<()>> {
    app.jobs()
        .iter()
        .map(|job| {
            let job = Arc::clone(job);
            let ctx = app.job_context();
            let span = tracing::info_span!(
                parent: ctx.logger.span(),
                "job",
                key = %job.registry_key()
            );

            tokio::spawn(
                async move {
                    match job.schedule() {
                        Schedule::Once => {
                            if let Err(e) = job.execute(&ctx).await {
                                warn!(error = %e, "Job failed");
                            }
                        }
                        Schedule::Every(period) => {
                            let mut ticker = tokio::time::interval(period);
                            loop {
                                ticker.tick().await;
                                if let Err(e) = job.execute(&ctx).await {
                                    warn!(error = %e, "Job failed");
                                }
                            }
                        }
                    }
                }
                .instrument(span),
            )
        })
        .collect()
}
