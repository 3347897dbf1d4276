//! End-to-end wiring scenarios for `AppBuilder`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::routing::get;
use tower::ServiceExt;
use worker_chain::{ChainClient, ChainError, ChainProvider, MetricsAware};
use worker_http::{Handler, HttpServer, ServerConfig};
use worker_runtime::{
    AppBuilder, BuilderError, HeartbeatJob, InMemoryKVStore, Job, JobContext, JobError,
    KeyValueStore, MetricsActivation, Schedule,
};
use worker_telemetry::{Logger, Metrics, MetricsConfig};

struct NamedJob(&'static str);

#[async_trait]
impl Job for NamedJob {
    fn registry_key(&self) -> &str {
        self.0
    }

    async fn execute(&self, _ctx: &JobContext) -> Result<(), JobError> {
        Ok(())
    }
}

struct StaticClient;

#[async_trait]
impl ChainClient for StaticClient {
    fn name(&self) -> &str {
        "static"
    }

    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(80094)
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        Ok(7)
    }
}

async fn get_body(router: axum::Router, path: &str) -> (StatusCode, String) {
    let response = router
        .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[test]
fn test_worker_scenario() {
    let a: Arc<dyn Job> = Arc::new(NamedJob("A"));
    let b: Arc<dyn Job> = Arc::new(NamedJob("B"));
    let handler = Handler::new("/h", get(|| async { "h" }));

    let mut builder = AppBuilder::new("worker");
    builder.register_job(Arc::clone(&a));
    builder.register_job(Arc::clone(&b));

    let err1 = builder.register_http_handler(handler.clone());
    assert!(matches!(
        err1,
        Err(BuilderError::HttpServerNotEnabled { .. })
    ));

    let server = Arc::new(HttpServer::new(ServerConfig::localhost(0)));
    builder.register_http_server(Arc::clone(&server));
    builder.register_http_handler(handler).unwrap();

    let app = builder.build(Logger::new("worker"));

    let keys: Vec<&str> = app.jobs().iter().map(|j| j.registry_key()).collect();
    assert_eq!(keys, vec!["A", "B"]);
    assert!(Arc::ptr_eq(&app.jobs()[0], &a));
    assert!(Arc::ptr_eq(&app.jobs()[1], &b));
    assert_eq!(server.handler_paths(), vec!["/h"]);
}

#[tokio::test]
async fn test_registered_handlers_are_served() {
    let server = Arc::new(HttpServer::new(ServerConfig::localhost(0)));
    let mut builder = AppBuilder::new("served");
    builder.register_http_server(Arc::clone(&server));
    builder
        .register_http_handler(Handler::new("/health", get(|| async { "ok" })))
        .unwrap();

    let app = builder.build(Logger::new("served"));
    let router = app.http_server().unwrap().router().unwrap();

    assert_eq!(get_body(router, "/health").await, (StatusCode::OK, "ok".to_string()));
}

#[tokio::test]
async fn test_metrics_wiring_end_to_end() {
    let server = Arc::new(HttpServer::new(ServerConfig::localhost(0)));
    let client = Arc::new(ChainProvider::new(Arc::new(StaticClient)));
    let config = MetricsConfig {
        namespace: "scenario".to_string(),
        ..MetricsConfig::default()
    }
    .label("app", "e2e");

    let mut builder = AppBuilder::new("e2e");
    builder
        .register_chain_client(client.clone())
        .register_http_server(Arc::clone(&server));
    let activation = builder.register_metrics(&config).unwrap();
    builder.register_metrics_endpoint().unwrap();

    assert_eq!(activation, MetricsActivation::Activated);

    let app = builder.build(Logger::new("e2e"));
    let chain = app.chain_client().unwrap();
    assert_eq!(chain.block_number().await.unwrap(), 7);

    let router = server.router().unwrap();
    let (status, body) = get_body(router, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(
        r#"scenario_chain_rpc_requests_total{app="e2e",method="block_number",status="ok"} 1"#
    ));
    assert!(client.metrics().is_some());
}

#[tokio::test]
async fn test_heartbeat_runs_against_app_context() {
    let store = Arc::new(InMemoryKVStore::new());
    let mut builder = AppBuilder::new("beat");
    builder
        .register_store(store.clone())
        .register_job(Arc::new(HeartbeatJob::new(Duration::from_secs(5))));

    let app = builder.build(Logger::new("beat"));
    let job = app.job(HeartbeatJob::KEY).unwrap();
    assert_eq!(job.schedule(), Schedule::Every(Duration::from_secs(5)));

    job.execute(&app.job_context()).await.unwrap();

    let value = store.get(&HeartbeatJob::store_key("beat")).unwrap().unwrap();
    let at = u64::from_be_bytes(value.try_into().unwrap());
    assert!(at > 0);
    assert!(!app.metrics().is_enabled());
}

#[tokio::test]
async fn test_heartbeat_without_store_fails() {
    let mut builder = AppBuilder::new("nostore");
    builder.register_job(Arc::new(HeartbeatJob::new(Duration::from_secs(5))));
    let app = builder.build(Logger::new("nostore"));

    let result = app.jobs()[0].execute(&app.job_context()).await;
    assert!(matches!(result, Err(JobError::MissingResource("store"))));
}
