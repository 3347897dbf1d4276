//! Middleware chain entries.
//!
//! A [`Middleware`] is a named router transform. Entries are applied in
//! registration order when the router is assembled, so an entry registered
//! later wraps the ones registered before it and sees requests first.

pub mod metrics;

pub use metrics::{RequestMetricsLayer, HTTP_DURATION_METRIC, HTTP_REQUESTS_METRIC};

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::response::IntoResponse;
use axum::routing::Route;
use axum::Router;
use tower::{Layer, Service};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use worker_telemetry::Metrics;

type ApplyFn = dyn Fn(Router) -> Router + Send + Sync;

/// Named router transform.
#[derive(Clone)]
pub struct Middleware {
    name: String,
    apply: Arc<ApplyFn>,
}

impl Middleware {
    /// Middleware from an arbitrary router transform.
    pub fn from_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Router) -> Router + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            apply: Arc::new(f),
        }
    }

    /// Middleware wrapping every route in a tower layer.
    pub fn layer<L>(name: impl Into<String>, layer: L) -> Self
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request> + Clone + Send + 'static,
        <L::Service as Service<Request>>::Response: IntoResponse + 'static,
        <L::Service as Service<Request>>::Error: Into<Infallible> + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        Self::from_fn(name, move |router: Router| router.layer(layer.clone()))
    }

    /// Per-request tracing spans.
    pub fn trace() -> Self {
        Self::layer("trace", TraceLayer::new_for_http())
    }

    /// Respond `408 Request Timeout` when a handler exceeds `timeout`.
    pub fn timeout(timeout: Duration) -> Self {
        Self::layer("timeout", TimeoutLayer::new(timeout))
    }

    /// Request counters and latencies reported to `metrics`.
    pub fn request_metrics(metrics: Arc<dyn Metrics>) -> Self {
        Self::layer("request_metrics", RequestMetricsLayer::new(metrics))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Apply this middleware to `router`.
    pub fn apply(&self, router: Router) -> Router {
        (self.apply)(router)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middleware").field("name", &self.name).finish()
    }
}
