//! Request metrics middleware.
//!
//! Records a request counter tagged by method and status, and a latency
//! histogram tagged by method, through any [`Metrics`] provider.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::{body::Body, http::Request, response::Response};
use tower::{Layer, Service};
use worker_telemetry::Metrics;

/// Counter of served requests.
pub const HTTP_REQUESTS_METRIC: &str = "http_requests_total";

/// Histogram of request latency in seconds.
pub const HTTP_DURATION_METRIC: &str = "http_request_duration_seconds";

/// Layer recording request metrics.
#[derive(Clone)]
pub struct RequestMetricsLayer {
    metrics: Arc<dyn Metrics>,
}

impl RequestMetricsLayer {
    pub fn new(metrics: Arc<dyn Metrics>) -> Self {
        Self { metrics }
    }
}

impl<S> Layer<S> for RequestMetricsLayer {
    type Service = RequestMetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestMetricsService {
            inner,
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Request metrics service
#[derive(Clone)]
pub struct RequestMetricsService<S> {
    inner: S,
    metrics: Arc<dyn Metrics>,
}

impl<S> Service<Request<Body>> for RequestMetricsService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // Keep the service that was polled ready.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let metrics = Arc::clone(&self.metrics);
        let method = req.method().to_string();
        let start = Instant::now();

        Box::pin(async move {
            let response = inner.call(req).await?;
            let status = response.status().as_u16().to_string();

            metrics.incr(
                HTTP_REQUESTS_METRIC,
                &[("method", method.as_str()), ("status", status.as_str())],
            );
            metrics.time(HTTP_DURATION_METRIC, start, &[("method", method.as_str())]);
            Ok(response)
        })
    }
}
