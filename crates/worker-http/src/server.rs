//! HTTP server with an open handler set and middleware chain.
//!
//! The server is shared (`Arc<HttpServer>`) between whoever registers routes
//! and whoever runs it. Registration goes through `&self`; the router is
//! assembled from a snapshot of both sets when the server starts.

use std::collections::HashSet;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, MethodRouter},
    Router,
};
use parking_lot::{Mutex, RwLock};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{error, info};
use worker_telemetry::{encode_metrics, METRICS_CONTENT_TYPE};

use crate::{HttpError, Middleware, ServerConfig};

/// Path of the built-in metrics exposition handler.
pub const METRICS_PATH: &str = "/metrics";

/// A route: path plus the method router serving it.
#[derive(Clone)]
pub struct Handler {
    path: String,
    route: MethodRouter,
}

impl Handler {
    pub fn new(path: impl Into<String>, route: MethodRouter) -> Self {
        Self {
            path: path.into(),
            route,
        }
    }

    /// `GET /metrics` serving the process registry in Prometheus text format.
    pub fn metrics_endpoint() -> Self {
        Self::new(METRICS_PATH, get(serve_metrics))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn route(&self) -> &MethodRouter {
        &self.route
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("path", &self.path).finish()
    }
}

async fn serve_metrics() -> Response {
    match encode_metrics() {
        Ok(body) => ([(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Shutdown sender of the current serve loop, tagged with the run it
/// belongs to.
#[derive(Default)]
struct ShutdownSlot {
    run: u64,
    tx: Option<oneshot::Sender<()>>,
}

/// HTTP server. Lifecycle (`start`/`shutdown`) is driven by the owner.
pub struct HttpServer {
    config: ServerConfig,
    handlers: RwLock<Vec<Handler>>,
    middlewares: RwLock<Vec<Middleware>>,
    shutdown: Mutex<ShutdownSlot>,
}

impl HttpServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            handlers: RwLock::new(Vec::new()),
            middlewares: RwLock::new(Vec::new()),
            shutdown: Mutex::new(ShutdownSlot::default()),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Add a handler. Conflicts are reported when the router is assembled.
    pub fn register_handler(&self, handler: Handler) {
        self.handlers.write().push(handler);
    }

    /// Append to the middleware chain.
    pub fn register_middleware(&self, middleware: Middleware) {
        self.middlewares.write().push(middleware);
    }

    /// Snapshot of registered handlers, in registration order.
    pub fn handlers(&self) -> Vec<Handler> {
        self.handlers.read().clone()
    }

    /// Registered handler paths, in registration order.
    pub fn handler_paths(&self) -> Vec<String> {
        self.handlers.read().iter().map(|h| h.path.clone()).collect()
    }

    /// Snapshot of the middleware chain, in registration order.
    pub fn middlewares(&self) -> Vec<Middleware> {
        self.middlewares.read().clone()
    }

    /// Assemble the router from the current handlers and middleware chain.
    ///
    /// # Errors
    ///
    /// - `InvalidPath` if a handler path does not start with `/`
    /// - `DuplicateRoute` if two handlers share a path
    /// - `ConflictingRoute` if the router rejects a path, e.g. `/jobs/:id`
    ///   next to `/jobs/:name`
    pub fn router(&self) -> Result<Router, HttpError> {
        let handlers = self.handlers();
        let middlewares = self.middlewares();

        let mut seen = HashSet::new();
        let mut router = Router::new();
        for handler in handlers {
            if !handler.path.starts_with('/') {
                return Err(HttpError::InvalidPath(handler.path));
            }
            if !seen.insert(handler.path.clone()) {
                return Err(HttpError::DuplicateRoute(handler.path));
            }
            router = add_route(router, handler)?;
        }

        for middleware in &middlewares {
            router = middleware.apply(router);
        }

        Ok(router)
    }

    /// Bind the configured address and serve until [`shutdown`](Self::shutdown).
    pub async fn start(&self) -> Result<(), HttpError> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| HttpError::Bind { addr, source })?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until [`shutdown`](Self::shutdown).
    pub async fn serve(&self, listener: TcpListener) -> Result<(), HttpError> {
        let router = self.router()?;
        let (run, shutdown_rx) = self.arm_shutdown()?;

        let addr = listener.local_addr().ok();
        info!(
            addr = ?addr,
            routes = self.handlers.read().len(),
            middlewares = self.middlewares.read().len(),
            "Starting HTTP server"
        );

        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await;

        {
            let mut slot = self.shutdown.lock();
            if slot.run == run {
                slot.tx = None;
            }
        }
        info!("HTTP server stopped");
        result.map_err(HttpError::Serve)
    }

    fn arm_shutdown(&self) -> Result<(u64, oneshot::Receiver<()>), HttpError> {
        let mut slot = self.shutdown.lock();
        if slot.tx.is_some() {
            return Err(HttpError::AlreadyRunning);
        }
        let (tx, rx) = oneshot::channel();
        slot.run += 1;
        slot.tx = Some(tx);
        Ok((slot.run, rx))
    }

    /// Trigger graceful shutdown. No-op when not running.
    pub fn shutdown(&self) {
        if let Some(tx) = self.shutdown.lock().tx.take() {
            let _ = tx.send(());
        }
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.lock().tx.is_some()
    }
}

/// `Router::route` panics on paths its matcher rejects; those are reported
/// as `ConflictingRoute`.
fn add_route(router: Router, handler: Handler) -> Result<Router, HttpError> {
    let Handler { path, route } = handler;
    catch_unwind(AssertUnwindSafe(|| router.route(&path, route))).map_err(|panic| {
        let reason = panic
            .downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| panic.downcast_ref::<&str>().copied())
            .unwrap_or("rejected by router")
            .to_string();
        HttpError::ConflictingRoute { path, reason }
    })
}

impl fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpServer")
            .field("addr", &self.config.addr())
            .field("handlers", &self.handler_paths())
            .field("middlewares", &self.middlewares.read().len())
            .finish()
    }
}
