//! # Worker HTTP
//!
//! HTTP server whose lifecycle is owned by the caller. Handlers and
//! middleware can be added at any time before `start`; the router is
//! assembled from them when serving begins.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use axum::routing::get;
//! use worker_http::{Handler, HttpServer, Middleware, ServerConfig};
//!
//! let server = Arc::new(HttpServer::new(ServerConfig::localhost(8080)));
//! server.register_handler(Handler::new("/health", get(|| async { "ok" })));
//! server.register_middleware(Middleware::trace());
//! server.start().await?;
//! ```

mod config;
mod error;
pub mod middleware;
mod server;

pub use config::{ServerConfig, DEFAULT_REQUEST_TIMEOUT};
pub use error::HttpError;
pub use middleware::Middleware;
pub use server::{Handler, HttpServer, METRICS_PATH};
