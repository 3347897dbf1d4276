//! HTTP server errors.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Errors raised while assembling or running the server.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Two handlers registered on the same path
    #[error("duplicate route: {0}")]
    DuplicateRoute(String),

    /// Path rejected by the router's matcher, usually an overlap with an
    /// already added route
    #[error("conflicting route {path}: {reason}")]
    ConflictingRoute { path: String, reason: String },

    /// Handler path does not start with `/`
    #[error("invalid route path: {0:?}")]
    InvalidPath(String),

    /// `start` or `serve` called while already serving
    #[error("HTTP server already running")]
    AlreadyRunning,

    /// Failed to bind the listening socket
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Serving loop failed
    #[error("HTTP server error: {0}")]
    Serve(#[from] io::Error),
}
