//! # Worker Configuration
//!
//! Runtime configuration for the `worker` binary, read from `WORKER_*`
//! environment variables. All values have defaults, so an empty environment
//! yields a runnable in-memory service on port 8080 with metrics disabled.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use worker_http::ServerConfig;
use worker_telemetry::{parse_labels, LogConfig, MetricsConfig, TelemetryError};

/// Default interval of the built-in heartbeat job.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("app name must not be empty")]
    EmptyAppName,

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("store backend {0:?} is not available in this build")]
    StoreUnavailable(String),

    #[error(transparent)]
    Metrics(#[from] TelemetryError),
}

/// Key-value store backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StoreConfig {
    /// Volatile in-memory store.
    #[default]
    Memory,
    /// RocksDB database under `path`.
    RocksDb { path: PathBuf },
}

/// Complete worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Application name.
    pub app_name: String,
    /// HTTP server.
    pub server: ServerConfig,
    /// Metrics provider. `None` keeps the no-op provider.
    pub metrics: Option<MetricsConfig>,
    /// Store backend.
    pub store: StoreConfig,
    /// Logging.
    pub log: LogConfig,
    /// Period of the heartbeat job.
    pub heartbeat_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            app_name: "worker".to_string(),
            server: ServerConfig::default(),
            metrics: None,
            store: StoreConfig::default(),
            log: LogConfig::default(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

impl WorkerConfig {
    /// Load from the process environment.
    ///
    /// - `WORKER_APP_NAME`: application name (default: worker)
    /// - `WORKER_HTTP_HOST`, `WORKER_HTTP_PORT`: listen address (default: 0.0.0.0:8080)
    /// - `WORKER_REQUEST_TIMEOUT_SECS`: handler timeout (default: 30)
    /// - `WORKER_METRICS_ENABLED`: enable Prometheus metrics (default: false)
    /// - `WORKER_METRICS_ENDPOINT`: push gateway URL (default: none, pull only)
    /// - `WORKER_METRICS_FLUSH_SECS`: push interval (default: 15)
    /// - `WORKER_METRICS_NAMESPACE`: metric name prefix (default: worker)
    /// - `WORKER_METRICS_LABELS`: constant labels, `k1=v1,k2=v2`
    /// - `WORKER_STORE`: `memory` or `rocksdb` (default: memory)
    /// - `WORKER_DATA_DIR`: RocksDB directory (default: ./data/worker)
    /// - `WORKER_HEARTBEAT_SECS`: heartbeat period (default: 30)
    ///
    /// Logging variables are read by [`LogConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::from_lookup(|key| env::var(key).ok())?;
        config.log = LogConfig::from_env();
        Ok(config)
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let server = ServerConfig {
            host: parse_or(&lookup, "WORKER_HTTP_HOST", defaults.server.host)?,
            port: parse_or(&lookup, "WORKER_HTTP_PORT", defaults.server.port)?,
            request_timeout: secs_or(
                &lookup,
                "WORKER_REQUEST_TIMEOUT_SECS",
                defaults.server.request_timeout,
            )?,
        };

        let metrics = if parse_bool(&lookup, "WORKER_METRICS_ENABLED")? {
            let mut metrics = MetricsConfig::default();
            metrics.endpoint = lookup("WORKER_METRICS_ENDPOINT");
            metrics.flush_interval =
                secs_or(&lookup, "WORKER_METRICS_FLUSH_SECS", metrics.flush_interval)?;
            if let Some(namespace) = lookup("WORKER_METRICS_NAMESPACE") {
                metrics.namespace = namespace;
            }
            if let Some(labels) = lookup("WORKER_METRICS_LABELS") {
                metrics.labels = parse_labels(&labels)?;
            }
            Some(metrics)
        } else {
            None
        };

        let store = match lookup("WORKER_STORE").as_deref() {
            None | Some("memory") => StoreConfig::Memory,
            Some("rocksdb") => StoreConfig::RocksDb {
                path: lookup("WORKER_DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./data/worker")),
            },
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "WORKER_STORE",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            app_name: lookup("WORKER_APP_NAME").unwrap_or(defaults.app_name),
            server,
            metrics,
            store,
            log: defaults.log,
            heartbeat_interval: secs_or(
                &lookup,
                "WORKER_HEARTBEAT_SECS",
                defaults.heartbeat_interval,
            )?,
        })
    }

    /// Check the configuration before wiring.
    ///
    /// # Errors
    ///
    /// - `EmptyAppName` for a blank name
    /// - `ZeroInterval` for a zero heartbeat or request timeout
    /// - `StoreUnavailable` for RocksDB without the `rocksdb` feature
    /// - `Metrics` if the metrics configuration is invalid
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_name.trim().is_empty() {
            return Err(ConfigError::EmptyAppName);
        }
        if self.heartbeat_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("heartbeat interval"));
        }
        if self.server.request_timeout.is_zero() {
            return Err(ConfigError::ZeroInterval("request timeout"));
        }
        if matches!(self.store, StoreConfig::RocksDb { .. }) && !cfg!(feature = "rocksdb") {
            return Err(ConfigError::StoreUnavailable("rocksdb".to_string()));
        }
        if let Some(metrics) = &self.metrics {
            metrics.validate()?;
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => {
            let parsed: Result<T, _> = value.trim().parse();
            parsed.map_err(|_| ConfigError::InvalidValue { key, value })
        }
    }
}

fn secs_or<F>(lookup: &F, key: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    parse_or(lookup, key, default.as_secs()).map(Duration::from_secs)
}

fn parse_bool<F>(lookup: &F, key: &'static str) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_lowercase()).as_deref() {
        None | Some("") | Some("0") | Some("false") => Ok(false),
        Some("1") | Some("true") => Ok(true),
        Some(other) => Err(ConfigError::InvalidValue {
            key,
            value: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let config = WorkerConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.app_name, "worker");
        assert_eq!(config.server, ServerConfig::default());
        assert!(config.metrics.is_none());
        assert_eq!(config.store, StoreConfig::Memory);
        assert_eq!(config.heartbeat_interval, DEFAULT_HEARTBEAT_INTERVAL);
        config.validate().unwrap();
    }

    #[test]
    fn test_full_environment() {
        let config = WorkerConfig::from_lookup(lookup(&[
            ("WORKER_APP_NAME", "indexer"),
            ("WORKER_HTTP_HOST", "127.0.0.1"),
            ("WORKER_HTTP_PORT", "9000"),
            ("WORKER_REQUEST_TIMEOUT_SECS", "5"),
            ("WORKER_METRICS_ENABLED", "true"),
            ("WORKER_METRICS_ENDPOINT", "http://pushgateway:9091"),
            ("WORKER_METRICS_FLUSH_SECS", "10"),
            ("WORKER_METRICS_NAMESPACE", "indexer"),
            ("WORKER_METRICS_LABELS", "env=prod, region=eu"),
            ("WORKER_STORE", "rocksdb"),
            ("WORKER_DATA_DIR", "/var/lib/indexer"),
            ("WORKER_HEARTBEAT_SECS", "60"),
        ]))
        .unwrap();

        assert_eq!(config.app_name, "indexer");
        assert_eq!(config.server.addr().to_string(), "127.0.0.1:9000");
        assert_eq!(config.server.request_timeout, Duration::from_secs(5));

        let metrics = config.metrics.as_ref().unwrap();
        assert_eq!(metrics.endpoint.as_deref(), Some("http://pushgateway:9091"));
        assert_eq!(metrics.flush_interval, Duration::from_secs(10));
        assert_eq!(metrics.namespace, "indexer");
        assert_eq!(metrics.labels.get("region").map(String::as_str), Some("eu"));

        assert_eq!(
            config.store,
            StoreConfig::RocksDb {
                path: PathBuf::from("/var/lib/indexer")
            }
        );
        assert_eq!(config.heartbeat_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_port_rejected() {
        let err = WorkerConfig::from_lookup(lookup(&[("WORKER_HTTP_PORT", "http")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { key: "WORKER_HTTP_PORT", .. }
        ));
    }

    #[test]
    fn test_unknown_store_rejected() {
        let err = WorkerConfig::from_lookup(lookup(&[("WORKER_STORE", "redis")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "WORKER_STORE", .. }));
    }

    #[test]
    fn test_invalid_bool_rejected() {
        let err =
            WorkerConfig::from_lookup(lookup(&[("WORKER_METRICS_ENABLED", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_malformed_labels_rejected() {
        let err = WorkerConfig::from_lookup(lookup(&[
            ("WORKER_METRICS_ENABLED", "1"),
            ("WORKER_METRICS_LABELS", "env"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Metrics(_)));
    }

    #[test]
    fn test_validate_rejects_bad_metrics_endpoint() {
        let config = WorkerConfig::from_lookup(lookup(&[
            ("WORKER_METRICS_ENABLED", "true"),
            ("WORKER_METRICS_ENDPOINT", "not a url"),
        ]))
        .unwrap();

        assert!(matches!(config.validate(), Err(ConfigError::Metrics(_))));
    }

    #[test]
    fn test_validate_rejects_zero_heartbeat() {
        let config = WorkerConfig {
            heartbeat_interval: Duration::ZERO,
            ..WorkerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroInterval(_))
        ));
    }

    #[test]
    fn test_validate_rejects_blank_name() {
        let config = WorkerConfig {
            app_name: "  ".to_string(),
            ..WorkerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptyAppName)));
    }

    #[cfg(not(feature = "rocksdb"))]
    #[test]
    fn test_rocksdb_requires_feature() {
        let config = WorkerConfig {
            store: StoreConfig::RocksDb {
                path: PathBuf::from("/tmp/worker"),
            },
            ..WorkerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::StoreUnavailable(_))
        ));
    }
}
