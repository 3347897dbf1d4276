//! Metrics provider configuration and validation.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::TelemetryError;

/// Default metric name prefix.
pub const DEFAULT_NAMESPACE: &str = "worker";

/// Default interval between metric pushes.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(15);

/// Configuration for an active metrics provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Push target (e.g. a Prometheus Pushgateway). `None` means pull-only.
    pub endpoint: Option<String>,

    /// Interval between pushes to `endpoint`.
    pub flush_interval: Duration,

    /// Constant labels attached to every sample.
    pub labels: BTreeMap<String, String>,

    /// Prefix for every metric name.
    pub namespace: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            labels: BTreeMap::new(),
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl MetricsConfig {
    /// Config pushing to `endpoint` with default interval and no labels.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Default::default()
        }
    }

    /// Add a constant label.
    pub fn label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(name.into(), value.into());
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `TelemetryError::Config` if:
    /// - the namespace is not a valid metric name
    /// - the endpoint is not an absolute `http`/`https` URL with a host
    /// - the flush interval is zero
    /// - a label name is invalid or reserved (`__` prefix)
    pub fn validate(&self) -> Result<(), TelemetryError> {
        if !is_valid_metric_name(&self.namespace) {
            return Err(TelemetryError::Config(format!(
                "invalid metrics namespace {:?}",
                self.namespace
            )));
        }

        if let Some(endpoint) = &self.endpoint {
            self.endpoint_url(endpoint)?;
        }

        if self.flush_interval.is_zero() {
            return Err(TelemetryError::Config(
                "flush interval must be greater than zero".to_string(),
            ));
        }

        for name in self.labels.keys() {
            if !is_valid_label_name(name) {
                return Err(TelemetryError::Config(format!(
                    "invalid metrics label name {:?}",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Parsed push endpoint, if one is configured.
    pub fn push_url(&self) -> Result<Option<Url>, TelemetryError> {
        self.endpoint
            .as_deref()
            .map(|endpoint| self.endpoint_url(endpoint))
            .transpose()
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url, TelemetryError> {
        let url = Url::parse(endpoint).map_err(|e| {
            TelemetryError::Config(format!("malformed metrics endpoint {:?}: {}", endpoint, e))
        })?;

        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(TelemetryError::Config(format!(
                    "unsupported metrics endpoint scheme {:?}",
                    scheme
                )))
            }
        }

        if url.host_str().map_or(true, str::is_empty) {
            return Err(TelemetryError::Config(format!(
                "metrics endpoint {:?} has no host",
                endpoint
            )));
        }

        Ok(url)
    }
}

/// Parse `k1=v1,k2=v2` into a label map.
pub fn parse_labels(raw: &str) -> Result<BTreeMap<String, String>, TelemetryError> {
    let mut labels = BTreeMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').ok_or_else(|| {
            TelemetryError::Config(format!("label {:?} is not in name=value form", pair))
        })?;
        labels.insert(name.trim().to_string(), value.trim().to_string());
    }
    Ok(labels)
}

/// `[a-zA-Z_:][a-zA-Z0-9_:]*`
pub(crate) fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`, excluding the reserved `__` prefix.
pub(crate) fn is_valid_label_name(name: &str) -> bool {
    if name.starts_with("__") {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = MetricsConfig::default();
        assert_eq!(config.namespace, "worker");
        assert_eq!(config.flush_interval, Duration::from_secs(15));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_valid_endpoint() {
        let config = MetricsConfig::with_endpoint("http://localhost:9091").label("env", "dev");
        assert!(config.validate().is_ok());
        assert_eq!(
            config.push_url().unwrap().unwrap().as_str(),
            "http://localhost:9091/"
        );
    }

    #[test]
    fn test_malformed_endpoint_rejected() {
        let config = MetricsConfig::with_endpoint("not a url");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("malformed metrics endpoint"));
    }

    #[test]
    fn test_non_http_scheme_rejected() {
        let config = MetricsConfig::with_endpoint("udp://localhost:8125");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_flush_interval_rejected() {
        let config = MetricsConfig {
            flush_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_label_names() {
        assert!(MetricsConfig::default().label("region", "eu").validate().is_ok());
        assert!(MetricsConfig::default().label("1region", "eu").validate().is_err());
        assert!(MetricsConfig::default().label("__name", "x").validate().is_err());
        assert!(MetricsConfig::default().label("re-gion", "x").validate().is_err());
    }

    #[test]
    fn test_invalid_namespace_rejected() {
        let config = MetricsConfig {
            namespace: "my-app".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_labels() {
        let labels = parse_labels("env=prod, region = eu ,").unwrap();
        assert_eq!(labels.get("env").map(String::as_str), Some("prod"));
        assert_eq!(labels.get("region").map(String::as_str), Some("eu"));
        assert!(parse_labels("broken").is_err());
        assert!(parse_labels("").unwrap().is_empty());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: MetricsConfig =
            serde_json::from_str(r#"{"endpoint":"https://push.example.com"}"#).unwrap();
        assert_eq!(config.namespace, "worker");
        assert!(config.validate().is_ok());
    }
}
