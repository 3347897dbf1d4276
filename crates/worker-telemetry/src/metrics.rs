//! Metrics providers.
//!
//! A provider is held as `Arc<dyn Metrics>`. Two implementations exist:
//!
//! - [`NoopMetrics`]: the inert default, records nothing
//! - [`PrometheusMetrics`]: records into the process-wide [`REGISTRY`]
//!
//! Metric families are created lazily on first use and named
//! `<namespace>_<name>`. Families are cached process-wide so that two
//! providers with the same configuration share their collectors instead of
//! failing registration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use lazy_static::lazy_static;
use parking_lot::Mutex;
use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::{MetricsConfig, TelemetryError};

lazy_static! {
    /// Process-wide registry served by the `/metrics` endpoint and the pusher.
    pub static ref REGISTRY: Registry = Registry::new();

    static ref FAMILIES: Mutex<HashMap<FamilyKey, Family>> = Mutex::new(HashMap::new());
}

/// Metrics provider contract.
///
/// `tags` are variable labels; pairs are sorted by name before use, so
/// callers may pass them in any order.
pub trait Metrics: Send + Sync {
    /// Whether samples are recorded at all.
    fn is_enabled(&self) -> bool;

    /// Add `value` to a counter.
    fn count(&self, name: &str, value: f64, tags: &[(&str, &str)]);

    /// Increment a counter by one.
    fn incr(&self, name: &str, tags: &[(&str, &str)]) {
        self.count(name, 1.0, tags);
    }

    /// Set a gauge.
    fn gauge(&self, name: &str, value: f64, tags: &[(&str, &str)]);

    /// Record a histogram observation.
    fn observe(&self, name: &str, value: f64, tags: &[(&str, &str)]);

    /// Record the seconds elapsed since `start`.
    fn time(&self, name: &str, start: Instant, tags: &[(&str, &str)]) {
        self.observe(name, start.elapsed().as_secs_f64(), tags);
    }
}

/// Inert provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl NoopMetrics {
    pub fn new() -> Self {
        Self
    }
}

impl Metrics for NoopMetrics {
    fn is_enabled(&self) -> bool {
        false
    }

    fn count(&self, _name: &str, _value: f64, _tags: &[(&str, &str)]) {}

    fn gauge(&self, _name: &str, _value: f64, _tags: &[(&str, &str)]) {}

    fn observe(&self, _name: &str, _value: f64, _tags: &[(&str, &str)]) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Kind {
    Counter,
    Gauge,
    Histogram,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FamilyKey {
    kind: Kind,
    fq_name: String,
    const_labels: Vec<(String, String)>,
    label_names: Vec<String>,
}

#[derive(Clone)]
enum Family {
    Counter(CounterVec),
    Gauge(GaugeVec),
    Histogram(HistogramVec),
}

/// Prometheus-backed provider built from a [`MetricsConfig`].
pub struct PrometheusMetrics {
    config: MetricsConfig,
}

impl PrometheusMetrics {
    /// Create a provider.
    ///
    /// # Errors
    ///
    /// Returns `TelemetryError::Config` if the configuration is invalid.
    pub fn new(config: &MetricsConfig) -> Result<Self, TelemetryError> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// Start pushing the registry to the configured endpoint.
    ///
    /// Recording never pushes on its own; without this (or
    /// [`crate::spawn_pusher`]) samples are only visible through a scrape.
    /// Returns `Ok(None)` when no endpoint is configured. Must be called from
    /// within a tokio runtime.
    pub fn spawn_pusher(&self) -> Result<Option<JoinHandle<()>>, TelemetryError> {
        crate::push::spawn_pusher(&self.config)
    }

    fn family(&self, kind: Kind, name: &str, label_names: &[&str]) -> Option<Family> {
        let fq_name = format!("{}_{}", self.config.namespace, sanitize(name));
        let key = FamilyKey {
            kind,
            fq_name: fq_name.clone(),
            const_labels: self
                .config
                .labels
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            label_names: label_names.iter().map(|n| n.to_string()).collect(),
        };

        let mut families = FAMILIES.lock();
        if let Some(family) = families.get(&key) {
            return Some(family.clone());
        }

        let const_labels: HashMap<String, String> = key.const_labels.iter().cloned().collect();
        let help = format!("{} ({:?})", name, kind);

        let created = match kind {
            Kind::Counter => CounterVec::new(
                Opts::new(fq_name.clone(), help).const_labels(const_labels),
                label_names,
            )
            .map(Family::Counter),
            Kind::Gauge => GaugeVec::new(
                Opts::new(fq_name.clone(), help).const_labels(const_labels),
                label_names,
            )
            .map(Family::Gauge),
            Kind::Histogram => HistogramVec::new(
                HistogramOpts::new(fq_name.clone(), help).const_labels(const_labels),
                label_names,
            )
            .map(Family::Histogram),
        };

        let registered = created.and_then(|family| {
            let collector: Box<dyn prometheus::core::Collector> = match &family {
                Family::Counter(vec) => Box::new(vec.clone()),
                Family::Gauge(vec) => Box::new(vec.clone()),
                Family::Histogram(vec) => Box::new(vec.clone()),
            };
            REGISTRY.register(collector).map(|_| family)
        });

        match registered {
            Ok(family) => {
                families.insert(key, family.clone());
                Some(family)
            }
            Err(e) => {
                warn!(metric = %fq_name, error = %e, "Dropping sample for unregistrable metric");
                None
            }
        }
    }

    fn with_family(
        &self,
        kind: Kind,
        name: &str,
        tags: &[(&str, &str)],
        f: impl FnOnce(Family, &[&str]),
    ) {
        let mut sorted: Vec<(&str, &str)> = tags.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let label_names: Vec<&str> = sorted.iter().map(|(k, _)| *k).collect();
        let label_values: Vec<&str> = sorted.iter().map(|(_, v)| *v).collect();

        if let Some(family) = self.family(kind, name, &label_names) {
            f(family, &label_values);
        }
    }
}

impl Metrics for PrometheusMetrics {
    fn is_enabled(&self) -> bool {
        true
    }

    fn count(&self, name: &str, value: f64, tags: &[(&str, &str)]) {
        if !value.is_finite() || value < 0.0 {
            warn!(metric = name, value, "Ignoring invalid counter increment");
            return;
        }
        self.with_family(Kind::Counter, name, tags, |family, values| {
            if let Family::Counter(vec) = family {
                vec.with_label_values(values).inc_by(value);
            }
        });
    }

    fn gauge(&self, name: &str, value: f64, tags: &[(&str, &str)]) {
        if !value.is_finite() {
            warn!(metric = name, value, "Ignoring non-finite gauge value");
            return;
        }
        self.with_family(Kind::Gauge, name, tags, |family, values| {
            if let Family::Gauge(vec) = family {
                vec.with_label_values(values).set(value);
            }
        });
    }

    fn observe(&self, name: &str, value: f64, tags: &[(&str, &str)]) {
        if !value.is_finite() {
            warn!(metric = name, value, "Ignoring non-finite observation");
            return;
        }
        self.with_family(Kind::Histogram, name, tags, |family, values| {
            if let Family::Histogram(vec) = family {
                vec.with_label_values(values).observe(value);
            }
        });
    }
}

/// Replace characters Prometheus does not accept in metric names.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Encode all metrics in [`REGISTRY`] as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard that records a histogram observation on drop.
pub struct MetricsTimer {
    metrics: Arc<dyn Metrics>,
    name: String,
    tags: Vec<(String, String)>,
    start: Instant,
}

impl MetricsTimer {
    /// Start timing `name`.
    pub fn start(
        metrics: Arc<dyn Metrics>,
        name: impl Into<String>,
        tags: &[(&str, &str)],
    ) -> Self {
        Self {
            metrics,
            name: name.into(),
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            start: Instant::now(),
        }
    }
}

impl Drop for MetricsTimer {
    fn drop(&mut self) {
        let tags: Vec<(&str, &str)> = self
            .tags
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        self.metrics.time(&self.name, self.start, &tags);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_is_disabled() {
        let metrics = NoopMetrics::new();
        assert!(!metrics.is_enabled());
        metrics.incr("anything", &[("a", "b")]);
        metrics.gauge("anything", 1.0, &[]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = MetricsConfig::with_endpoint("::not-a-url::");
        assert!(PrometheusMetrics::new(&config).is_err());
    }

    #[test]
    fn test_counter_exported() {
        let config = MetricsConfig::default().label("env", "unit");
        let metrics = PrometheusMetrics::new(&config).unwrap();
        assert!(metrics.is_enabled());

        metrics.incr("test_counter_exported", &[("job", "poller")]);
        metrics.count("test_counter_exported", 2.0, &[("job", "poller")]);

        let text = encode_metrics().unwrap();
        assert!(text.contains("worker_test_counter_exported{env=\"unit\",job=\"poller\"} 3"));
    }

    #[test]
    fn test_providers_with_same_config_share_families() {
        let config = MetricsConfig::default().label("env", "shared");
        let first = PrometheusMetrics::new(&config).unwrap();
        let second = PrometheusMetrics::new(&config).unwrap();

        first.incr("test_shared_family", &[]);
        second.incr("test_shared_family", &[]);

        let text = encode_metrics().unwrap();
        assert!(text.contains("worker_test_shared_family{env=\"shared\"} 2"));
    }

    #[test]
    fn test_tag_order_does_not_matter() {
        let metrics = PrometheusMetrics::new(&MetricsConfig::default()).unwrap();
        metrics.gauge("test_tag_order", 1.0, &[("a", "1"), ("b", "2")]);
        metrics.gauge("test_tag_order", 5.0, &[("b", "2"), ("a", "1")]);

        let text = encode_metrics().unwrap();
        assert!(text.contains("worker_test_tag_order{a=\"1\",b=\"2\"} 5"));
    }

    #[test]
    fn test_inconsistent_labels_are_dropped() {
        let metrics = PrometheusMetrics::new(&MetricsConfig::default()).unwrap();
        metrics.incr("test_inconsistent_labels", &[("a", "1")]);
        // Different label names for the same family cannot be registered.
        metrics.incr("test_inconsistent_labels", &[("b", "1")]);

        let text = encode_metrics().unwrap();
        assert!(text.contains("worker_test_inconsistent_labels{a=\"1\"} 1"));
        assert!(!text.contains("worker_test_inconsistent_labels{b=\"1\"}"));
    }

    #[test]
    fn test_negative_counter_ignored() {
        let metrics = PrometheusMetrics::new(&MetricsConfig::default()).unwrap();
        metrics.count("test_negative_counter", -1.0, &[]);
        assert!(!encode_metrics().unwrap().contains("worker_test_negative_counter"));
    }

    #[test]
    fn test_non_finite_samples_ignored() {
        let metrics = PrometheusMetrics::new(&MetricsConfig::default()).unwrap();
        metrics.count("test_nan_counter", f64::NAN, &[]);
        metrics.count("test_nan_counter", f64::INFINITY, &[]);
        metrics.gauge("test_nan_gauge", f64::NAN, &[]);
        metrics.observe("test_nan_histogram", f64::NEG_INFINITY, &[]);

        let text = encode_metrics().unwrap();
        assert!(!text.contains("worker_test_nan_counter"));
        assert!(!text.contains("worker_test_nan_gauge"));
        assert!(!text.contains("worker_test_nan_histogram"));

        metrics.incr("test_nan_counter", &[]);
        assert!(encode_metrics().unwrap().contains("worker_test_nan_counter 1"));
    }

    #[tokio::test]
    async fn test_spawn_pusher_without_endpoint_is_noop() {
        let metrics = PrometheusMetrics::new(&MetricsConfig::default()).unwrap();
        assert!(metrics.spawn_pusher().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_spawn_pusher_with_endpoint_starts_task() {
        let config = MetricsConfig::with_endpoint("http://127.0.0.1:9");
        let metrics = PrometheusMetrics::new(&config).unwrap();
        let handle = metrics.spawn_pusher().unwrap().unwrap();
        assert!(!handle.is_finished());
        handle.abort();
    }

    #[test]
    fn test_name_sanitized() {
        let metrics = PrometheusMetrics::new(&MetricsConfig::default()).unwrap();
        metrics.incr("test.rpc-calls", &[]);
        assert!(encode_metrics().unwrap().contains("worker_test_rpc_calls 1"));
    }

    #[test]
    fn test_timer_observes_on_drop() {
        let metrics: Arc<dyn Metrics> =
            Arc::new(PrometheusMetrics::new(&MetricsConfig::default()).unwrap());
        {
            let _timer =
                MetricsTimer::start(Arc::clone(&metrics), "test_timer_seconds", &[("op", "x")]);
        }
        let text = encode_metrics().unwrap();
        assert!(text.contains("worker_test_timer_seconds_count{op=\"x\"} 1"));
    }
}
