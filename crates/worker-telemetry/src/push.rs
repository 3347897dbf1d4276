//! Periodic push of [`REGISTRY`](crate::metrics::REGISTRY) to a
//! Pushgateway-compatible endpoint.

use reqwest::header::CONTENT_TYPE;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::metrics::encode_metrics;
use crate::{MetricsConfig, TelemetryError};

/// Push target for `config`: `<endpoint>/metrics/job/<namespace>`.
///
/// Segments are appended to any path already on the endpoint, so a gateway
/// mounted under a prefix keeps it. Returns `Ok(None)` when no endpoint is
/// configured.
pub fn push_target(config: &MetricsConfig) -> Result<Option<Url>, TelemetryError> {
    let Some(mut target) = config.push_url()? else {
        return Ok(None);
    };
    target
        .path_segments_mut()
        .map_err(|()| {
            TelemetryError::Config(format!(
                "metrics endpoint cannot be a base: {:?}",
                config.endpoint
            ))
        })?
        .pop_if_empty()
        .extend(["metrics", "job", config.namespace.as_str()]);
    Ok(Some(target))
}

/// Push the current registry contents once.
pub async fn push_once(client: &reqwest::Client, target: &Url) -> Result<(), TelemetryError> {
    let body = encode_metrics()?;
    client
        .put(target.clone())
        .header(CONTENT_TYPE, prometheus::TEXT_FORMAT)
        .body(body)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|e| TelemetryError::Push(e.to_string()))?;
    Ok(())
}

/// Spawn a task pushing every `flush_interval`.
///
/// Must be called from within a tokio runtime. Returns `Ok(None)` when the
/// configuration has no endpoint. Push failures are logged and retried on
/// the next tick.
pub fn spawn_pusher(config: &MetricsConfig) -> Result<Option<JoinHandle<()>>, TelemetryError> {
    config.validate()?;
    let Some(target) = push_target(config)? else {
        return Ok(None);
    };
    let interval = config.flush_interval;

    info!(url = %target, interval_secs = interval.as_secs_f64(), "Starting metrics pusher");

    Ok(Some(tokio::spawn(async move {
        let client = reqwest::Client::new();
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match push_once(&client, &target).await {
                Ok(()) => debug!(url = %target, "Pushed metrics"),
                Err(e) => warn!(url = %target, error = %e, "Metrics push failed"),
            }
        }
    })))
}
