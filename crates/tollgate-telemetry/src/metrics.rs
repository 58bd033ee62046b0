//! Prometheus metrics.
//!
//! Recording functions are safe to call before [`init_metrics`]; without an
//! installed recorder they do nothing.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use crate::error::TelemetryError;
use crate::TelemetryResult;

const REQUESTS_TOTAL: &str = "tollgate_requests_total";
const REQUEST_DURATION: &str = "tollgate_request_duration_seconds";
const TOKEN_REFRESHES: &str = "tollgate_token_refreshes_total";
const AUTH_REJECTIONS: &str = "tollgate_auth_rejections_total";
const UPSTREAM_ERRORS: &str = "tollgate_upstream_errors_total";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether to install the recorder.
    pub enabled: bool,

    /// Histogram buckets for request duration, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        }
    }
}

/// Install the Prometheus recorder.
///
/// Calling it again after a successful install is a no-op.
///
/// # Errors
///
/// Returns [`TelemetryError::MetricsInit`] if another recorder is installed
/// or the bucket list is empty.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled || METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION.to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);
    register_metric_descriptions();

    Ok(())
}

/// Render all metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(REQUESTS_TOTAL, "Requests answered by the gateway");
    describe_histogram!(REQUEST_DURATION, "Request duration in seconds");
    describe_counter!(TOKEN_REFRESHES, "Auth cookies refreshed while in flight");
    describe_counter!(AUTH_REJECTIONS, "Requests rejected by the auth pipeline");
    describe_counter!(UPSTREAM_ERRORS, "Failed backend calls");
}

/// Record a completed request.
///
/// `route` is the matched route prefix or local endpoint, never the raw path.
pub fn record_request(route: &str, status_code: u16, duration: Duration) {
    counter!(
        REQUESTS_TOTAL,
        "route" => route.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);

    histogram!(REQUEST_DURATION, "route" => route.to_string()).record(duration.as_secs_f64());
}

/// Record an in-flight cookie refresh.
pub fn record_token_refresh() {
    counter!(TOKEN_REFRESHES).increment(1);
}

/// Record a rejection by the auth pipeline.
pub fn record_auth_rejection(reason: &'static str) {
    counter!(AUTH_REJECTIONS, "reason" => reason).increment(1);
}

/// Record a failed backend call (`unavailable`, `timeout`).
pub fn record_upstream_error(kind: &'static str) {
    counter!(UPSTREAM_ERRORS, "kind" => kind).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MetricsConfig::default();
        assert!(config.enabled);
        assert_eq!(config.duration_buckets.len(), 12);
    }

    #[test]
    fn test_disabled_init_is_noop() {
        let config = MetricsConfig {
            enabled: false,
            ..MetricsConfig::default()
        };
        assert!(init_metrics(&config).is_ok());
    }

    #[test]
    fn test_recording_without_recorder() {
        record_request("/api/users", 200, Duration::from_millis(5));
        record_token_refresh();
        record_auth_rejection("missing_token");
        record_upstream_error("timeout");
    }
}
