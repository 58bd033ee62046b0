//! Telemetry setup failures.

use thiserror::Error;

/// Errors raised while installing telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to install the metrics recorder.
    #[error("cannot install metrics recorder: {0}")]
    MetricsInit(String),

    /// Failed to install the log subscriber.
    #[error("cannot install log subscriber: {0}")]
    LoggingInit(String),
}
