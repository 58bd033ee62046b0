//! Structured logging.
//!
//! The gateway logs one `request` span per HTTP request; its fields
//! (`request_id`, `method`, `path`) are attached to every event inside it.
//!
//! ```rust,ignore
//! use tollgate_telemetry::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::json("info"))?;
//! tracing::info!(subject_id = 42, "cookie refreshed");
//! ```

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogOutput {
    /// One JSON object per line, with the current span's fields.
    #[default]
    Json,
    /// Multi-line human-readable output.
    Pretty,
}

/// Subscriber settings.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Line format.
    pub output: LogOutput,
    /// Log when request spans close, with their duration.
    pub span_close: bool,
    /// Include source file and line.
    pub source_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::json("info")
    }
}

impl LogConfig {
    /// JSON lines for log shippers.
    #[must_use]
    pub fn json(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            output: LogOutput::Json,
            span_close: false,
            source_location: false,
        }
    }

    /// Pretty output for a terminal, with span timings and source locations.
    #[must_use]
    pub fn pretty(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            output: LogOutput::Pretty,
            span_close: true,
            source_location: true,
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins over [`LogConfig::filter`].
///
/// # Errors
///
/// [`TelemetryError::LoggingInit`] for a bad filter or a second install.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => create_env_filter(&config.filter)?,
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_span_events(if config.span_close {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        })
        .with_file(config.source_location)
        .with_line_number(config.source_location);

    let layer = match config.output {
        LogOutput::Json => layer
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_filter(filter)
            .boxed(),
        LogOutput::Pretty => layer.pretty().with_filter(filter).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

/// Parse a directive such as `info` or `tollgate_gateway=debug,hyper=warn`.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(filter)
        .map_err(|e| TelemetryError::LoggingInit(format!("invalid log filter '{filter}': {e}")))
}
