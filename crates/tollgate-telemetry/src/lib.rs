//! Observability for the Tollgate gateway.
//!
//! - **Logging**: `tracing` events rendered as JSON lines or pretty text
//! - **Metrics**: Prometheus text format via the `metrics` facade
//!
//! # Gateway Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `tollgate_requests_total` | Counter | `route`, `status` | Requests answered |
//! | `tollgate_request_duration_seconds` | Histogram | `route` | Request latency |
//! | `tollgate_token_refreshes_total` | Counter | - | Auth cookies refreshed in flight |
//! | `tollgate_auth_rejections_total` | Counter | `reason` | Requests rejected by the auth pipeline |
//! | `tollgate_upstream_errors_total` | Counter | `kind` | Backend failures |
//!
//! The metrics are exposed by the gateway itself, not on a separate port:
//!
//! ```text
//! # TYPE tollgate_requests_total counter
//! tollgate_requests_total{route="/api/users",status="200"} 1234
//! tollgate_requests_total{route="/api/users",status="401"} 56
//! ```

#![doc(html_root_url = "https://docs.rs/tollgate-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogOutput};
pub use metrics::{init_metrics, render_metrics, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
