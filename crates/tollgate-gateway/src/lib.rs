//! Tollgate - cookie-authenticated edge gateway
//!
//! Tollgate sits in front of a set of backend services. It authenticates
//! browser requests from a signed, short-lived `auth_token` cookie, resolves
//! the caller's language, and forwards the request with the caller's identity
//! in plain headers. Backends never see cookies.
//!
//! # Architecture
//!
//! ```text
//!              ┌──────────────────────────────────────────────────────────┐
//!              │                        Tollgate                          │
//!   browser    │                                                          │
//!  ──────────► │  CsrfGuard ─► route? ──yes──► AuthPipeline ─► ProxyRouter │ ──► user_service
//!  auth_token  │                 │             ExtractCookie               │ ──► stock_service
//!  lang        │                 no            ValidateToken               │ ──► news_service
//!  X-CSRF-Token│                 ▼             RefreshCheck                │     (UID, Lang,
//!              │          local endpoints      ResolveLanguage             │      X-Forwarded-Host,
//!  ◄────────── │          login / register     InjectIdentityHeaders       │      X-Origin-Host)
//!  Set-Cookie  │          get-csrf-token                                  │
//!              │          check-credentials                               │
//!              └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```bash
//! $ TOLLGATE_JWT_KEY=... TOLLGATE_CSRF_KEY=... tollgate --config /etc/tollgate/gateway.toml
//! ```

#![doc(html_root_url = "https://docs.rs/tollgate-gateway/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod csrf;
pub mod datastore;
pub mod error;
pub mod handlers;
pub mod headers;
pub mod health;
pub mod pipeline;
pub mod proxy;
pub mod routes;
pub mod server;
pub mod steps;
pub mod types;

pub use context::GatewayContext;
pub use csrf::CsrfGuard;
pub use datastore::{Credentials, Datastore, DatastoreError, MemoryDatastore, Registration};
pub use error::{ErrorResponse, GatewayError, GatewayResult};
pub use health::{HealthChecker, HealthStatus};
pub use pipeline::{AuthPipeline, Stage, Step, StepOutcome};
pub use proxy::ProxyRouter;
pub use routes::{Route, RouteTable};
pub use server::{GatewayServer, GatewayState};

/// Gateway version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
