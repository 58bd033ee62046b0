//! Anti-forgery guard for state-changing requests.

use std::sync::Arc;

use http::{HeaderMap, Method};
use tracing::debug;

use tollgate_auth::{AntiForgery, CsrfError};
use tollgate_telemetry::metrics::record_auth_rejection;

use crate::error::{GatewayError, GatewayResult};
use crate::headers::HEADER_CSRF_TOKEN;

/// Checks `X-CSRF-Token` on every method that may change state.
#[derive(Debug, Clone)]
pub struct CsrfGuard {
    tokens: Arc<AntiForgery>,
    enforce: bool,
}

impl CsrfGuard {
    /// Create a guard. With `enforce` off every request passes.
    pub fn new(tokens: Arc<AntiForgery>, enforce: bool) -> Self {
        Self { tokens, enforce }
    }

    /// `true` for GET, HEAD, OPTIONS and TRACE.
    pub fn is_safe_method(method: &Method) -> bool {
        matches!(
            *method,
            Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
        )
    }

    /// Whether tokens are enforced.
    pub fn is_enforcing(&self) -> bool {
        self.enforce
    }

    /// Issue a token for a response header.
    pub fn issue(&self) -> String {
        self.tokens.issue()
    }

    /// Check a request's method and headers.
    pub fn check(&self, method: &Method, headers: &HeaderMap) -> GatewayResult<()> {
        if !self.enforce || Self::is_safe_method(method) {
            return Ok(());
        }

        let Some(token) = headers.get(&HEADER_CSRF_TOKEN) else {
            record_auth_rejection("csrf_missing");
            return Err(GatewayError::CsrfMissing);
        };
        let token = token.to_str().map_err(|_| {
            record_auth_rejection("csrf_malformed");
            GatewayError::CsrfRejected(CsrfError::Malformed)
        })?;

        self.tokens.verify(token).map_err(|e| {
            debug!(error = %e, "anti-forgery token rejected");
            record_auth_rejection("csrf_rejected");
            GatewayError::from(e)
        })
    }
}
