//! Per-request gateway context.

use std::time::{Duration, Instant};

use http::header::SET_COOKIE;
use http::HeaderValue;
use tracing::warn;
use uuid::Uuid;

use tollgate_auth::{AuthClaims, Cookies, SetCookie};

use crate::headers::HEADER_REQUEST_ID;
use crate::types::GatewayResponse;

/// State collected while a request moves through the gateway.
///
/// Cookies queued with [`GatewayContext::add_cookie`] are written to
/// whichever response ends the request, terminal or forwarded.
#[derive(Debug)]
pub struct GatewayContext {
    request_id: String,
    started_at: Instant,
    cookies: Cookies,
    token: Option<String>,
    claims: Option<AuthClaims>,
    language: Option<String>,
    route: String,
    backend: Option<String>,
    set_cookies: Vec<SetCookie>,
}

impl GatewayContext {
    /// Create a context for a request with the given cookies.
    pub fn new(cookies: Cookies) -> Self {
        Self {
            request_id: Uuid::now_v7().to_string(),
            started_at: Instant::now(),
            cookies,
            token: None,
            claims: None,
            language: None,
            route: String::from("unmatched"),
            backend: None,
            set_cookies: Vec::new(),
        }
    }

    /// Request id (UUID v7).
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Time since the request was accepted.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Cookies sent by the client.
    pub fn cookies(&self) -> &Cookies {
        &self.cookies
    }

    /// Raw auth token, once extracted.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Record the extracted auth token.
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    /// Verified claims, once validated.
    pub fn claims(&self) -> Option<&AuthClaims> {
        self.claims.as_ref()
    }

    /// Record verified claims.
    pub fn set_claims(&mut self, claims: AuthClaims) {
        self.claims = Some(claims);
    }

    /// Subject id from verified claims.
    pub fn subject_id(&self) -> Option<i64> {
        self.claims.map(|c| c.subject_id)
    }

    /// Resolved language.
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Record the resolved language.
    pub fn set_language(&mut self, language: impl Into<String>) {
        self.language = Some(language.into());
    }

    /// Route label for logs and metrics.
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Set the route label.
    pub fn set_route(&mut self, route: impl Into<String>) {
        self.route = route.into();
    }

    /// Backend host the request was routed to.
    pub fn backend(&self) -> Option<&str> {
        self.backend.as_deref()
    }

    /// Record the backend host.
    pub fn set_backend(&mut self, backend: impl Into<String>) {
        self.backend = Some(backend.into());
    }

    /// Queue a cookie for the response.
    pub fn add_cookie(&mut self, cookie: SetCookie) {
        self.set_cookies.push(cookie);
    }

    /// Cookies queued so far.
    pub fn pending_cookies(&self) -> &[SetCookie] {
        &self.set_cookies
    }

    /// Write queued cookies and the request id onto `response`.
    pub fn finish(&mut self, mut response: GatewayResponse) -> GatewayResponse {
        let headers = response.headers_mut();

        for cookie in self.set_cookies.drain(..) {
            match HeaderValue::from_str(&cookie.to_header_value()) {
                Ok(value) => {
                    headers.append(SET_COOKIE, value);
                }
                Err(e) => warn!(cookie = cookie.name(), error = %e, "dropping unencodable cookie"),
            }
        }

        if let Ok(value) = HeaderValue::from_str(&self.request_id) {
            headers.insert(HEADER_REQUEST_ID.clone(), value);
        }

        response
    }
}
