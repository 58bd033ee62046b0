//! Endpoints the gateway answers itself.

use std::sync::Arc;

use http::{HeaderValue, StatusCode};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use tollgate_auth::{Authenticator, CookieManager, LanguageCookie, SupportedLanguages};
use tollgate_telemetry::metrics::record_auth_rejection;
use tollgate_telemetry::render_metrics;

use crate::context::GatewayContext;
use crate::csrf::CsrfGuard;
use crate::datastore::{Datastore, Registration};
use crate::error::{GatewayError, GatewayResult};
use crate::headers::HEADER_CSRF_TOKEN;
use crate::health::{HealthChecker, HealthStatus};
use crate::types::{json_response, status_response, text_response, GatewayRequest, GatewayResponse};

/// Rough e-mail shape: something, `@`, an ASCII word, a dot, an ASCII word.
const EMAIL_PATTERN: &str = r"^.+@[0-9A-Za-z_]+\.[0-9A-Za-z_]+$";

/// Body of `POST /api/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    /// Account e-mail.
    #[serde(default)]
    pub email: String,
    /// Plain-text password.
    #[serde(default)]
    pub pass: String,
}

/// Login, registration and anti-forgery token endpoints.
pub struct AccountHandlers {
    authenticator: Arc<dyn Authenticator>,
    datastore: Arc<dyn Datastore>,
    languages: Arc<SupportedLanguages>,
    csrf: CsrfGuard,
    email: Regex,
}

impl AccountHandlers {
    /// Create the handlers.
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        datastore: Arc<dyn Datastore>,
        languages: Arc<SupportedLanguages>,
        csrf: CsrfGuard,
    ) -> GatewayResult<Self> {
        let email = Regex::new(EMAIL_PATTERN)
            .map_err(|e| GatewayError::internal(format!("invalid e-mail pattern: {e}")))?;
        Ok(Self {
            authenticator,
            datastore,
            languages,
            csrf,
            email,
        })
    }

    /// `true` if `email` has a plausible shape.
    pub fn is_valid_email(&self, email: &str) -> bool {
        self.email.is_match(email)
    }

    /// `POST /api/login`.
    ///
    /// On success queues the auth cookie and a language cookie for the
    /// stored language, and returns a fresh anti-forgery token.
    pub async fn login(
        &self,
        ctx: &mut GatewayContext,
        request: &GatewayRequest,
    ) -> GatewayResult<GatewayResponse> {
        let body: LoginRequest = serde_json::from_slice(request.body())
            .map_err(|e| GatewayError::bad_request(format!("invalid login body: {e}")))?;

        if body.email.is_empty() || body.pass.is_empty() {
            return Err(GatewayError::bad_request("email and password are required"));
        }
        if !self.is_valid_email(&body.email) {
            return Err(GatewayError::bad_request("invalid email"));
        }

        let Some(credentials) = self.datastore.lookup_credentials(&body.email).await? else {
            record_auth_rejection("unknown_user");
            return Err(GatewayError::bad_request("no user with the specified credentials"));
        };

        let hash = credentials.password_hash.clone();
        let pass = body.pass;
        let matches = tokio::task::spawn_blocking(move || bcrypt::verify(pass, &hash))
            .await
            .map_err(|e| GatewayError::internal(format!("password check failed: {e}")))?;
        if !matches.unwrap_or(false) {
            record_auth_rejection("bad_password");
            return Err(GatewayError::unauthorized("password mismatch"));
        }

        let cookie = self
            .authenticator
            .create_auth_cookie(credentials.subject_id, CookieManager::default_expiry())?;
        let language = LanguageCookie::for_language(&self.languages, &credentials.language);

        ctx.add_cookie(cookie.to_set_cookie());
        ctx.add_cookie(language.to_set_cookie());
        info!(subject_id = credentials.subject_id, "login succeeded");

        Ok(self.with_csrf_token(status_response(StatusCode::OK)))
    }

    /// `POST /api/register`.
    pub async fn register(&self, request: &GatewayRequest) -> GatewayResult<GatewayResponse> {
        let registration: Registration = serde_json::from_slice(request.body())
            .map_err(|e| GatewayError::bad_request(format!("invalid registration body: {e}")))?;

        if registration.email.is_empty()
            || registration.pass.is_empty()
            || registration.last_name.is_empty()
        {
            return Err(GatewayError::bad_request(
                "email, password and last name are required",
            ));
        }
        if !self.is_valid_email(&registration.email) {
            return Err(GatewayError::bad_request("invalid email"));
        }

        let subject_id = self.datastore.register(registration).await?;
        info!(subject_id, "registration succeeded");

        Ok(self.with_csrf_token(status_response(StatusCode::OK)))
    }

    /// `GET /api/get-csrf-token`.
    pub fn csrf_token(&self) -> GatewayResponse {
        self.with_csrf_token(status_response(StatusCode::OK))
    }

    fn with_csrf_token(&self, mut response: GatewayResponse) -> GatewayResponse {
        match HeaderValue::from_str(&self.csrf.issue()) {
            Ok(token) => {
                response.headers_mut().insert(HEADER_CSRF_TOKEN.clone(), token);
            }
            Err(e) => debug!(error = %e, "anti-forgery token is not a valid header value"),
        }
        response
    }
}

/// `GET /api/check-credentials`, reached only after the auth pipeline passed.
pub fn check_credentials() -> GatewayResponse {
    status_response(StatusCode::OK)
}

/// `GET /_tollgate/health`. Answers 503 while draining.
pub fn health(checker: &HealthChecker) -> GatewayResponse {
    let report = checker.health();
    let status = match report.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Draining => StatusCode::SERVICE_UNAVAILABLE,
    };
    json_response(status, &report)
}

/// `GET /_tollgate/version`.
pub fn version(checker: &HealthChecker) -> GatewayResponse {
    json_response(StatusCode::OK, &checker.version())
}

/// `GET /_tollgate/metrics` in Prometheus text format.
pub fn metrics() -> GatewayResponse {
    match render_metrics() {
        Some(body) => text_response(StatusCode::OK, body),
        None => status_response(StatusCode::NOT_FOUND),
    }
}
