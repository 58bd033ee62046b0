//! Error types for the gateway.
//!
//! Every error maps to a status code and a generic client-facing message.
//! The detailed `Display` form is for logs only.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tollgate_auth::{AuthError, CsrfError, UnsupportedLanguage};
use tollgate_config::ConfigError;

use crate::datastore::DatastoreError;
use crate::types::{json_response, GatewayResponse};

/// Gateway errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No auth cookie on a protected route.
    #[error("auth cookie missing")]
    MissingToken,

    /// Auth cookie failed verification or policy.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// `lang` cookie names an unsupported language.
    #[error(transparent)]
    UnsupportedLanguage(#[from] UnsupportedLanguage),

    /// Anti-forgery check failed.
    #[error("anti-forgery check failed: {0}")]
    CsrfRejected(#[from] CsrfError),

    /// Unsafe request without an anti-forgery token.
    #[error("anti-forgery token missing")]
    CsrfMissing,

    /// Malformed client input.
    #[error("bad request: {message}")]
    BadRequest {
        /// What was wrong.
        message: String,
    },

    /// Credentials did not match.
    #[error("unauthorized: {message}")]
    Unauthorized {
        /// What did not match.
        message: String,
    },

    /// No route or local endpoint for the path.
    #[error("no route for {path}")]
    NotFound {
        /// Request path.
        path: String,
    },

    /// Local endpoint exists but not for this method.
    #[error("method {method} not allowed")]
    MethodNotAllowed {
        /// Request method.
        method: String,
    },

    /// Request body exceeded the configured limit.
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge {
        /// Configured limit.
        limit: usize,
    },

    /// Backend could not be reached or failed mid-request.
    #[error("upstream {backend} unavailable: {message}")]
    UpstreamUnavailable {
        /// Backend host.
        backend: String,
        /// Underlying failure.
        message: String,
    },

    /// Backend did not answer in time.
    #[error("upstream {backend} timed out")]
    UpstreamTimeout {
        /// Backend host.
        backend: String,
    },

    /// Credential store failure.
    #[error(transparent)]
    Datastore(#[from] DatastoreError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Server startup error.
    #[error("server error: {message}")]
    Server {
        /// Error message.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP construction error.
    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error.
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl GatewayError {
    /// Create a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Create an unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create an upstream unavailable error.
    pub fn upstream(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a server error.
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// HTTP status for this error.
    #[allow(clippy::match_same_arms)]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingToken => StatusCode::UNAUTHORIZED,
            Self::Auth(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Auth(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UnsupportedLanguage(_) => StatusCode::BAD_REQUEST,
            Self::CsrfRejected(_) | Self::CsrfMissing => StatusCode::FORBIDDEN,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Datastore(DatastoreError::DuplicateEmail) => StatusCode::BAD_REQUEST,
            Self::Datastore(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) | Self::Server { .. } | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Http(_) | Self::Json(_) | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Error category, used in the response envelope and as a metrics label.
    pub fn category(&self) -> &'static str {
        match self {
            Self::MissingToken | Self::Auth(_) | Self::Unauthorized { .. } => "authentication",
            Self::UnsupportedLanguage(_) => "language",
            Self::CsrfRejected(_) | Self::CsrfMissing => "csrf",
            Self::BadRequest { .. } | Self::PayloadTooLarge { .. } => "request",
            Self::NotFound { .. } | Self::MethodNotAllowed { .. } => "routing",
            Self::UpstreamUnavailable { .. } | Self::UpstreamTimeout { .. } => "upstream",
            Self::Datastore(_) => "datastore",
            Self::Config(_) => "config",
            Self::Server { .. } | Self::Io(_) => "server",
            Self::Http(_) | Self::Json(_) | Self::Internal { .. } => "internal",
        }
    }

    /// Message safe to show to clients.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::MissingToken => "authentication required",
            Self::Auth(e) if e.is_client_error() => "invalid credentials",
            Self::UnsupportedLanguage(_) => "unsupported language",
            Self::CsrfRejected(_) | Self::CsrfMissing => "forbidden",
            Self::BadRequest { .. } => "invalid request",
            Self::Unauthorized { .. } => "invalid credentials",
            Self::NotFound { .. } => "not found",
            Self::MethodNotAllowed { .. } => "method not allowed",
            Self::PayloadTooLarge { .. } => "request body too large",
            Self::UpstreamUnavailable { .. } => "bad gateway",
            Self::UpstreamTimeout { .. } => "gateway timeout",
            Self::Datastore(DatastoreError::DuplicateEmail) => {
                "an account using that email already exists"
            }
            _ => "internal server error",
        }
    }

    /// `true` if the gateway, not the client, is at fault.
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Render as a JSON error response.
    pub fn to_response(&self, request_id: &str) -> GatewayResponse {
        let body = ErrorResponse::from(self).with_request_id(request_id);
        json_response(self.status_code(), &body)
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// JSON error envelope sent to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error category.
    pub error: String,
    /// Generic message.
    pub message: String,
    /// Request id for correlation with logs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorResponse {
    /// Create an error envelope.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            request_id: None,
        }
    }

    /// Set the request id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

impl From<&GatewayError> for ErrorResponse {
    fn from(err: &GatewayError) -> Self {
        Self::new(err.category(), err.public_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use tollgate_auth::{PolicyError, TokenError};

    #[test]
    fn test_status_codes() {
        assert_eq!(GatewayError::MissingToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            GatewayError::from(AuthError::from(TokenError::InvalidSignature)).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::from(AuthError::from(TokenError::Encoding("x".into()))).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GatewayError::from(UnsupportedLanguage("xx".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::upstream("users:8081", "refused").status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GatewayError::UpstreamTimeout {
                backend: "users:8081".into()
            }
            .status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(GatewayError::CsrfMissing.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            GatewayError::from(DatastoreError::DuplicateEmail).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_public_message_hides_details() {
        let err = GatewayError::upstream("users:8081", "connection refused (os error 111)");
        assert_eq!(err.public_message(), "bad gateway");
        assert!(err.to_string().contains("os error 111"));

        let err = GatewayError::from(AuthError::from(PolicyError::WindowTooLarge {
            requested_secs: 600,
            max_secs: 300,
        }));
        assert_eq!(err.public_message(), "invalid credentials");
    }

    #[test]
    fn test_categories() {
        assert_eq!(GatewayError::MissingToken.category(), "authentication");
        assert_eq!(GatewayError::bad_request("x").category(), "request");
        assert_eq!(GatewayError::internal("x").category(), "internal");
    }

    #[tokio::test]
    async fn test_to_response_envelope() {
        let response = GatewayError::MissingToken.to_response("req-1");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let envelope: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(envelope.error, "authentication");
        assert_eq!(envelope.message, "authentication required");
        assert_eq!(envelope.request_id.as_deref(), Some("req-1"));
    }
}
