//! Error types for token and cookie handling.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Failures of a token or of the claims it carries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Signature does not verify under the configured secret.
    #[error("token signature is invalid")]
    InvalidSignature,

    /// Token could not be decoded into the claim shape.
    #[error("token is malformed: {0}")]
    Malformed(String),

    /// Token has passed its expiry.
    #[error("token expired at {expired_at}")]
    Expired {
        /// When the token expired.
        expired_at: DateTime<Utc>,
    },

    /// Subject id is below 1.
    #[error("invalid subject id {0}")]
    InvalidSubject(i64),

    /// Claims could not be encoded or signed.
    #[error("failed to encode token: {0}")]
    Encoding(String),
}

/// Violations of the cookie creation policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// Requested expiry is not strictly in the future.
    #[error("expiry {expires_at} is not in the future")]
    ExpiredWindow {
        /// The rejected expiry.
        expires_at: DateTime<Utc>,
    },

    /// Requested lifetime reaches or exceeds the maximum window.
    #[error("requested lifetime of {requested_secs}s exceeds the {max_secs}s window")]
    WindowTooLarge {
        /// Requested lifetime in seconds.
        requested_secs: i64,
        /// Maximum lifetime in seconds.
        max_secs: i64,
    },
}

/// Top-level error for the auth crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// A signing secret was empty.
    #[error("signing secret must not be empty")]
    EmptySecret,

    /// Token verification or claims failure.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Creation policy violation.
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

impl AuthError {
    /// Returns `true` if the error was caused by the client's input rather
    /// than by the gateway itself.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::EmptySecret | Self::Token(TokenError::Encoding(_)))
    }

    /// Short machine-readable reason, used as a metrics label.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::EmptySecret => "empty_secret",
            Self::Token(TokenError::InvalidSignature) => "invalid_signature",
            Self::Token(TokenError::Malformed(_)) => "malformed",
            Self::Token(TokenError::Expired { .. }) => "expired",
            Self::Token(TokenError::InvalidSubject(_)) => "invalid_subject",
            Self::Token(TokenError::Encoding(_)) => "encoding",
            Self::Policy(PolicyError::ExpiredWindow { .. }) => "expired_window",
            Self::Policy(PolicyError::WindowTooLarge { .. }) => "window_too_large",
        }
    }
}
