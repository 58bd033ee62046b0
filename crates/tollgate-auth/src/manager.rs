//! Auth cookie policy.
//!
//! [`CookieManager`] wraps a [`TokenCodec`] and enforces the rules around
//! it: who can get a cookie, for how long, and when a presented cookie is
//! still acceptable.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::codec::{AuthClaims, TokenCodec};
use crate::cookie::SetCookie;
use crate::error::{AuthResult, PolicyError, TokenError};

/// Name of the auth cookie.
pub const AUTH_COOKIE_NAME: &str = "auth_token";

/// Path scope of the auth cookie.
pub const AUTH_COOKIE_PATH: &str = "/api";

/// Upper bound (exclusive) on a newly created cookie's lifetime.
pub const MAX_COOKIE_WINDOW: Duration = Duration::minutes(5);

/// Lifetime of a freshly issued or refreshed cookie.
pub const DEFAULT_COOKIE_LIFETIME: Duration = Duration::minutes(2);

/// A signed auth cookie ready to be sent to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCookie {
    token: String,
    expires_at: DateTime<Utc>,
}

impl AuthCookie {
    /// Signed token carried as the cookie value.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Expiry, equal to the claims expiry.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Wire form with the fixed security attributes.
    pub fn to_set_cookie(&self) -> SetCookie {
        SetCookie::new(
            AUTH_COOKIE_NAME,
            self.token.clone(),
            AUTH_COOKIE_PATH,
            self.expires_at,
        )
        .credential()
    }
}

/// Capability set the gateway needs from an auth backend.
///
/// The token arguments are the raw `auth_token` cookie value.
pub trait Authenticator: Send + Sync {
    /// Issue a cookie for `subject_id` expiring at `expires_at`.
    fn create_auth_cookie(&self, subject_id: i64, expires_at: DateTime<Utc>)
        -> AuthResult<AuthCookie>;

    /// Verify a presented cookie and return its claims.
    fn validate_auth_cookie(&self, token: &str) -> AuthResult<AuthClaims>;

    /// Subject id of a cookie. Verifies the signature, not the expiry.
    fn subject_id(&self, token: &str) -> AuthResult<i64>;

    /// Expiry of a cookie. Verifies the signature, not the expiry.
    fn expires_at(&self, token: &str) -> AuthResult<DateTime<Utc>>;
}

/// Default [`Authenticator`] backed by a [`TokenCodec`].
#[derive(Debug, Clone)]
pub struct CookieManager {
    codec: TokenCodec,
}

impl CookieManager {
    /// Create a manager around a codec.
    pub fn new(codec: TokenCodec) -> Self {
        Self { codec }
    }

    /// Create a manager from a signing secret.
    pub fn from_secret(secret: impl AsRef<[u8]>) -> AuthResult<Self> {
        Ok(Self::new(TokenCodec::new(secret)?))
    }

    /// Expiry for a cookie issued now: now + 2 minutes.
    pub fn default_expiry() -> DateTime<Utc> {
        Utc::now() + DEFAULT_COOKIE_LIFETIME
    }

    /// [`Authenticator::create_auth_cookie`] against an explicit clock.
    pub fn create_auth_cookie_at(
        &self,
        subject_id: i64,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AuthResult<AuthCookie> {
        if subject_id < 1 {
            return Err(TokenError::InvalidSubject(subject_id).into());
        }
        // The signed claim only keeps whole seconds.
        let signed_expiry = truncate_to_secs(expires_at);
        if signed_expiry <= now {
            return Err(PolicyError::ExpiredWindow { expires_at }.into());
        }
        let window = expires_at - now;
        if window >= MAX_COOKIE_WINDOW {
            return Err(PolicyError::WindowTooLarge {
                requested_secs: window.num_seconds(),
                max_secs: MAX_COOKIE_WINDOW.num_seconds(),
            }
            .into());
        }

        let token = self.codec.sign(subject_id, expires_at)?;
        debug!(subject_id, expires_at = %expires_at, "issued auth cookie");

        Ok(AuthCookie {
            token,
            expires_at: signed_expiry,
        })
    }

    /// [`Authenticator::validate_auth_cookie`] against an explicit clock.
    pub fn validate_auth_cookie_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<AuthClaims> {
        let claims = self.codec.parse(token)?;
        if now > claims.expires_at {
            return Err(TokenError::Expired {
                expired_at: claims.expires_at,
            }
            .into());
        }
        if claims.subject_id < 1 {
            return Err(TokenError::InvalidSubject(claims.subject_id).into());
        }
        Ok(claims)
    }
}

impl Authenticator for CookieManager {
    fn create_auth_cookie(
        &self,
        subject_id: i64,
        expires_at: DateTime<Utc>,
    ) -> AuthResult<AuthCookie> {
        self.create_auth_cookie_at(subject_id, expires_at, Utc::now())
    }

    fn validate_auth_cookie(&self, token: &str) -> AuthResult<AuthClaims> {
        self.validate_auth_cookie_at(token, Utc::now())
    }

    fn subject_id(&self, token: &str) -> AuthResult<i64> {
        Ok(self.codec.parse(token)?.subject_id)
    }

    fn expires_at(&self, token: &str) -> AuthResult<DateTime<Utc>> {
        Ok(self.codec.parse(token)?.expires_at)
    }
}

fn truncate_to_secs(instant: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(instant.timestamp(), 0).unwrap_or(instant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use chrono::TimeZone;

    fn manager() -> CookieManager {
        CookieManager::from_secret("manager-secret").unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_create_rejects_subject_zero() {
        let err = manager()
            .create_auth_cookie_at(0, now() + Duration::minutes(2), now())
            .unwrap_err();
        assert_eq!(err, AuthError::Token(TokenError::InvalidSubject(0)));
    }

    #[test]
    fn test_create_rejects_negative_subject() {
        let err = manager()
            .create_auth_cookie_at(-5, now() + Duration::minutes(2), now())
            .unwrap_err();
        assert_eq!(err, AuthError::Token(TokenError::InvalidSubject(-5)));
    }

    #[test]
    fn test_create_rejects_expiry_equal_to_now() {
        let err = manager().create_auth_cookie_at(1, now(), now()).unwrap_err();
        assert!(matches!(err, AuthError::Policy(PolicyError::ExpiredWindow { .. })));
    }

    #[test]
    fn test_create_rejects_epoch_expiry() {
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        let err = manager().create_auth_cookie_at(2, epoch, now()).unwrap_err();
        assert!(matches!(err, AuthError::Policy(PolicyError::ExpiredWindow { .. })));
    }

    #[test]
    fn test_create_rejects_large_window() {
        let err = manager()
            .create_auth_cookie_at(3, now() + Duration::minutes(10), now())
            .unwrap_err();
        assert_eq!(
            err,
            AuthError::Policy(PolicyError::WindowTooLarge {
                requested_secs: 600,
                max_secs: 300
            })
        );
    }

    #[test]
    fn test_create_rejects_exact_five_minutes() {
        let err = manager()
            .create_auth_cookie_at(3, now() + Duration::minutes(5), now())
            .unwrap_err();
        assert!(matches!(err, AuthError::Policy(PolicyError::WindowTooLarge { .. })));
    }

    #[test]
    fn test_create_accepts_just_under_five_minutes() {
        let cookie = manager()
            .create_auth_cookie_at(1, now() + Duration::seconds(299), now())
            .unwrap();
        assert_eq!(cookie.expires_at(), now() + Duration::seconds(299));
    }

    #[test]
    fn test_create_rejects_expiry_truncated_into_the_past() {
        let at = now() + Duration::milliseconds(600);
        let err = manager()
            .create_auth_cookie_at(1, at + Duration::milliseconds(300), at)
            .unwrap_err();
        assert!(matches!(err, AuthError::Policy(PolicyError::ExpiredWindow { .. })));
    }

    #[test]
    fn test_subsecond_expiry_still_validates() {
        let manager = manager();
        let at = now() + Duration::milliseconds(600);
        let cookie = manager
            .create_auth_cookie_at(1, at + Duration::milliseconds(700), at)
            .unwrap();
        assert_eq!(cookie.expires_at(), now() + Duration::seconds(1));
        assert!(manager.validate_auth_cookie_at(cookie.token(), at).is_ok());
    }

    #[test]
    fn test_create_accepts_valid_windows() {
        let manager = manager();
        let cookie = manager
            .create_auth_cookie_at(1, now() + Duration::minutes(2), now())
            .unwrap();
        assert_eq!(cookie.expires_at(), now() + Duration::minutes(2));

        let cookie = manager
            .create_auth_cookie_at(150_000, now() + Duration::seconds(30), now())
            .unwrap();
        assert_eq!(manager.subject_id(cookie.token()).unwrap(), 150_000);
    }

    #[test]
    fn test_created_cookie_round_trips() {
        let manager = manager();
        let expires = now() + Duration::seconds(90);
        let cookie = manager.create_auth_cookie_at(77, expires, now()).unwrap();

        let claims = manager.validate_auth_cookie_at(cookie.token(), now()).unwrap();
        assert_eq!(claims, AuthClaims::new(77, expires));
        assert_eq!(manager.expires_at(cookie.token()).unwrap(), expires);
    }

    #[test]
    fn test_validate_rejects_expired() {
        let manager = manager();
        let expires = now() + Duration::seconds(60);
        let cookie = manager.create_auth_cookie_at(1, expires, now()).unwrap();

        assert!(manager.validate_auth_cookie_at(cookie.token(), expires).is_ok());
        let err = manager
            .validate_auth_cookie_at(cookie.token(), expires + Duration::seconds(1))
            .unwrap_err();
        assert_eq!(err, AuthError::Token(TokenError::Expired { expired_at: expires }));
    }

    #[test]
    fn test_validate_rejects_subject_zero() {
        let codec = TokenCodec::new("manager-secret").unwrap();
        let token = codec.sign(0, now() + Duration::minutes(1)).unwrap();

        let err = manager().validate_auth_cookie_at(&token, now()).unwrap_err();
        assert_eq!(err, AuthError::Token(TokenError::InvalidSubject(0)));
    }

    #[test]
    fn test_validate_propagates_codec_errors() {
        let err = manager().validate_auth_cookie_at("garbage", now()).unwrap_err();
        assert!(matches!(err, AuthError::Token(TokenError::Malformed(_))));

        let foreign = CookieManager::from_secret("someone-else")
            .unwrap()
            .create_auth_cookie_at(1, now() + Duration::minutes(1), now())
            .unwrap();
        let err = manager()
            .validate_auth_cookie_at(foreign.token(), now())
            .unwrap_err();
        assert_eq!(err, AuthError::Token(TokenError::InvalidSignature));
    }

    #[test]
    fn test_set_cookie_attributes() {
        let expires = now() + Duration::minutes(2);
        let cookie = manager().create_auth_cookie_at(9, expires, now()).unwrap();
        let header = cookie.to_set_cookie().to_header_value();

        assert!(header.starts_with(&format!("auth_token={}", cookie.token())));
        assert!(header.contains("Path=/api"));
        assert!(header.contains("Expires=Sat, 01 Jun 2030 12:02:00 GMT"));
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("Secure"));
        assert!(header.contains("SameSite=Strict"));
    }

    #[test]
    fn test_trait_object_wall_clock() {
        let auth: Box<dyn Authenticator> = Box::new(manager());
        let cookie = auth
            .create_auth_cookie(5, CookieManager::default_expiry())
            .unwrap();
        let claims = auth.validate_auth_cookie(cookie.token()).unwrap();
        assert_eq!(claims.subject_id, 5);
    }
}
