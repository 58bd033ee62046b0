//! Anti-forgery tokens.
//!
//! Token format: `base64(timestamp:nonce:hex(hmac_sha256(timestamp:nonce)))`.
//! Tokens are not bound to a session; any token signed by the gateway's
//! anti-forgery secret and younger than the TTL is accepted.

use std::fmt;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};

type HmacSha256 = Hmac<Sha256>;

/// Default token lifetime.
pub const DEFAULT_CSRF_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// Why an anti-forgery token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CsrfError {
    /// Not decodable into the token layout.
    #[error("anti-forgery token is malformed")]
    Malformed,
    /// Signature mismatch.
    #[error("anti-forgery token signature is invalid")]
    InvalidSignature,
    /// Older than the TTL.
    #[error("anti-forgery token has expired")]
    Expired,
}

/// Issues and verifies anti-forgery tokens.
#[derive(Clone)]
pub struct AntiForgery {
    mac: HmacSha256,
    ttl: Duration,
}

impl AntiForgery {
    /// Create an issuer from a secret and token lifetime.
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> AuthResult<Self> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(AuthError::EmptySecret);
        }
        let mac = HmacSha256::new_from_slice(secret).map_err(|_| AuthError::EmptySecret)?;
        Ok(Self { mac, ttl })
    }

    /// Token lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a fresh token.
    pub fn issue(&self) -> String {
        self.issue_at(Utc::now().timestamp())
    }

    /// Verify a token presented by a client.
    pub fn verify(&self, token: &str) -> Result<(), CsrfError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    fn issue_at(&self, timestamp: i64) -> String {
        let nonce = Uuid::now_v7().simple().to_string();
        let signature = self.signature(timestamp, &nonce);
        BASE64.encode(format!("{timestamp}:{nonce}:{signature}"))
    }

    fn verify_at(&self, token: &str, now: i64) -> Result<(), CsrfError> {
        let raw = BASE64.decode(token.trim()).map_err(|_| CsrfError::Malformed)?;
        let raw = String::from_utf8(raw).map_err(|_| CsrfError::Malformed)?;

        let mut parts = raw.splitn(3, ':');
        let (Some(timestamp), Some(nonce), Some(signature)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(CsrfError::Malformed);
        };
        let timestamp: i64 = timestamp.parse().map_err(|_| CsrfError::Malformed)?;

        let expected = self.signature(timestamp, nonce);
        if !bool::from(signature.as_bytes().ct_eq(expected.as_bytes())) {
            return Err(CsrfError::InvalidSignature);
        }

        let age = now.saturating_sub(timestamp);
        if age < 0 || age.unsigned_abs() > self.ttl.as_secs() {
            return Err(CsrfError::Expired);
        }

        Ok(())
    }

    fn signature(&self, timestamp: i64, nonce: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(format!("{timestamp}:{nonce}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

impl fmt::Debug for AntiForgery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AntiForgery")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> AntiForgery {
        AntiForgery::new("csrf-secret", Duration::from_secs(60)).unwrap()
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert_eq!(
            AntiForgery::new("", DEFAULT_CSRF_TTL).unwrap_err(),
            AuthError::EmptySecret
        );
    }

    #[test]
    fn test_issued_token_verifies() {
        let issuer = issuer();
        let token = issuer.issue();
        assert_eq!(issuer.verify(&token), Ok(()));
    }

    #[test]
    fn test_tokens_are_unique() {
        let issuer = issuer();
        assert_ne!(issuer.issue(), issuer.issue());
    }

    #[test]
    fn test_foreign_key_rejected() {
        let other = AntiForgery::new("other", Duration::from_secs(60)).unwrap();
        assert_eq!(issuer().verify(&other.issue()), Err(CsrfError::InvalidSignature));
    }

    #[test]
    fn test_expired_rejected() {
        let issuer = issuer();
        let token = issuer.issue_at(1_000);
        assert_eq!(issuer.verify_at(&token, 1_060), Ok(()));
        assert_eq!(issuer.verify_at(&token, 1_061), Err(CsrfError::Expired));
    }

    #[test]
    fn test_future_timestamp_rejected() {
        let issuer = issuer();
        let token = issuer.issue_at(2_000);
        assert_eq!(issuer.verify_at(&token, 1_000), Err(CsrfError::Expired));
    }

    #[test]
    fn test_tampered_timestamp_rejected() {
        let issuer = issuer();
        let token = issuer.issue_at(1_000);
        let raw = String::from_utf8(BASE64.decode(&token).unwrap()).unwrap();
        let tampered = BASE64.encode(raw.replacen("1000", "1001", 1));
        assert_eq!(issuer.verify_at(&tampered, 1_001), Err(CsrfError::InvalidSignature));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let issuer = issuer();
        assert_eq!(issuer.verify("%%%"), Err(CsrfError::Malformed));
        assert_eq!(issuer.verify(&BASE64.encode("only:two")), Err(CsrfError::Malformed));
        assert_eq!(issuer.verify(&BASE64.encode("abc:n:sig")), Err(CsrfError::Malformed));
    }
}
