//! HS256 token codec.
//!
//! Tokens are compact JWTs carrying two registered claims:
//!
//! | Claim | Meaning |
//! |-------|---------|
//! | `sub` | subject id, decimal string |
//! | `exp` | expiry, unix seconds |
//!
//! The codec only checks integrity and shape. Expiry and subject policy
//! belong to [`CookieManager`](crate::CookieManager).

use std::fmt;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult, TokenError};

/// Verified contents of an auth token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthClaims {
    /// Subject (user) id.
    pub subject_id: i64,
    /// Expiry instant, whole-second resolution.
    pub expires_at: DateTime<Utc>,
}

impl AuthClaims {
    /// Create claims for a subject.
    pub fn new(subject_id: i64, expires_at: DateTime<Utc>) -> Self {
        Self {
            subject_id,
            expires_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    sub: String,
    exp: i64,
}

/// Signs and verifies auth tokens with one shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    /// Create a codec from a signing secret.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::EmptySecret`] if `secret` is empty.
    pub fn new(secret: impl AsRef<[u8]>) -> AuthResult<Self> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(AuthError::EmptySecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        })
    }

    /// Sign claims into a token.
    ///
    /// Sub-second precision of `expires_at` is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Encoding`] if the claims cannot be serialized
    /// or signed.
    pub fn sign(&self, subject_id: i64, expires_at: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = WireClaims {
            sub: subject_id.to_string(),
            exp: expires_at.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verify a token and extract its claims.
    ///
    /// An expired token still parses.
    ///
    /// # Errors
    ///
    /// - [`TokenError::InvalidSignature`] if the signature or algorithm does not match
    /// - [`TokenError::Malformed`] if the token cannot be decoded into claims
    pub fn parse(&self, token: &str) -> Result<AuthClaims, TokenError> {
        let data = decode::<WireClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenError::InvalidSignature
                }
                _ => TokenError::Malformed(e.to_string()),
            },
        )?;

        let subject_id = data
            .claims
            .sub
            .parse::<i64>()
            .map_err(|e| TokenError::Malformed(format!("subject: {e}")))?;
        let expires_at = DateTime::from_timestamp(data.claims.exp, 0)
            .ok_or_else(|| TokenError::Malformed("expiry out of range".to_string()))?;

        Ok(AuthClaims::new(subject_id, expires_at))
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &Algorithm::HS256)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn codec() -> TokenCodec {
        TokenCodec::new("test-secret").unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert_eq!(TokenCodec::new("").unwrap_err(), AuthError::EmptySecret);
    }

    #[test]
    fn test_sign_then_parse() {
        let codec = codec();
        let expires = at(1_900_000_000);
        let token = codec.sign(42, expires).unwrap();

        let claims = codec.parse(&token).unwrap();
        assert_eq!(claims, AuthClaims::new(42, expires));
    }

    #[test]
    fn test_sign_is_deterministic() {
        let codec = codec();
        let expires = at(1_900_000_000);
        assert_eq!(codec.sign(7, expires).unwrap(), codec.sign(7, expires).unwrap());
    }

    #[test]
    fn test_subsecond_precision_dropped() {
        let codec = codec();
        let expires = at(1_900_000_000) + Duration::milliseconds(750);
        let token = codec.sign(1, expires).unwrap();
        assert_eq!(codec.parse(&token).unwrap().expires_at, at(1_900_000_000));
    }

    #[test]
    fn test_expired_token_still_parses() {
        let codec = codec();
        let token = codec.sign(3, at(0)).unwrap();
        assert_eq!(codec.parse(&token).unwrap().expires_at, at(0));
    }

    #[test]
    fn test_subject_zero_still_parses() {
        let codec = codec();
        let token = codec.sign(0, at(1_900_000_000)).unwrap();
        assert_eq!(codec.parse(&token).unwrap().subject_id, 0);
    }

    #[test]
    fn test_foreign_secret_is_invalid_signature() {
        let other = TokenCodec::new("other-secret").unwrap();
        let token = other.sign(1, at(1_900_000_000)).unwrap();
        assert_eq!(codec().parse(&token).unwrap_err(), TokenError::InvalidSignature);
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let codec = codec();
        let token = codec.sign(1, at(1_900_000_000)).unwrap();
        let forged = codec.sign(2, at(1_900_000_000)).unwrap();

        let mut parts: Vec<&str> = token.split('.').collect();
        let forged_payload = forged.split('.').nth(1).unwrap();
        parts[1] = forged_payload;
        let tampered = parts.join(".");

        assert_eq!(codec.parse(&tampered).unwrap_err(), TokenError::InvalidSignature);
    }

    #[test]
    fn test_garbage_is_malformed() {
        let err = codec().parse("not-a-token").unwrap_err();
        assert!(matches!(err, TokenError::Malformed(_)));

        let err = codec().parse("").unwrap_err();
        assert!(matches!(err, TokenError::Malformed(_)));
    }

    #[test]
    fn test_non_numeric_subject_is_malformed() {
        #[derive(Serialize)]
        struct Odd {
            sub: &'static str,
            exp: i64,
        }
        let token = encode(
            &Header::new(Algorithm::HS256),
            &Odd {
                sub: "alice",
                exp: 1_900_000_000,
            },
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(matches!(codec().parse(&token).unwrap_err(), TokenError::Malformed(_)));
    }

    #[test]
    fn test_debug_hides_secret() {
        let debug = format!("{:?}", codec());
        assert!(!debug.contains("test-secret"));
    }
}
