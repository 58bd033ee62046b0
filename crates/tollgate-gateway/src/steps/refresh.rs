//! Sliding refresh of near-expiry cookies.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error};

use tollgate_auth::{Authenticator, CookieManager};
use tollgate_telemetry::metrics::record_token_refresh;

use crate::context::GatewayContext;
use crate::error::GatewayError;
use crate::pipeline::{Stage, Step, StepOutcome};
use crate::types::GatewayRequest;

/// Cookies with less than this much lifetime left are re-issued.
pub const REFRESH_THRESHOLD: Duration = Duration::seconds(30);

/// Queues a fresh cookie for the same subject when the presented one is
/// about to expire. The request continues with the original claims.
pub struct RefreshCheck {
    authenticator: Arc<dyn Authenticator>,
}

impl RefreshCheck {
    /// Create the step.
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self { authenticator }
    }

    /// `true` when less than [`REFRESH_THRESHOLD`] is left at `now`.
    pub fn needs_refresh(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        expires_at - now < REFRESH_THRESHOLD
    }
}

impl Step for RefreshCheck {
    fn stage(&self) -> Stage {
        Stage::RefreshCheck
    }

    fn apply(&self, ctx: &mut GatewayContext, request: GatewayRequest) -> StepOutcome {
        let Some(claims) = ctx.claims().copied() else {
            return StepOutcome::Continue(request);
        };

        if !Self::needs_refresh(claims.expires_at, Utc::now()) {
            return StepOutcome::Continue(request);
        }

        match self
            .authenticator
            .create_auth_cookie(claims.subject_id, CookieManager::default_expiry())
        {
            Ok(cookie) => {
                debug!(
                    subject_id = claims.subject_id,
                    expires_at = %cookie.expires_at(),
                    "refreshed auth cookie"
                );
                record_token_refresh();
                ctx.add_cookie(cookie.to_set_cookie());
                StepOutcome::Continue(request)
            }
            Err(e) => {
                error!(subject_id = claims.subject_id, error = %e, "auth cookie refresh failed");
                StepOutcome::Reject(GatewayError::internal(format!("refresh failed: {e}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use http::StatusCode;
    use tollgate_auth::{AuthClaims, AuthCookie, AuthResult, PolicyError};

    use crate::steps::test_support::request_with_cookie;

    fn run(authenticator: Arc<dyn Authenticator>, remaining: Duration) -> (GatewayContext, StepOutcome) {
        let (mut ctx, request) = request_with_cookie("auth_token=t");
        ctx.set_claims(AuthClaims::new(3, Utc::now() + remaining));
        let outcome = RefreshCheck::new(authenticator).apply(&mut ctx, request);
        (ctx, outcome)
    }

    #[test]
    fn test_fresh_cookie_untouched() {
        let manager = Arc::new(CookieManager::from_secret("k").unwrap());
        let (ctx, outcome) = run(manager, Duration::seconds(90));
        assert!(matches!(outcome, StepOutcome::Continue(_)));
        assert!(ctx.pending_cookies().is_empty());
    }

    #[test]
    fn test_near_expiry_cookie_reissued() {
        let manager = Arc::new(CookieManager::from_secret("k").unwrap());
        let (ctx, outcome) = run(manager.clone(), Duration::seconds(5));
        assert!(matches!(outcome, StepOutcome::Continue(_)));

        let cookies = ctx.pending_cookies();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].name(), "auth_token");

        let claims = manager.validate_auth_cookie(cookies[0].value()).unwrap();
        assert_eq!(claims.subject_id, 3);
        assert!(claims.expires_at - Utc::now() > Duration::seconds(100));
        // Request identity is unchanged.
        assert_eq!(ctx.subject_id(), Some(3));
    }

    #[test]
    fn test_threshold_boundary() {
        let now = Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap();
        assert!(RefreshCheck::needs_refresh(now + Duration::seconds(29), now));
        assert!(!RefreshCheck::needs_refresh(now + Duration::seconds(30), now));
        assert!(!RefreshCheck::needs_refresh(now + Duration::seconds(31), now));
    }

    #[test]
    fn test_cookie_with_29_seconds_left_reissued() {
        let manager = Arc::new(CookieManager::from_secret("k").unwrap());
        let (ctx, outcome) = run(manager, Duration::seconds(29));
        assert!(matches!(outcome, StepOutcome::Continue(_)));
        assert_eq!(ctx.pending_cookies().len(), 1);
    }

    struct BrokenMint;

    impl Authenticator for BrokenMint {
        fn create_auth_cookie(&self, _: i64, expires_at: DateTime<Utc>) -> AuthResult<AuthCookie> {
            Err(PolicyError::ExpiredWindow { expires_at }.into())
        }

        fn validate_auth_cookie(&self, _: &str) -> AuthResult<AuthClaims> {
            unreachable!()
        }

        fn subject_id(&self, _: &str) -> AuthResult<i64> {
            unreachable!()
        }

        fn expires_at(&self, _: &str) -> AuthResult<DateTime<Utc>> {
            unreachable!()
        }
    }

    #[test]
    fn test_mint_failure_is_internal_error() {
        let (ctx, outcome) = run(Arc::new(BrokenMint), Duration::seconds(5));
        let StepOutcome::Reject(err) = outcome else {
            panic!("refresh failure ignored");
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(ctx.pending_cookies().is_empty());
    }
}
