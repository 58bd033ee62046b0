//! Auth cookie verification.

use std::sync::Arc;

use tracing::debug;

use tollgate_auth::Authenticator;
use tollgate_telemetry::metrics::record_auth_rejection;

use crate::context::GatewayContext;
use crate::error::GatewayError;
use crate::pipeline::{Stage, Step, StepOutcome};
use crate::types::GatewayRequest;

/// Verifies the extracted token and stores its claims.
///
/// Any verification failure (bad signature, malformed token, past expiry,
/// subject below 1) is a client error and answers 400.
pub struct ValidateToken {
    authenticator: Arc<dyn Authenticator>,
}

impl ValidateToken {
    /// Create the step.
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self { authenticator }
    }
}

impl Step for ValidateToken {
    fn stage(&self) -> Stage {
        Stage::ValidateToken
    }

    fn apply(&self, ctx: &mut GatewayContext, request: GatewayRequest) -> StepOutcome {
        let Some(token) = ctx.token() else {
            return StepOutcome::Reject(GatewayError::MissingToken);
        };

        match self.authenticator.validate_auth_cookie(token) {
            Ok(claims) => {
                ctx.set_claims(claims);
                StepOutcome::Continue(request)
            }
            Err(e) => {
                debug!(request_id = ctx.request_id(), error = %e, "auth cookie rejected");
                record_auth_rejection(e.reason());
                StepOutcome::Reject(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use http::StatusCode;
    use tollgate_auth::CookieManager;

    use crate::steps::test_support::request_with_cookie;

    fn step(manager: &Arc<CookieManager>) -> ValidateToken {
        ValidateToken::new(manager.clone())
    }

    fn run(step: &ValidateToken, token: &str) -> (GatewayContext, StepOutcome) {
        let (mut ctx, request) = request_with_cookie(&format!("auth_token={token}"));
        ctx.set_token(token);
        let outcome = step.apply(&mut ctx, request);
        (ctx, outcome)
    }

    #[test]
    fn test_valid_token() {
        let manager = Arc::new(CookieManager::from_secret("k").unwrap());
        let cookie = manager
            .create_auth_cookie(99, Utc::now() + Duration::minutes(1))
            .unwrap();

        let (ctx, outcome) = run(&step(&manager), cookie.token());
        assert!(matches!(outcome, StepOutcome::Continue(_)));
        assert_eq!(ctx.subject_id(), Some(99));
    }

    #[test]
    fn test_foreign_key_rejected() {
        let ours = Arc::new(CookieManager::from_secret("ours").unwrap());
        let theirs = CookieManager::from_secret("theirs").unwrap();
        let cookie = theirs
            .create_auth_cookie(1, Utc::now() + Duration::minutes(1))
            .unwrap();

        let (ctx, outcome) = run(&step(&ours), cookie.token());
        let StepOutcome::Reject(err) = outcome else {
            panic!("forged token accepted");
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ctx.subject_id(), None);
    }

    #[test]
    fn test_garbage_rejected() {
        let manager = Arc::new(CookieManager::from_secret("k").unwrap());
        let (_, outcome) = run(&step(&manager), "not-a-token");
        let StepOutcome::Reject(err) = outcome else {
            panic!("garbage accepted");
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_no_token_in_context() {
        let manager = Arc::new(CookieManager::from_secret("k").unwrap());
        let (mut ctx, request) = request_with_cookie("lang=en");
        assert!(matches!(
            step(&manager).apply(&mut ctx, request),
            StepOutcome::Reject(GatewayError::MissingToken)
        ));
    }
}
