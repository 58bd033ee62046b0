//! Auth cookie extraction.

use tollgate_auth::AUTH_COOKIE_NAME;
use tollgate_telemetry::metrics::record_auth_rejection;

use crate::context::GatewayContext;
use crate::error::GatewayError;
use crate::pipeline::{Stage, Step, StepOutcome};
use crate::types::GatewayRequest;

/// Reads `auth_token` into the context. A request without it is answered 401.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractCookie;

impl Step for ExtractCookie {
    fn stage(&self) -> Stage {
        Stage::ExtractCookie
    }

    fn apply(&self, ctx: &mut GatewayContext, request: GatewayRequest) -> StepOutcome {
        let Some(token) = ctx.cookies().get(AUTH_COOKIE_NAME).map(str::to_owned) else {
            record_auth_rejection("missing_cookie");
            return StepOutcome::Reject(GatewayError::MissingToken);
        };
        ctx.set_token(token);
        StepOutcome::Continue(request)
    }
}
