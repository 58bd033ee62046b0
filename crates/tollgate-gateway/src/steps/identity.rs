//! Identity headers for backends.

use http::HeaderValue;

use crate::context::GatewayContext;
use crate::error::GatewayError;
use crate::headers::{HEADER_LANG, HEADER_UID};
use crate::pipeline::{Stage, Step, StepOutcome};
use crate::types::GatewayRequest;

/// Sets `UID` and `Lang` from the verified claims and resolved language.
///
/// Values sent by the client under the same names are replaced.
#[derive(Debug, Clone, Copy, Default)]
pub struct InjectIdentityHeaders;

impl Step for InjectIdentityHeaders {
    fn stage(&self) -> Stage {
        Stage::InjectIdentityHeaders
    }

    fn apply(&self, ctx: &mut GatewayContext, mut request: GatewayRequest) -> StepOutcome {
        let (Some(subject_id), Some(language)) = (ctx.subject_id(), ctx.language()) else {
            return StepOutcome::Reject(GatewayError::internal(
                "identity headers requested before authentication",
            ));
        };

        let lang = match HeaderValue::from_str(language) {
            Ok(value) => value,
            Err(_) => return StepOutcome::Reject(GatewayError::bad_request("invalid language")),
        };

        let headers = request.headers_mut();
        headers.insert(HEADER_UID.clone(), HeaderValue::from(subject_id));
        headers.insert(HEADER_LANG.clone(), lang);
        StepOutcome::Continue(request)
    }
}
