//! Fixed-order auth pipeline.
//!
//! Every request to a protected route runs the same stages in the same
//! order. The first stage that answers ends the request.
//!
//! ```text
//! ExtractCookie ─► ValidateToken ─► RefreshCheck ─► ResolveLanguage ─► InjectIdentityHeaders ─► Forward
//!      │ 401            │ 400             │ 500             │ 400
//!      ▼                ▼                 ▼                 ▼
//!   response         response          response          response
//! ```
//!
//! Steps are synchronous and need no server to test. Only `Forward`, the
//! handler passed to [`AuthPipeline::process`], suspends.

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use tollgate_auth::{Authenticator, SupportedLanguages};

use crate::context::GatewayContext;
use crate::error::GatewayError;
use crate::steps::{ExtractCookie, InjectIdentityHeaders, RefreshCheck, ResolveLanguage, ValidateToken};
use crate::types::{GatewayRequest, GatewayResponse};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Stage {
    /// Read the `auth_token` cookie.
    ExtractCookie = 1,
    /// Verify the token and its claims.
    ValidateToken = 2,
    /// Re-issue a cookie close to expiry.
    RefreshCheck = 3,
    /// Resolve the `lang` cookie.
    ResolveLanguage = 4,
    /// Set `UID` and `Lang` for the backend.
    InjectIdentityHeaders = 5,
    /// Hand off to the backend or a local handler.
    Forward = 6,
}

impl Stage {
    /// Stage name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ExtractCookie => "extract_cookie",
            Self::ValidateToken => "validate_token",
            Self::RefreshCheck => "refresh_check",
            Self::ResolveLanguage => "resolve_language",
            Self::InjectIdentityHeaders => "inject_identity_headers",
            Self::Forward => "forward",
        }
    }

    /// All stages in order.
    #[must_use]
    pub const fn all() -> [Stage; 6] {
        [
            Self::ExtractCookie,
            Self::ValidateToken,
            Self::RefreshCheck,
            Self::ResolveLanguage,
            Self::InjectIdentityHeaders,
            Self::Forward,
        ]
    }
}

/// What a step decided.
#[derive(Debug)]
pub enum StepOutcome {
    /// Pass the (possibly modified) request to the next stage.
    Continue(GatewayRequest),
    /// End the request with this error.
    Reject(GatewayError),
}

/// One synchronous pipeline stage.
pub trait Step: Send + Sync {
    /// The stage this step implements.
    fn stage(&self) -> Stage;

    /// Run the step.
    fn apply(&self, ctx: &mut GatewayContext, request: GatewayRequest) -> StepOutcome;
}

/// The auth pipeline.
pub struct AuthPipeline {
    steps: Vec<Box<dyn Step>>,
}

impl AuthPipeline {
    /// Build the standard pipeline.
    pub fn new(authenticator: Arc<dyn Authenticator>, languages: Arc<SupportedLanguages>) -> Self {
        Self {
            steps: vec![
                Box::new(ExtractCookie),
                Box::new(ValidateToken::new(authenticator.clone())),
                Box::new(RefreshCheck::new(authenticator)),
                Box::new(ResolveLanguage::new(languages)),
                Box::new(InjectIdentityHeaders),
            ],
        }
    }

    /// Run every pre-forward stage.
    pub fn run_steps(&self, ctx: &mut GatewayContext, mut request: GatewayRequest) -> StepOutcome {
        for step in &self.steps {
            match step.apply(ctx, request) {
                StepOutcome::Continue(next) => request = next,
                StepOutcome::Reject(err) => {
                    debug!(stage = step.stage().name(), error = %err, "pipeline stopped");
                    return StepOutcome::Reject(err);
                }
            }
        }
        StepOutcome::Continue(request)
    }

    /// Run the pipeline and then `forward`.
    ///
    /// The returned response is not yet finished; call
    /// [`GatewayContext::finish`] to attach queued cookies.
    pub async fn process<F, Fut>(
        &self,
        ctx: &mut GatewayContext,
        request: GatewayRequest,
        forward: F,
    ) -> Result<GatewayResponse, GatewayError>
    where
        F: FnOnce(&GatewayContext, GatewayRequest) -> Fut,
        Fut: Future<Output = Result<GatewayResponse, GatewayError>>,
    {
        match self.run_steps(ctx, request) {
            StepOutcome::Continue(request) => forward(ctx, request).await,
            StepOutcome::Reject(err) => Err(err),
        }
    }

    /// Stage order of this pipeline, ending with [`Stage::Forward`].
    pub fn stages(&self) -> Vec<Stage> {
        self.steps
            .iter()
            .map(|s| s.stage())
            .chain(std::iter::once(Stage::Forward))
            .collect()
    }
}

impl std::fmt::Debug for AuthPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthPipeline")
            .field("stages", &self.stages())
            .finish()
    }
}
