//! Language cookie resolution.

use std::sync::Arc;

use tollgate_auth::{LanguageCookie, SupportedLanguages, DEFAULT_LANGUAGE, LANGUAGE_COOKIE_NAME};
use tollgate_telemetry::metrics::record_auth_rejection;

use crate::context::GatewayContext;
use crate::pipeline::{Stage, Step, StepOutcome};
use crate::types::GatewayRequest;

/// Resolves the client's language.
///
/// No `lang` cookie: use the default and queue a default-language cookie.
/// Unsupported value: 400.
pub struct ResolveLanguage {
    languages: Arc<SupportedLanguages>,
}

impl ResolveLanguage {
    /// Create the step.
    pub fn new(languages: Arc<SupportedLanguages>) -> Self {
        Self { languages }
    }
}

impl Step for ResolveLanguage {
    fn stage(&self) -> Stage {
        Stage::ResolveLanguage
    }

    fn apply(&self, ctx: &mut GatewayContext, request: GatewayRequest) -> StepOutcome {
        let resolved = match ctx.cookies().get(LANGUAGE_COOKIE_NAME) {
            None => {
                ctx.add_cookie(LanguageCookie::default_language().to_set_cookie());
                DEFAULT_LANGUAGE.to_string()
            }
            Some(code) => match self.languages.resolve(code) {
                Ok(code) => code.to_string(),
                Err(e) => {
                    record_auth_rejection("unsupported_language");
                    return StepOutcome::Reject(e.into());
                }
            },
        };
        ctx.set_language(resolved);
        StepOutcome::Continue(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::steps::test_support::request_with_cookie;

    fn step() -> ResolveLanguage {
        ResolveLanguage::new(Arc::new(SupportedLanguages::new(["de", "fr"])))
    }

    #[test]
    fn test_supported_language() {
        let (mut ctx, request) = request_with_cookie("auth_token=t; lang=fr");
        assert!(matches!(step().apply(&mut ctx, request), StepOutcome::Continue(_)));
        assert_eq!(ctx.language(), Some("fr"));
        assert!(ctx.pending_cookies().is_empty());
    }

    #[test]
    fn test_missing_cookie_defaults_and_sets_cookie() {
        let (mut ctx, request) = request_with_cookie("auth_token=t");
        assert!(matches!(step().apply(&mut ctx, request), StepOutcome::Continue(_)));
        assert_eq!(ctx.language(), Some("en"));

        let cookies = ctx.pending_cookies();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].name(), "lang");
        assert_eq!(cookies[0].value(), "en");
    }

    #[test]
    fn test_unsupported_language() {
        let (mut ctx, request) = request_with_cookie("auth_token=t; lang=tlh");
        assert!(matches!(
            step().apply(&mut ctx, request),
            StepOutcome::Reject(GatewayError::UnsupportedLanguage(_))
        ));
        assert_eq!(ctx.language(), None);
    }
}
