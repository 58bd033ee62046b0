//! Language preference cookie.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::cookie::SetCookie;

/// Language used when the client has not chosen one.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Name of the language cookie.
pub const LANGUAGE_COOKIE_NAME: &str = "lang";

/// Lifetime of the language cookie.
pub const LANGUAGE_COOKIE_LIFETIME: Duration = Duration::days(30);

/// A language code that is not in the supported set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported language '{0}'")]
pub struct UnsupportedLanguage(pub String);

/// The fixed set of language codes the gateway accepts.
///
/// [`DEFAULT_LANGUAGE`] is always a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedLanguages {
    codes: BTreeSet<String>,
}

impl SupportedLanguages {
    /// Build the set from codes. Blank entries are ignored.
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set: BTreeSet<String> = codes
            .into_iter()
            .map(|c| c.as_ref().trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        set.insert(DEFAULT_LANGUAGE.to_string());
        Self { codes: set }
    }

    /// `true` if `code` is supported.
    pub fn is_supported(&self, code: &str) -> bool {
        self.codes.contains(code)
    }

    /// Check a client-supplied code.
    pub fn resolve<'a>(&self, code: &'a str) -> Result<&'a str, UnsupportedLanguage> {
        if self.is_supported(code) {
            Ok(code)
        } else {
            Err(UnsupportedLanguage(code.to_string()))
        }
    }

    /// `code` if supported, else [`DEFAULT_LANGUAGE`].
    pub fn or_default<'a>(&self, code: &'a str) -> &'a str {
        if self.is_supported(code) {
            code
        } else {
            DEFAULT_LANGUAGE
        }
    }

    /// Iterate over the codes in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }

    /// Number of supported codes.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Always `false`, the default language is always present.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl Default for SupportedLanguages {
    fn default() -> Self {
        Self::new([DEFAULT_LANGUAGE])
    }
}

/// The `lang` cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageCookie {
    code: String,
}

impl LanguageCookie {
    /// Cookie for a code the caller has already checked.
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }

    /// Cookie for `requested`, falling back to the default language if unsupported.
    pub fn for_language(languages: &SupportedLanguages, requested: &str) -> Self {
        Self::new(languages.or_default(requested))
    }

    /// Cookie for the default language.
    pub fn default_language() -> Self {
        Self::new(DEFAULT_LANGUAGE)
    }

    /// Language code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Wire form expiring 30 days after `now`.
    pub fn to_set_cookie_at(&self, now: DateTime<Utc>) -> SetCookie {
        SetCookie::new(
            LANGUAGE_COOKIE_NAME,
            self.code.clone(),
            "/",
            now + LANGUAGE_COOKIE_LIFETIME,
        )
    }

    /// Wire form expiring 30 days from now.
    pub fn to_set_cookie(&self) -> SetCookie {
        self.to_set_cookie_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_always_present() {
        let languages = SupportedLanguages::new(["de", "fr"]);
        assert!(languages.is_supported("en"));
        assert!(languages.is_supported("de"));
        assert_eq!(languages.len(), 3);

        let empty = SupportedLanguages::new(Vec::<String>::new());
        assert!(empty.is_supported("en"));
        assert!(!empty.is_empty());
    }

    #[test]
    fn test_blank_codes_ignored() {
        let languages = SupportedLanguages::new(["", " de ", "  "]);
        assert_eq!(languages.iter().collect::<Vec<_>>(), vec!["de", "en"]);
    }

    #[test]
    fn test_resolve() {
        let languages = SupportedLanguages::new(["de"]);
        assert_eq!(languages.resolve("de"), Ok("de"));
        assert_eq!(
            languages.resolve("xx"),
            Err(UnsupportedLanguage("xx".to_string()))
        );
    }

    #[test]
    fn test_cookie_falls_back_to_default() {
        let languages = SupportedLanguages::new(["de"]);
        assert_eq!(LanguageCookie::for_language(&languages, "de").code(), "de");
        assert_eq!(LanguageCookie::for_language(&languages, "jp").code(), "en");
    }

    #[test]
    fn test_cookie_wire_form() {
        let now = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let cookie = LanguageCookie::default_language().to_set_cookie_at(now);

        assert_eq!(
            cookie.to_header_value(),
            "lang=en; Path=/; Expires=Thu, 31 Jan 2030 00:00:00 GMT; SameSite=Strict"
        );
    }
}
