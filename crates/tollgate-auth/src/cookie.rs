//! `Cookie` request parsing and `Set-Cookie` response building.
//!
//! Every cookie the gateway sets is `SameSite=Strict` with an explicit path
//! and expiry; credential cookies add `Secure` and `HttpOnly`.
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use tollgate_auth::SetCookie;
//!
//! let expires = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
//! let cookie = SetCookie::new("lang", "de", "/", expires);
//!
//! assert_eq!(
//!     cookie.to_header_value(),
//!     "lang=de; Path=/; Expires=Tue, 01 Jan 2030 00:00:00 GMT; SameSite=Strict"
//! );
//! ```

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use http::header::{HeaderMap, COOKIE};

/// IMF-fixdate, the `Expires` attribute format.
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Format an instant as an HTTP date.
pub fn http_date(instant: DateTime<Utc>) -> String {
    instant.format(HTTP_DATE_FORMAT).to_string()
}

/// Cookies sent by the client.
///
/// Parsed from every `Cookie` header on the request. On duplicate names the
/// first occurrence wins.
#[derive(Debug, Clone, Default)]
pub struct Cookies {
    cookies: HashMap<String, String>,
}

impl Cookies {
    /// Create an empty cookie jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse all `Cookie` headers. Non UTF-8 headers are skipped.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut jar = Self::new();
        for value in headers.get_all(COOKIE) {
            if let Ok(value) = value.to_str() {
                jar.extend_from_header(value);
            }
        }
        jar
    }

    /// Parse a single `Cookie` header value.
    pub fn parse(header_value: &str) -> Self {
        let mut jar = Self::new();
        jar.extend_from_header(header_value);
        jar
    }

    fn extend_from_header(&mut self, header_value: &str) {
        for pair in header_value.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                let value = value.trim().trim_matches('"');
                self.cookies
                    .entry(name.to_string())
                    .or_insert_with(|| value.to_string());
            }
        }
    }

    /// Get a cookie value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Check if a cookie exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    /// Number of cookies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// `true` if the client sent no cookies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

/// A `Set-Cookie` header queued for the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    name: &'static str,
    value: String,
    path: &'static str,
    expires: DateTime<Utc>,
    credential: bool,
}

impl SetCookie {
    /// Cookie `name=value` scoped to `path`, expiring at `expires`.
    #[must_use]
    pub fn new(
        name: &'static str,
        value: impl Into<String>,
        path: &'static str,
        expires: DateTime<Utc>,
    ) -> Self {
        Self {
            name,
            value: value.into(),
            path,
            expires,
            credential: false,
        }
    }

    /// Mark as a credential: `Secure` and `HttpOnly`.
    #[must_use]
    pub fn credential(mut self) -> Self {
        self.credential = true;
        self
    }

    /// Cookie name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name
    }

    /// Cookie value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// `Path` attribute.
    #[must_use]
    pub fn path(&self) -> &str {
        self.path
    }

    /// `Expires` attribute.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires
    }

    /// `true` for `Secure; HttpOnly` cookies.
    #[must_use]
    pub fn is_credential(&self) -> bool {
        self.credential
    }

    /// Render as a `Set-Cookie` header value.
    #[must_use]
    pub fn to_header_value(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}; Path={}; Expires={}",
            self.name,
            self.value,
            self.path,
            http_date(self.expires)
        )?;
        if self.credential {
            f.write_str("; Secure; HttpOnly")?;
        }
        f.write_str("; SameSite=Strict")
    }
}
