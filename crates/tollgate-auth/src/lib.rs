//! # Tollgate Auth
//!
//! Stateless session primitives for the Tollgate gateway.
//!
//! All session state lives in a client-held cookie. This crate signs and
//! verifies that cookie and enforces the expiry policy around it:
//!
//! - [`TokenCodec`] - HS256 signing and verification of [`AuthClaims`]
//! - [`CookieManager`] - creation/read policy, implements [`Authenticator`]
//! - [`SupportedLanguages`] and [`LanguageCookie`] - per-client language preference
//! - [`AntiForgery`] - HMAC anti-forgery tokens for mutating requests
//! - [`Cookies`] / [`SetCookie`] - `Cookie` and `Set-Cookie` wire formats
//!
//! ## Cookie lifecycle
//!
//! ```text
//! login ──► create_auth_cookie(uid, now+2m) ──► Set-Cookie: auth_token=...
//!                                                   │
//! request ──► validate_auth_cookie ──► exp - now < 30s ? ──► fresh cookie
//! ```

#![doc(html_root_url = "https://docs.rs/tollgate-auth/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod codec;
pub mod cookie;
mod csrf;
mod error;
mod language;
mod manager;

pub use codec::{AuthClaims, TokenCodec};
pub use cookie::{Cookies, SetCookie};
pub use csrf::{AntiForgery, CsrfError, DEFAULT_CSRF_TTL};
pub use error::{AuthError, AuthResult, PolicyError, TokenError};
pub use language::{
    LanguageCookie, SupportedLanguages, UnsupportedLanguage, DEFAULT_LANGUAGE, LANGUAGE_COOKIE_NAME,
};
pub use manager::{
    AuthCookie, Authenticator, CookieManager, AUTH_COOKIE_NAME, AUTH_COOKIE_PATH,
    DEFAULT_COOKIE_LIFETIME, MAX_COOKIE_WINDOW,
};
