//! Pipeline steps.
//!
//! Steps run in this fixed order:
//!
//! 1. [`extract_cookie`] - read the `auth_token` cookie
//! 2. [`validate_token`] - verify signature, expiry and subject
//! 3. [`refresh`] - re-issue a cookie that is about to expire
//! 4. [`language`] - resolve the `lang` cookie
//! 5. [`identity`] - set `UID` and `Lang` for the backend

pub mod extract_cookie;
pub mod identity;
pub mod language;
pub mod refresh;
pub mod validate_token;

pub use extract_cookie::ExtractCookie;
pub use identity::InjectIdentityHeaders;
pub use language::ResolveLanguage;
pub use refresh::{RefreshCheck, REFRESH_THRESHOLD};
pub use validate_token::ValidateToken;
