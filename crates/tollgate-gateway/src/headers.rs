//! Header names and header filtering.

use http::header::{HeaderMap, HeaderName, HOST};
use http::Request;

/// Request id header, echoed on every response.
pub static HEADER_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Anti-forgery token header.
pub static HEADER_CSRF_TOKEN: HeaderName = HeaderName::from_static("x-csrf-token");

/// Authenticated subject id, set for backends.
pub static HEADER_UID: HeaderName = HeaderName::from_static("uid");

/// Resolved language, set for backends.
pub static HEADER_LANG: HeaderName = HeaderName::from_static("lang");

/// Host the client originally addressed.
pub static HEADER_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

/// Host the gateway is reachable at.
pub static HEADER_ORIGIN_HOST: HeaderName = HeaderName::from_static("x-origin-host");

/// Headers that only make sense on a single connection.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Headers never forwarded to a backend.
const FILTERED_HEADERS: &[&str] = &[
    // Credentials stay at the edge.
    "authorization",
    "cookie",
    // Rewritten by the director.
    "host",
    "x-forwarded-host",
    "x-origin-host",
    // Spoofable client addressing.
    "x-forwarded-for",
    "x-real-ip",
];

/// `true` for headers scoped to a single connection.
pub fn is_hop_by_hop_header(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

/// `true` for headers the director must not pass to a backend.
pub fn should_filter_header(name: &str) -> bool {
    is_hop_by_hop_header(name) || FILTERED_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Copy of `headers` without filtered or hop-by-hop entries.
pub fn filter_headers_for_upstream(headers: &HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !should_filter_header(name.as_str()) {
            filtered.append(name.clone(), value.clone());
        }
    }
    filtered
}

/// Remove hop-by-hop headers in place.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}

/// Host the client addressed: the `Host` header, else the URI authority.
pub fn original_host<B>(request: &Request<B>) -> Option<String> {
    request
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .or_else(|| request.uri().authority().map(|a| a.as_str().to_string()))
}
