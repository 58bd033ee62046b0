//! Request and response types shared across the gateway.

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, StatusCode};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};

/// Boxed error used by streaming bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Response body: either a buffered local body or a streamed backend body.
pub type GatewayBody = UnsyncBoxBody<Bytes, BoxError>;

/// Request as seen by the pipeline, with its body already buffered.
pub type GatewayRequest = http::Request<Bytes>;

/// Response produced by the gateway.
pub type GatewayResponse = http::Response<GatewayBody>;

/// Body from a buffered value.
pub fn full(bytes: impl Into<Bytes>) -> GatewayBody {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Empty body.
pub fn empty() -> GatewayBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Response with the given status and no body.
pub fn status_response(status: StatusCode) -> GatewayResponse {
    let mut response = http::Response::new(empty());
    *response.status_mut() = status;
    response
}

/// JSON response. Serialization failure yields an empty object.
pub fn json_response<T: serde::Serialize>(status: StatusCode, body: &T) -> GatewayResponse {
    let json = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());

    let mut response = http::Response::new(full(json));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Plain text response.
pub fn text_response(status: StatusCode, body: impl Into<Bytes>) -> GatewayResponse {
    let mut response = http::Response::new(full(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
