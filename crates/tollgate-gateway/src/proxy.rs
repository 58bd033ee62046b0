//! Reverse proxy to backend services.
//!
//! The director rewrites an authenticated request for its backend, the
//! response rewrite cleans up what comes back. Request bodies arrive here
//! already buffered; response bodies are streamed through.

use std::sync::Arc;
use std::time::Duration;

use futures_util::TryStreamExt;
use http::header::HeaderMap;
use http::{HeaderValue, Method, Uri};
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use reqwest::Client;
use tracing::{debug, warn};

use tollgate_auth::AntiForgery;
use tollgate_config::GatewayConfig;
use tollgate_telemetry::metrics::record_upstream_error;

use crate::error::{GatewayError, GatewayResult};
use crate::headers::{
    filter_headers_for_upstream, original_host, strip_hop_by_hop, HEADER_CSRF_TOKEN,
    HEADER_FORWARDED_HOST, HEADER_ORIGIN_HOST,
};
use crate::routes::{Route, RouteTable};
use crate::types::{BoxError, GatewayRequest, GatewayResponse};

/// Forwards requests to the backend owning their path prefix.
#[derive(Debug, Clone)]
pub struct ProxyRouter {
    client: Client,
    routes: Arc<RouteTable>,
    origin_host: String,
    timeout: Duration,
    anti_forgery: Arc<AntiForgery>,
}

impl ProxyRouter {
    /// Create a router from config.
    pub fn new(config: &GatewayConfig, anti_forgery: Arc<AntiForgery>) -> GatewayResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.upstream.timeout)
            .pool_max_idle_per_host(config.upstream.pool_max_idle_per_host)
            .no_proxy()
            .build()
            .map_err(|e| GatewayError::server(format!("failed to create upstream client: {e}")))?;

        Ok(Self {
            client,
            routes: Arc::new(RouteTable::from_entries(&config.routes)),
            origin_host: config.server.origin_host.clone(),
            timeout: config.upstream.timeout,
            anti_forgery,
        })
    }

    /// The routing table.
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Route owning `path`, if any.
    pub fn resolve(&self, path: &str) -> Option<&Route> {
        self.routes.resolve(path)
    }

    /// Upstream timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Rewrite `request` for `route`'s backend.
    ///
    /// The URI becomes `http://{backend}{path_and_query}`. Credentials,
    /// addressing and hop-by-hop headers are dropped; `X-Forwarded-Host`
    /// and `X-Origin-Host` are set.
    pub fn director(&self, request: GatewayRequest, route: &Route) -> GatewayResult<GatewayRequest> {
        let client_host = original_host(&request);
        let (mut parts, body) = request.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .map_or("/", |pq| pq.as_str());
        parts.uri = Uri::builder()
            .scheme("http")
            .authority(route.backend())
            .path_and_query(path_and_query)
            .build()?;

        let mut headers = filter_headers_for_upstream(&parts.headers);
        if let Some(host) = client_host.and_then(|h| HeaderValue::from_str(&h).ok()) {
            headers.insert(HEADER_FORWARDED_HOST.clone(), host);
        }
        if let Ok(origin) = HeaderValue::from_str(&self.origin_host) {
            headers.insert(HEADER_ORIGIN_HOST.clone(), origin);
        }
        parts.headers = headers;

        Ok(GatewayRequest::from_parts(parts, body))
    }

    /// Clean up a backend response in place.
    ///
    /// Hop-by-hop headers are dropped. Responses to POST get a fresh
    /// anti-forgery token.
    pub fn response_rewrite(&self, method: &Method, headers: &mut HeaderMap) {
        strip_hop_by_hop(headers);
        if method == Method::POST {
            match HeaderValue::from_str(&self.anti_forgery.issue()) {
                Ok(token) => {
                    headers.insert(HEADER_CSRF_TOKEN.clone(), token);
                }
                Err(e) => warn!(error = %e, "anti-forgery token is not a valid header value"),
            }
        }
    }

    /// Send `request` to `route`'s backend and stream back the response.
    ///
    /// The timeout covers connecting and receiving response headers.
    pub async fn forward(&self, request: GatewayRequest, route: &Route) -> GatewayResult<GatewayResponse> {
        let method = request.method().clone();
        let (parts, body) = self.director(request, route)?.into_parts();

        let send = self
            .client
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers)
            .body(body)
            .send();

        let upstream = match tokio::time::timeout(self.timeout, send).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if e.is_timeout() => return Err(self.timed_out(route)),
            Ok(Err(e)) => {
                record_upstream_error("unavailable");
                return Err(GatewayError::upstream(route.backend(), e.to_string()));
            }
            Err(_) => return Err(self.timed_out(route)),
        };

        debug!(
            backend = route.backend(),
            status = upstream.status().as_u16(),
            "upstream responded"
        );

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        self.response_rewrite(&method, &mut headers);

        let stream = upstream
            .bytes_stream()
            .map_ok(Frame::data)
            .map_err(|e| Box::new(e) as BoxError);

        let mut response = http::Response::new(StreamBody::new(stream).boxed_unsync());
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }

    fn timed_out(&self, route: &Route) -> GatewayError {
        record_upstream_error("timeout");
        GatewayError::UpstreamTimeout {
            backend: route.backend().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::header::{AUTHORIZATION, CONNECTION, COOKIE, HOST};
    use http::Request;
    use tollgate_auth::DEFAULT_CSRF_TTL;

    use crate::headers::HEADER_UID;

    fn router() -> ProxyRouter {
        let anti_forgery = Arc::new(AntiForgery::new("csrf-key", DEFAULT_CSRF_TTL).unwrap());
        let mut config = GatewayConfig::development();
        config.server.origin_host = "gateway.internal:9000".to_string();
        ProxyRouter::new(&config, anti_forgery).unwrap()
    }

    fn request() -> GatewayRequest {
        Request::builder()
            .method(Method::POST)
            .uri("/api/users/7/orders?limit=5")
            .header(HOST, "app.example.com")
            .header(COOKIE, "auth_token=secret")
            .header(AUTHORIZATION, "Bearer x")
            .header(CONNECTION, "keep-alive")
            .header(HEADER_FORWARDED_HOST.clone(), "spoofed.example.com")
            .header(HEADER_UID.clone(), "7")
            .body(Bytes::from_static(b"{}"))
            .unwrap()
    }

    #[test]
    fn test_director_rewrites_uri() {
        let router = router();
        let route = router.resolve("/api/users/7/orders").unwrap().clone();
        let directed = router.director(request(), &route).unwrap();

        assert_eq!(
            directed.uri().to_string(),
            "http://user_service:8081/api/users/7/orders?limit=5"
        );
        assert_eq!(directed.method(), Method::POST);
        assert_eq!(directed.body().as_ref(), b"{}");
    }

    #[test]
    fn test_director_headers() {
        let router = router();
        let route = router.resolve("/api/users").unwrap().clone();
        let directed = router.director(request(), &route).unwrap();
        let headers = directed.headers();

        assert!(!headers.contains_key(COOKIE));
        assert!(!headers.contains_key(AUTHORIZATION));
        assert!(!headers.contains_key(CONNECTION));
        assert!(!headers.contains_key(HOST));
        assert_eq!(headers[&HEADER_FORWARDED_HOST], "app.example.com");
        assert_eq!(headers[&HEADER_ORIGIN_HOST], "gateway.internal:9000");
        assert_eq!(headers[&HEADER_UID], "7");
    }

    #[test]
    fn test_response_rewrite_post_gets_token() {
        let router = router();
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("close"));
        router.response_rewrite(&Method::POST, &mut headers);

        assert!(!headers.contains_key(CONNECTION));
        let token = headers[&HEADER_CSRF_TOKEN].to_str().unwrap();
        assert!(router.anti_forgery.verify(token).is_ok());
    }

    #[test]
    fn test_response_rewrite_get_has_no_token() {
        let router = router();
        let mut headers = HeaderMap::new();
        router.response_rewrite(&Method::GET, &mut headers);
        assert!(!headers.contains_key(&HEADER_CSRF_TOKEN));
    }

    #[test]
    fn test_unknown_prefix() {
        assert!(router().resolve("/api/login").is_none());
    }
}
