//! Gateway configuration types.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// A secret value that never shows up in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw secret.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// `true` if no secret was configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Secret(<empty>)")
        } else {
            f.write_str("Secret(<redacted>)")
        }
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Complete gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener settings.
    pub server: ServerSettings,
    /// Auth cookie signing.
    pub auth: AuthSettings,
    /// Anti-forgery tokens.
    pub csrf: CsrfSettings,
    /// Language preference handling.
    pub languages: LanguageSettings,
    /// Backend connection settings.
    pub upstream: UpstreamSettings,
    /// Static prefix to backend table.
    pub routes: Vec<RouteEntry>,
    /// Logging and metrics.
    pub telemetry: TelemetrySettings,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            auth: AuthSettings::default(),
            csrf: CsrfSettings::default(),
            languages: LanguageSettings::default(),
            upstream: UpstreamSettings::default(),
            routes: vec![
                RouteEntry::new("/api/users", "user_service:8081"),
                RouteEntry::new("/api/stocks", "stock_service:8082"),
                RouteEntry::new("/api/news", "news_service:8083"),
            ],
            telemetry: TelemetrySettings::default(),
        }
    }
}

impl GatewayConfig {
    /// Development preset: pretty logs at debug level.
    pub fn development() -> Self {
        let mut config = Self::default();
        config.telemetry.log_level = "debug".to_string();
        config.telemetry.log_format = LogFormat::Pretty;
        config
    }

    /// Socket address string the listener binds to.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.listen_addr, self.server.listen_port)
    }

    /// Check the configuration for values the gateway cannot start with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.auth.jwt_key.is_empty() {
            return Err(ConfigError::MissingSecret {
                field: "auth.jwt_key",
            });
        }

        if self.csrf.key.is_empty() {
            return Err(ConfigError::MissingSecret { field: "csrf.key" });
        }

        if self.csrf.token_ttl.is_zero() {
            return Err(ConfigError::invalid_value(
                "csrf.token_ttl",
                "must be greater than zero",
            ));
        }

        if self.server.listen_addr.trim().is_empty() {
            return Err(ConfigError::invalid_value("server.listen_addr", "must not be empty"));
        }

        if self.server.origin_host.trim().is_empty() {
            return Err(ConfigError::invalid_value("server.origin_host", "must not be empty"));
        }

        if self.upstream.timeout.is_zero() {
            return Err(ConfigError::invalid_value(
                "upstream.timeout",
                "must be greater than zero",
            ));
        }

        let mut seen = HashSet::new();
        for (i, route) in self.routes.iter().enumerate() {
            if !route.prefix.starts_with('/') {
                return Err(ConfigError::invalid_route(
                    i,
                    &route.prefix,
                    "prefix must start with '/'",
                ));
            }
            if route.backend.trim().is_empty() || route.backend.contains("://") {
                return Err(ConfigError::invalid_route(
                    i,
                    &route.prefix,
                    "backend must be a host[:port] without scheme",
                ));
            }
            if !seen.insert(route.normalized_prefix()) {
                return Err(ConfigError::invalid_route(i, &route.prefix, "duplicate prefix"));
            }
        }

        Ok(())
    }
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address to bind to.
    pub listen_addr: String,
    /// Port to listen on.
    pub listen_port: u16,
    /// Host the gateway is reachable at, sent to backends as `X-Origin-Host`.
    pub origin_host: String,
    /// Maximum buffered request body size in bytes.
    pub max_request_body_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 9000,
            origin_host: "localhost:9000".to_string(),
            max_request_body_size: 10 * 1024 * 1024,
        }
    }
}

/// Auth cookie signing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// HS256 signing secret.
    pub jwt_key: Secret,
}

/// Anti-forgery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CsrfSettings {
    /// HMAC secret for anti-forgery tokens.
    pub key: Secret,
    /// Reject unsafe requests without a valid token.
    pub enforce: bool,
    /// Token lifetime.
    #[serde(with = "crate::duration")]
    pub token_ttl: Duration,
}

impl Default for CsrfSettings {
    fn default() -> Self {
        Self {
            key: Secret::default(),
            enforce: true,
            token_ttl: Duration::from_secs(12 * 60 * 60),
        }
    }
}

/// Language settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageSettings {
    /// Accepted language codes. `en` is always accepted.
    pub supported: Vec<String>,
}

impl Default for LanguageSettings {
    fn default() -> Self {
        Self {
            supported: vec!["en".to_string()],
        }
    }
}

/// Backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamSettings {
    /// Per-request timeout, covering connect and response headers.
    #[serde(with = "crate::duration")]
    pub timeout: Duration,
    /// Idle connections kept per backend host.
    pub pool_max_idle_per_host: usize,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            pool_max_idle_per_host: 100,
        }
    }
}

/// One row of the route table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    /// Path prefix, e.g. `/api/users`.
    pub prefix: String,
    /// Backend `host[:port]`.
    pub backend: String,
}

impl RouteEntry {
    /// Create a route entry.
    pub fn new(prefix: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            backend: backend.into(),
        }
    }

    /// Prefix without trailing slashes.
    pub fn normalized_prefix(&self) -> &str {
        let trimmed = self.prefix.trim_end_matches('/');
        if trimmed.is_empty() {
            "/"
        } else {
            trimmed
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

/// Logging and metrics settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Service name attached to logs.
    pub service_name: String,
    /// Default log filter, overridden by `RUST_LOG`.
    pub log_level: String,
    /// Log output format.
    pub log_format: LogFormat,
    /// Install the Prometheus recorder.
    pub metrics_enabled: bool,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            service_name: "tollgate".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            metrics_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.auth.jwt_key = Secret::new("jwt");
        config.csrf.key = Secret::new("csrf");
        config
    }

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.server.listen_port, 9000);
        assert_eq!(config.listen_address(), "0.0.0.0:9000");
        assert_eq!(config.routes.len(), 3);
        assert_eq!(config.languages.supported, vec!["en"]);
        assert!(config.csrf.enforce);
    }

    #[test]
    fn test_default_requires_secrets() {
        let err = GatewayConfig::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingSecret { field: "auth.jwt_key" }));

        let mut config = valid();
        config.csrf.key = Secret::default();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingSecret { field: "csrf.key" }));
    }

    #[test]
    fn test_valid_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_route_prefix_must_be_absolute() {
        let mut config = valid();
        config.routes.push(RouteEntry::new("api/x", "x:1"));
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::InvalidRoute { index: 3, .. }
        ));
    }

    #[test]
    fn test_route_backend_has_no_scheme() {
        let mut config = valid();
        config.routes = vec![RouteEntry::new("/api/x", "http://x:1")];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_prefixes_rejected() {
        let mut config = valid();
        config.routes = vec![
            RouteEntry::new("/api/x", "a:1"),
            RouteEntry::new("/api/x/", "b:1"),
        ];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate prefix"));
    }

    #[test]
    fn test_normalized_prefix() {
        assert_eq!(RouteEntry::new("/api/", "a").normalized_prefix(), "/api");
        assert_eq!(RouteEntry::new("/", "a").normalized_prefix(), "/");
    }

    #[test]
    fn test_secret_debug_redacted() {
        let debug = format!("{:?}", valid().auth);
        assert!(!debug.contains("jwt\""));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_log_format_serde() {
        assert_eq!(
            serde_json::from_str::<LogFormat>(r#""pretty""#).unwrap(),
            LogFormat::Pretty
        );
    }

    #[test]
    fn test_toml_config() {
        let toml = r#"
routes = [
    { prefix = "/api/orders", backend = "orders:8090" },
]

[server]
listen_port = 9100
origin_host = "gateway.internal"

[auth]
jwt_key = "signing"

[csrf]
key = "forgery"
token_ttl = "1h"

[languages]
supported = ["en", "de"]

[upstream]
timeout = "5s"
"#;
        let config: GatewayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.listen_port, 9100);
        assert_eq!(config.server.listen_addr, "0.0.0.0");
        assert_eq!(config.auth.jwt_key.expose(), "signing");
        assert_eq!(config.csrf.token_ttl, Duration::from_secs(3600));
        assert_eq!(config.upstream.timeout, Duration::from_secs(5));
        assert_eq!(config.routes, vec![RouteEntry::new("/api/orders", "orders:8090")]);
        assert!(config.validate().is_ok());
    }
}
