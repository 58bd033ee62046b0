//! Layered configuration loader.

use std::env;
use std::fs;
use std::path::Path;

use crate::config::{GatewayConfig, LogFormat, RouteEntry, Secret};
use crate::duration;
use crate::error::{ConfigError, ConfigResult};

/// Builds a [`GatewayConfig`] from defaults, a file and the environment.
///
/// Environment variables are flat, `PREFIX_KEY`:
///
/// | Variable | Field |
/// |----------|-------|
/// | `TOLLGATE_JWT_KEY` | `auth.jwt_key` |
/// | `TOLLGATE_CSRF_KEY` | `csrf.key` |
/// | `TOLLGATE_CSRF_ENFORCE` | `csrf.enforce` |
/// | `TOLLGATE_CSRF_TOKEN_TTL` | `csrf.token_ttl` |
/// | `TOLLGATE_SUPPORTED_LANGUAGES` | `languages.supported` (comma separated) |
/// | `TOLLGATE_LISTEN_ADDR` | `server.listen_addr` |
/// | `TOLLGATE_LISTEN_PORT` | `server.listen_port` |
/// | `TOLLGATE_ORIGIN_HOST` | `server.origin_host` |
/// | `TOLLGATE_UPSTREAM_TIMEOUT` | `upstream.timeout` |
/// | `TOLLGATE_ROUTES` | `routes` (`/prefix=host:port,...`) |
/// | `TOLLGATE_LOG_LEVEL` | `telemetry.log_level` |
/// | `TOLLGATE_LOG_FORMAT` | `telemetry.log_format` |
/// | `TOLLGATE_METRICS_ENABLED` | `telemetry.metrics_enabled` |
#[derive(Debug)]
pub struct ConfigLoader {
    config: GatewayConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a loader starting from defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: GatewayConfig::default(),
            env_prefix: None,
        }
    }

    /// Start from the development preset.
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = GatewayConfig::development();
        self
    }

    /// Load a TOML or JSON file, chosen by extension.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> ConfigResult<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        self.config = Self::parse(&content, &extension)?;

        Ok(self)
    }

    /// Load a file if it exists.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> ConfigResult<Self> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in the given format (`toml` or `json`).
    pub fn with_string(mut self, content: &str, format: &str) -> ConfigResult<Self> {
        self.config = Self::parse(content, &format.to_lowercase())?;
        Ok(self)
    }

    /// Read overrides from process environment variables starting with `prefix_`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load a `.env` file into the process environment if one exists.
    #[must_use]
    pub fn with_dotenv(self) -> Self {
        let _ = dotenvy::dotenv();
        self
    }

    /// Apply overrides from explicit `(name, value)` pairs.
    pub fn with_env_vars<I, K, V>(mut self, prefix: &str, vars: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let prefix = format!("{}_", prefix.to_uppercase());
        for (key, value) in vars {
            let key = key.as_ref();
            if let Some(name) = key.strip_prefix(&prefix) {
                self.apply_env_var(key, name, value.as_ref())?;
            }
        }
        Ok(self)
    }

    /// Apply environment overrides and validate.
    pub fn load(mut self) -> ConfigResult<GatewayConfig> {
        if let Some(prefix) = self.env_prefix.take() {
            self = self.with_env_vars(&prefix, env::vars())?;
        }

        self.config.validate()?;
        Ok(self.config)
    }

    /// Finish without validation.
    #[must_use]
    pub fn load_unvalidated(self) -> GatewayConfig {
        self.config
    }

    fn parse(content: &str, format: &str) -> ConfigResult<GatewayConfig> {
        match format {
            "toml" => Ok(toml::from_str(content)?),
            "json" => Ok(serde_json::from_str(content)?),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }

    fn apply_env_var(&mut self, var: &str, name: &str, value: &str) -> ConfigResult<()> {
        let config = &mut self.config;
        match name {
            "JWT_KEY" => config.auth.jwt_key = Secret::new(value),
            "CSRF_KEY" => config.csrf.key = Secret::new(value),
            "CSRF_ENFORCE" => {
                config.csrf.enforce = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_var(var, "expected boolean"))?;
            }
            "CSRF_TOKEN_TTL" => {
                config.csrf.token_ttl =
                    duration::parse(value).map_err(|e| ConfigError::env_var(var, e))?;
            }
            "SUPPORTED_LANGUAGES" => {
                config.languages.supported = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect();
            }
            "LISTEN_ADDR" => config.server.listen_addr = value.to_string(),
            "LISTEN_PORT" => {
                config.server.listen_port = value
                    .parse()
                    .map_err(|_| ConfigError::env_var(var, "expected port number"))?;
            }
            "ORIGIN_HOST" => config.server.origin_host = value.to_string(),
            "UPSTREAM_TIMEOUT" => {
                config.upstream.timeout =
                    duration::parse(value).map_err(|e| ConfigError::env_var(var, e))?;
            }
            "ROUTES" => config.routes = parse_routes(var, value)?,
            "LOG_LEVEL" => config.telemetry.log_level = value.to_string(),
            "LOG_FORMAT" => {
                config.telemetry.log_format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_var(
                            var,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            "METRICS_ENABLED" => {
                config.telemetry.metrics_enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_var(var, "expected boolean"))?;
            }
            _ => {}
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_routes(var: &str, value: &str) -> ConfigResult<Vec<RouteEntry>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(prefix, backend)| RouteEntry::new(prefix.trim(), backend.trim()))
                .ok_or_else(|| {
                    ConfigError::env_var(var, format!("expected prefix=host, got '{entry}'"))
                })
        })
        .collect()
}
