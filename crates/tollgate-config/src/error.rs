//! Startup configuration failures.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the loader and validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Why the gateway refuses to start with the given configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested config file is absent.
    #[error("config file {path} does not exist")]
    FileNotFound {
        /// Requested path.
        path: PathBuf,
    },

    /// The config file exists but could not be read.
    #[error("could not read config file {path}")]
    Read {
        /// File path.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Malformed TOML document.
    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed JSON document.
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// Neither `toml` nor `json`.
    #[error("config format '{0}' is not toml or json")]
    UnsupportedFormat(String),

    /// A signing key was left empty.
    #[error("{field} must be set to a non-empty secret")]
    MissingSecret {
        /// Dotted path of the key, e.g. `auth.jwt_key`.
        field: &'static str,
    },

    /// A scalar setting is out of range.
    #[error("{field}: {reason}")]
    InvalidValue {
        /// Dotted path of the setting.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A `[[routes]]` entry cannot be served.
    #[error("route #{index} ({prefix}): {reason}")]
    InvalidRoute {
        /// Position in the route list.
        index: usize,
        /// Prefix as configured.
        prefix: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A `TOLLGATE_*` variable does not parse.
    #[error("environment variable {var}: {reason}")]
    EnvVar {
        /// Full variable name.
        var: String,
        /// Expected shape.
        reason: String,
    },
}

impl ConfigError {
    /// A setting with an unusable value.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// A route entry that fails validation.
    pub fn invalid_route(index: usize, prefix: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRoute {
            index,
            prefix: prefix.into(),
            reason: reason.into(),
        }
    }

    /// An environment override that does not parse.
    pub fn env_var(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EnvVar {
            var: var.into(),
            reason: reason.into(),
        }
    }
}
