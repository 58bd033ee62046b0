//! # Tollgate Config
//!
//! Typed configuration for the Tollgate gateway.
//!
//! Configuration is resolved in layers, later layers winning:
//!
//! 1. Built-in defaults ([`GatewayConfig::default`])
//! 2. A TOML or JSON file
//! 3. `TOLLGATE_*` environment variables (optionally read from `.env`)
//!
//! The result is validated once and then shared read-only for the life of
//! the process.
//!
//! ```no_run
//! use tollgate_config::ConfigLoader;
//!
//! # fn main() -> Result<(), tollgate_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_optional_file("tollgate.toml")?
//!     .with_dotenv()
//!     .with_env_prefix("TOLLGATE")
//!     .load()?;
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/tollgate-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
pub mod duration;
mod error;
mod loader;

pub use config::{
    AuthSettings, CsrfSettings, GatewayConfig, LanguageSettings, LogFormat, RouteEntry, Secret,
    ServerSettings, TelemetrySettings, UpstreamSettings,
};
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
