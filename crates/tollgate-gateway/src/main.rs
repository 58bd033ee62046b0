//! Tollgate gateway entry point.

use std::path::PathBuf;

use anyhow::Context;
use tracing::info;

use tollgate_config::{ConfigLoader, GatewayConfig, LogFormat};
use tollgate_gateway::GatewayServer;
use tollgate_telemetry::{init_logging, init_metrics, LogConfig, MetricsConfig};

/// Default config file, used when present and no `--config` is given.
const DEFAULT_CONFIG_PATH: &str = "tollgate.toml";

/// Command-line arguments.
struct Args {
    /// Path to configuration file.
    config: Option<PathBuf>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    config = args.next().map(PathBuf::from);
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("tollgate {}", tollgate_gateway::VERSION);
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
        }

        Self { config }
    }
}

fn print_help() {
    println!(
        r"Tollgate - cookie-authenticated edge gateway

USAGE:
    tollgate [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file (TOML or JSON)
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT VARIABLES:
    TOLLGATE_JWT_KEY               Auth cookie signing key (required)
    TOLLGATE_CSRF_KEY              Anti-forgery token key (required)
    TOLLGATE_CSRF_ENFORCE          Require X-CSRF-Token on unsafe methods (default: true)
    TOLLGATE_SUPPORTED_LANGUAGES   Comma-separated language codes (default: en)
    TOLLGATE_LISTEN_ADDR           Listen address (default: 0.0.0.0)
    TOLLGATE_LISTEN_PORT           Listen port (default: 9000)
    TOLLGATE_ORIGIN_HOST           Host sent to backends as X-Origin-Host
    TOLLGATE_UPSTREAM_TIMEOUT      Backend timeout, e.g. 30s (default: 30s)
    TOLLGATE_ROUTES                Routes as /prefix=host:port,...
    TOLLGATE_LOG_LEVEL             Log filter (default: info; RUST_LOG wins)
    TOLLGATE_LOG_FORMAT            json or pretty (default: json)
    TOLLGATE_METRICS_ENABLED       Serve /_tollgate/metrics (default: true)

A .env file in the working directory is loaded before the environment is read.

EXAMPLES:
    tollgate --config /etc/tollgate/gateway.toml
    TOLLGATE_JWT_KEY=secret TOLLGATE_CSRF_KEY=other tollgate
"
    );
}

fn load_config(args: &Args) -> anyhow::Result<GatewayConfig> {
    let loader = match &args.config {
        Some(path) => ConfigLoader::new()
            .with_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => ConfigLoader::new().with_optional_file(DEFAULT_CONFIG_PATH)?,
    };

    loader
        .with_dotenv()
        .with_env_prefix("TOLLGATE")
        .load()
        .context("invalid configuration")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let telemetry = &config.telemetry;
    let log_config = match telemetry.log_format {
        LogFormat::Json => LogConfig::json(&telemetry.log_level),
        LogFormat::Pretty => LogConfig::pretty(&telemetry.log_level),
    };
    init_logging(&log_config).context("failed to initialize logging")?;
    init_metrics(&MetricsConfig {
        enabled: telemetry.metrics_enabled,
        ..MetricsConfig::default()
    })
    .context("failed to initialize metrics")?;

    info!(
        version = tollgate_gateway::VERSION,
        listen = %config.listen_address(),
        origin_host = %config.server.origin_host,
        "starting tollgate"
    );
    for route in &config.routes {
        info!(prefix = %route.prefix, backend = %route.backend, "route");
    }

    GatewayServer::new(config)?.run().await?;
    Ok(())
}
