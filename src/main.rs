//! Bookgate server
//!
//! Serves the book access-request workflow over HTTP or stdio.

use bookgate::{
    config::{LogFormat, TransportMode, load_config},
    gateway::AccessGateway,
    session::{IdValidator, create_session_provider},
    transport::{AppState, HttpConfig, run_http_blocking, run_stdio},
};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Bookgate - request, approve and track access to restricted books
#[derive(Parser, Debug)]
#[command(name = "bookgate")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "BOOKGATE_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error); overrides logging.level
    #[arg(long, env = "BOOKGATE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Transport mode (stdio, http)
    #[arg(long, env = "BOOKGATE_TRANSPORT")]
    transport: Option<String>,

    /// HTTP server host (for http transport)
    #[arg(long, env = "BOOKGATE_HTTP_HOST")]
    http_host: Option<String>,

    /// HTTP server port (for http transport)
    #[arg(long, env = "BOOKGATE_HTTP_PORT")]
    http_port: Option<u16>,

    /// Fail if the HTTP port is taken instead of picking a nearby one
    #[arg(long)]
    strict_port: bool,
}

fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Logging depends on the configuration, so load it first
    let mut config = load_config(args.config.as_deref())?;

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    init_logging(&level, config.logging.format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting bookgate"
    );

    if let Some(host) = args.http_host {
        config.server.host = host;
    }
    if let Some(port) = args.http_port {
        config.server.port = port;
    }

    let gateway = Arc::new(
        AccessGateway::from_config(&config)
            .inspect_err(|e| error!(error = %e, "Failed to build access gateway"))?,
    );

    let transport = args
        .transport
        .as_deref()
        .map(|t| match t {
            "stdio" => TransportMode::Stdio,
            "http" => TransportMode::Http,
            _ => config.server.transport,
        })
        .unwrap_or(config.server.transport);

    match transport {
        TransportMode::Stdio => {
            let ids = IdValidator::new(&config.session.id_pattern)?;
            let session = create_session_provider(&config.session, &ids)
                .inspect_err(|e| error!(error = %e, "Failed to resolve session identity"))?;
            run_stdio(gateway, session).await?;
        }
        TransportMode::Http => {
            let mut http_config = HttpConfig::from_server_config(&config.server)?;
            http_config.strict_port = args.strict_port;

            let state = AppState::new(
                gateway,
                config.session.clone(),
                (&config.server).into(),
            );
            run_http_blocking(state, http_config).await?;
        }
    }

    Ok(())
}
