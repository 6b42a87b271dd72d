//! Lotkeeper server - HTTP/WebSocket server for parking lot lifecycle
//! coordination.

use anyhow::Result;
use clap::Parser;
use lotkeeper_server::{config::Config, logging, state::AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use logging::{LogConfig, LogFormat};

/// Lotkeeper server - parking slot, session and booking coordinator.
#[derive(Parser, Debug)]
#[command(name = "lotkeeper-server")]
#[command(about = "HTTP/WebSocket server for parking lot lifecycle coordination")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override port from config
    #[arg(short, long)]
    port: Option<u16>,

    /// Override database path from config
    #[arg(long, value_name = "FILE")]
    db_path: Option<PathBuf>,

    /// Enable verbose logging (INFO level for most targets)
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging (DEBUG level, excludes ping traces)
    #[arg(short, long)]
    debug: bool,

    /// Enable trace logging (TRACE level for everything)
    #[arg(long)]
    trace: bool,

    /// Quiet mode (WARN and ERROR only)
    #[arg(short, long)]
    quiet: bool,

    /// Set log level for specific targets (e.g., "coordinator=debug" or "ws::ping=trace")
    /// Can be specified multiple times. Targets are prefixed with "lotkeeper::" automatically.
    #[arg(long = "log", value_name = "TARGET=LEVEL")]
    log_overrides: Vec<String>,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_cli(
        cli.verbose,
        cli.debug,
        cli.trace,
        cli.quiet,
        cli.log_overrides,
        cli.log_format,
    );
    logging::init(&log_config);

    // Load configuration, then apply CLI overrides
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(db_path) = cli.db_path {
        config.db_path = db_path;
    }

    tracing::info!(
        target: "lotkeeper::startup",
        "Loaded configuration (port: {}, slots: {})",
        config.port,
        config.slot_ids.len()
    );

    // Opening the state rehydrates slot flags from surviving records.
    let state = Arc::new(AppState::new(config.clone())?);
    tracing::info!(target: "lotkeeper::startup", "Initialized application state");

    let app = lotkeeper_server::app(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!(target: "lotkeeper::startup", "Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
