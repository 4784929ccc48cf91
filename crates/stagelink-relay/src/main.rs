//! Stagelink Relay - Main entry point
//!
//! Coordinates controller and viewer clients over WebSocket and serves the
//! model catalog and uploads.

use anyhow::Result;
use clap::Parser;
use stagelink_relay::{config, server, state};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "stagelink-relay")]
#[command(about = "Camera/settings relay and model store for Stagelink viewers")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "stagelink.toml")]
    config: PathBuf,

    /// Bind address for the web server
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Stagelink relay v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = config::load_config(&args.config)?;

    // Override bind address if specified
    if let Some(bind) = args.bind {
        config.daemon.bind = bind;
    }

    info!(
        bind = %config.daemon.bind,
        models = %config.models.path,
        "Configuration loaded"
    );

    // Create application state
    let state = state::AppState::new(config.clone())?;

    server::run(state, &config.daemon.bind, config.daemon.tls.as_ref()).await?;

    Ok(())
}
