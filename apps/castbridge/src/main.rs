//! Castbridge - exposes a Chromecast receiver as an MPRIS media player.
//!
//! The daemon finds a receiver on the local network, joins whatever session
//! is playing on it and mirrors that session on the D-Bus session bus, so
//! desktop media keys and applets control the receiver.

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use castbridge_core::bootstrap_services;
use clap::Parser;
use tokio::signal;

use crate::config::AppConfig;

/// Castbridge - Chromecast receiver to MPRIS bridge.
#[derive(Parser, Debug)]
#[command(name = "castbridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "CASTBRIDGE_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Fixed receiver address `ip[:port]`, skipping mDNS discovery.
    #[arg(short, long, env = "CASTBRIDGE_RECEIVER")]
    receiver: Option<String>,

    /// Player name, exported as `org.mpris.MediaPlayer2.<name>`.
    #[arg(short = 'n', long)]
    player_name: Option<String>,

    /// Receiver request timeout in milliseconds.
    #[arg(long)]
    connect_timeout_ms: Option<u64>,

    /// Status poll interval in milliseconds.
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Retry interval in milliseconds.
    #[arg(long)]
    retry_interval_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Castbridge v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config =
        AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(receiver) = args.receiver {
        config.receiver = Some(receiver);
    }
    if let Some(name) = args.player_name {
        config.player_name = name;
    }
    if let Some(ms) = args.connect_timeout_ms {
        config.connect_timeout_ms = ms;
    }
    if let Some(ms) = args.poll_interval_ms {
        config.poll_interval_ms = ms;
    }
    if let Some(ms) = args.retry_interval_ms {
        config.retry_interval_ms = ms;
    }

    let receiver = config
        .receiver_address()
        .context("Invalid receiver address")?;
    log::info!(
        "Configuration: player_name={}, receiver={}, connect_timeout={}ms, poll_interval={}ms, retry_interval={}ms",
        config.player_name,
        config.receiver.as_deref().unwrap_or("mdns"),
        config.connect_timeout_ms,
        config.poll_interval_ms,
        config.retry_interval_ms
    );

    let core_config = config.to_core_config();
    let services = bootstrap_services(&core_config, receiver)
        .await
        .context("Failed to bootstrap services")?;

    log::info!("Services bootstrapped successfully");

    // Wait for shutdown signal
    shutdown_signal().await?;

    log::info!("Shutdown signal received, cleaning up...");

    services.shutdown().await;

    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?;
        tokio::select! {
            result = signal::ctrl_c() => result.context("Failed to listen for Ctrl+C")?,
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    Ok(())
}
