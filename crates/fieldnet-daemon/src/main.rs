//! Fieldnet Daemon - Main entry point
//!
//! Runs rogue device discovery on the field subnet and provisions team
//! networks on the field switch.

mod config;
mod state;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fieldnet_core::{Roster, INFRASTRUCTURE_ADDRESSES};
use fieldnet_discovery::{IcmpProber, Scanner, Subnet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;
use crate::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "fieldnet")]
#[command(about = "Field network switch provisioning and rogue device discovery")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "fieldnet.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run discovery until interrupted (default)
    Run,
    /// Push a team roster to the configured switch
    Configure {
        /// Six comma-separated team numbers in station order (0 or - for empty)
        #[arg(short, long)]
        teams: Roster,
    },
    /// Run a single sweep and print the device table as JSON
    ScanOnce,
    /// Write a default configuration file
    InitConfig,
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
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Fieldnet v{}", env!("CARGO_PKG_VERSION"));

    match args.command.unwrap_or(Command::Run) {
        Command::InitConfig => {
            config::save_default_config(&args.config)
                .with_context(|| format!("writing {}", args.config.display()))?;
            info!(path = %args.config.display(), "Wrote default configuration");
        }
        Command::Run => {
            let state = AppState::new(load(&args.config)?);
            run(state).await?;
        }
        Command::Configure { teams } => {
            let state = AppState::new(load(&args.config)?);
            let status = state.configure_switch(&teams).await?;
            println!("Switch status: {}", status);
        }
        Command::ScanOnce => {
            let config = load(&args.config)?;
            let subnet: Subnet = config.discovery.subnet.parse()?;
            info!(subnet = %subnet, "Running single discovery sweep");

            let known = INFRASTRUCTURE_ADDRESSES
                .iter()
                .map(|ip| ip.to_string())
                .chain(config.discovery.known_devices.iter().cloned());
            let scanner = Scanner::new(
                subnet,
                config.discovery.interval(),
                Arc::new(IcmpProber::default()),
                known,
            );
            let found = scanner.sweep().await;

            info!(found = found, "Sweep complete");
            println!("{}", state::devices_json(scanner.devices().await)?);
        }
    }

    Ok(())
}

fn load(path: &Path) -> Result<Config> {
    let config = config::load_config(path)
        .with_context(|| format!("loading {}", path.display()))?;
    info!(
        subnet = %config.discovery.subnet,
        interval_secs = config.discovery.interval_secs,
        switch = config.switch.is_some(),
        "Configuration loaded"
    );
    Ok(config)
}

/// Sweep in the background and log a summary until Ctrl-C
async fn run(state: Arc<AppState>) -> Result<()> {
    state.start_discovery().await;

    let period = Duration::from_secs(state.config.daemon.summary_interval_secs.max(1));
    let mut summary = tokio::time::interval(period);
    // The first tick fires immediately; skip it so the first summary has data.
    summary.tick().await;

    loop {
        tokio::select! {
            _ = summary.tick() => state.log_summary().await,
            result = tokio::signal::ctrl_c() => {
                result.context("listening for shutdown signal")?;
                info!("Shutdown requested");
                break;
            }
        }
    }

    state.stop_discovery().await;
    state.log_summary().await;
    Ok(())
}
