//! lanbeacon - announce and find services on the local network.
//!
//! This is the main entry point for the lanbeacon CLI.

mod commands;
mod payload;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use lanbeacon_discover::DiscoveryConfig;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

#[derive(Parser)]
#[command(name = "lanbeacon")]
#[command(author, version, about = "UDP broadcast service discovery for the local network", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer discovery probes until interrupted
    Advertise {
        /// Name to announce (defaults to the hostname)
        #[arg(short, long)]
        name: Option<String>,
        /// Port of the service being announced
        #[arg(short, long, default_value = "0")]
        service_port: u16,
        /// Discovery port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Broadcast probes and list the servers that answer
    Probe {
        /// How long to collect responses
        #[arg(short, long, default_value = "3")]
        timeout_secs: u64,
        /// Milliseconds between probe broadcasts
        #[arg(short, long)]
        interval_ms: Option<u64>,
        /// Discovery port advertisers listen on
        #[arg(short, long)]
        port: Option<u16>,
        /// Only ask servers whose name contains this text
        #[arg(short, long)]
        filter: Option<String>,
        /// Print output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the handshake identifier
    Handshake {
        /// Application id to derive the handshake from
        #[arg(long)]
        app_id: Option<String>,
        /// Application version to derive the handshake from
        #[arg(long, requires = "app_id")]
        app_version: Option<String>,
    },
    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, sources) = DiscoveryConfig::load(cli.config.as_deref())
        .await
        .context("Failed to load configuration")?;

    commands::init_logging(cli.verbose, config.log_level.as_deref());
    debug!(sources = ?sources, "Configuration loaded");

    match cli.command {
        Commands::Advertise {
            name,
            service_port,
            port,
        } => commands::run_advertise(&config, name, service_port, port).await,
        Commands::Probe {
            timeout_secs,
            interval_ms,
            port,
            filter,
            json,
        } => {
            let options = commands::ProbeOptions {
                window: Duration::from_secs(timeout_secs),
                interval: interval_ms
                    .map(Duration::from_millis)
                    .unwrap_or_else(|| config.broadcast_interval()),
                port: port.unwrap_or_else(|| config.port()),
                filter,
            };
            commands::run_probe(&config, options, json).await
        }
        Commands::Handshake {
            app_id,
            app_version,
        } => commands::run_handshake(&config, app_id, app_version),
        Commands::Config => commands::show_config(&config, &sources),
    }
}
