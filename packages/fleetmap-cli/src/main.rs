//! fleetmap CLI - poll a device fleet and report its topology and anomalies
//!
//! This binary can:
//! - Collect from every configured device once and print an inventory
//! - Write the inventory as a JSON report
//! - Run as a background daemon that refreshes the report periodically

mod daemon;
mod report;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use fleetmap_core::config::{self, LoadedConfig};
use fleetmap_core::session::{DeviceConnector, ReplayConnector};
use fleetmap_core::Inventory;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "fleetmap")]
#[command(version)]
#[command(about = "Poll a fleet of RouterOS devices and report topology and configuration anomalies")]
#[command(long_about = "
fleetmap polls every configured device, builds a typed inventory, infers
which devices are linked and flags configurations that look wrong.

Quick start:
  1. Write a config:    fleetmap config > ~/.config/fleetmap/config.toml
  2. Run once:          fleetmap collect
  3. Keep a report:     fleetmap daemon --output inventory.json
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Configuration file (overrides FLEETMAP_CONFIG and the default location)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Collect from every device once and print the inventory
    #[command(alias = "run")]
    Collect {
        /// Also write the JSON report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Collect periodically until interrupted
    Daemon {
        /// Collection interval in minutes
        #[arg(short, long, default_value = "15")]
        interval: u64,

        /// Overwrite this JSON report after every run
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show configuration paths and an example config
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("fleetmap={},fleetmap_core={}", log_level, log_level).into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Collect { output } => cmd_collect(&cli, output.as_deref()).await,
        Commands::Daemon { interval, output } => {
            let loaded = config::load_config(cli.config.as_deref())?;
            daemon::run_daemon(loaded, *interval, output.clone()).await
        }
        Commands::Config => cmd_config(&cli),
    }
}

/// Build the connector the configuration asks for.
pub fn connector_for(loaded: &LoadedConfig) -> Result<Arc<dyn DeviceConnector>> {
    match loaded.replay_dir() {
        Some(dir) => {
            if !dir.is_dir() {
                bail!("replay directory {} does not exist", dir.display());
            }
            let connector = ReplayConnector::new(dir);
            tracing::debug!("Replaying device captures from {}", connector.dir().display());
            Ok(Arc::new(connector))
        }
        None => bail!(
            "no device source configured; set [source] replay_dir in {}",
            loaded.path.display()
        ),
    }
}

/// Load, collect, analyze.
pub async fn collect_once(loaded: &LoadedConfig) -> Result<Inventory> {
    let connector = connector_for(loaded)?;
    fleetmap_core::run(connector, &loaded.config).await
}

async fn cmd_collect(cli: &Cli, output: Option<&Path>) -> Result<()> {
    let loaded = config::load_config(cli.config.as_deref())?;
    let inventory = collect_once(&loaded).await?;

    if let Some(path) = output {
        report::write_report(path, &inventory)?;
    }

    match cli.format {
        OutputFormat::Text => {
            report::print_summary(&inventory);
            if let Some(path) = output {
                println!();
                println!("Report written to {}", path.display());
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&inventory)?);
        }
    }

    Ok(())
}

fn cmd_config(cli: &Cli) -> Result<()> {
    let default_path = config::get_config_file_path_string();
    let resolved = config::resolve_config_path(cli.config.as_deref());

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration");
            println!("=============");
            println!();
            println!("Default config file: {}", default_path);
            match &resolved {
                Some((path, source)) => {
                    println!("Active config file:  {} (from {})", path.display(), source)
                }
                None => println!("Active config file:  none found"),
            }
            println!();
            println!("Environment variables:");
            println!("  {} - Override config file path", config::ENV_CONFIG_PATH);
            println!("  RUST_LOG - Override log filter");
            println!();
            println!("Example config.toml:");
            println!();
            println!("{}", config::generate_example_config());
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "default_config_file": default_path,
                    "config_file": resolved.as_ref().map(|(p, _)| p.display().to_string()),
                    "config_source": resolved.as_ref().map(|(_, s)| s.to_string()),
                    "example": config::generate_example_config(),
                })
            );
        }
    }

    Ok(())
}
