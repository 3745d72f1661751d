//! Tabletop - Unified CLI
//!
//! Tooling around the channel session registry.

#![warn(missing_docs)]

mod cli;
mod rehearsal;

use anyhow::{Result, bail};
use clap::Parser;
use cli::{Cli, Command};
use std::path::PathBuf;
use tabletop_sessions::TabletopConfig;
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Command::CheckConfig { path } => check_config(path),
        Command::Stress {
            channels,
            players,
            config,
        } => run_stress(channels, players, config).await,
    }
}

/// Installs the tracing subscriber, preferring `RUST_LOG` over the config.
fn init_tracing(config: &TabletopConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_filter())),
        )
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<TabletopConfig> {
    match path {
        Some(path) => Ok(TabletopConfig::from_file(path)?),
        None => Ok(TabletopConfig::default()),
    }
}

/// Validate a config file and print what it resolves to
fn check_config(path: PathBuf) -> Result<()> {
    let config = TabletopConfig::from_file(&path)?;
    init_tracing(&config);
    info!(path = %path.display(), "Config is valid");
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

/// Run the concurrent lifecycle rehearsal
#[instrument(skip(config))]
async fn run_stress(channels: usize, players: usize, config: Option<PathBuf>) -> Result<()> {
    let config = load_config(config)?;
    init_tracing(&config);

    info!(channels, players, "Starting rehearsal");
    let report = rehearsal::run(config, channels, players).await?;
    println!("{report}");

    if report.lost_joins > 0 || report.double_starts > 0 || report.failed_starts > 0 {
        bail!("rehearsal found lifecycle anomalies: {report}");
    }
    Ok(())
}
