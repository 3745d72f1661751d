//! Command-line interface for tabletop.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tabletop - session core for turn-based chat games
#[derive(Parser, Debug)]
#[command(name = "tabletop")]
#[command(about = "Session registry tooling for turn-based chat games", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load a config file and print the resolved settings
    CheckConfig {
        /// Path to the TOML config file
        path: PathBuf,
    },

    /// Drive many channels through a full session lifecycle concurrently
    Stress {
        /// Number of channels to run at once
        #[arg(long, default_value = "64")]
        channels: usize,

        /// Players joining each channel concurrently
        #[arg(long, default_value = "16")]
        players: usize,

        /// Optional TOML config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}
