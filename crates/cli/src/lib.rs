use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "lobx")]
#[command(about = "lobx - a single-instrument limit order book")]
#[command(version)]
pub struct Cli {
    /// Log output format (pretty, json, compact); overrides the config file
    #[arg(long, global = true, env = "LOBX_LOG_FORMAT")]
    pub log_format: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Start the interactive order entry loop
    Run {
        /// Path to the configuration file; built-in defaults when omitted
        #[arg(short, long, env = "LOBX_CONFIG")]
        config: Option<PathBuf>,

        /// Snapshot to load before the first command (overrides the config)
        #[arg(long)]
        load: Option<PathBuf>,
    },

    /// Validate configuration without starting the engine
    Validate {
        /// Path to the configuration file
        #[arg(short, long, default_value = "lobx.yaml")]
        config: PathBuf,
    },

    /// Write a new configuration file with all defaults
    Init {
        /// Output path for the new configuration file
        #[arg(short, long, default_value = "lobx.yaml")]
        output: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
