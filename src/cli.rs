//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Solana wallet intelligence pipeline service
#[derive(Parser, Debug)]
#[command(name = "recon-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "RECON_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "RECON_PORT")]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "RECON_HOST")]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RECON_LOG_LEVEL", global = true)]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "RECON_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Disable the narrative stage (metrics-only reports)
    #[arg(long)]
    pub no_narrative: bool,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server (default)
    Serve,

    /// Run the pipeline once for a wallet and print the report as JSON
    Report {
        /// Target Solana wallet address
        #[arg(required = true)]
        wallet: String,

        /// Override the signature fetch limit
        #[arg(short, long)]
        max_signatures: Option<u32>,
    },
}
