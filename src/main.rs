//! Recon Gateway - Solana wallet intelligence pipeline service.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use recon_gateway::{
    cli::{Cli, Command},
    config::Config,
    model::WalletRequest,
    server, setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup tracing
    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(mut config) => {
            // Apply CLI overrides
            if let Some(port) = cli.port {
                config.server.port = port;
            }
            if let Some(ref host) = cli.host {
                config.server.host = host.clone();
            }
            if cli.no_narrative {
                config.narrative.enabled = false;
            }
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Some(Command::Report {
            wallet,
            max_signatures,
        }) => run_report(&config, wallet, max_signatures).await,
        Some(Command::Serve) | None => run_server(&config).await,
    }
}

/// Run the HTTP server
async fn run_server(config: &Config) -> ExitCode {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        social = config.social.enabled,
        narrative = config.narrative.enabled,
        "Starting recon gateway"
    );

    if let Err(e) = server::serve(config).await {
        error!("Server error: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Run the pipeline once and print the report as JSON
async fn run_report(config: &Config, wallet: String, max_signatures: Option<u32>) -> ExitCode {
    let request = WalletRequest {
        wallet,
        max_signatures,
    };

    match server::run_once(config, request).await {
        Ok(report) => {
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Failed to serialize report: {e}");
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Report failed: {e}");
            ExitCode::FAILURE
        }
    }
}
