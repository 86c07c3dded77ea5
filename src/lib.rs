//! Recon Gateway Library
//!
//! Turns a Solana wallet address into a structured intelligence report by
//! orchestrating independent, latency-bound upstream calls:
//!
//! - **Chain fetch**: signatures + parsed transactions over JSON-RPC
//! - **Quick metrics**: fees, flow, volume, counterparties, active days
//! - **Wallet graph**: likely funders, funded wallets, linked wallets, programs
//! - **Social enrichment**: optional X mention search over discovered addresses
//! - **Narrative**: optional LLM analysis of the assembled research context
//!
//! Results are consumed either as one blocking response or as an incremental
//! SSE progress stream; both modes share a single execution plan in
//! [`pipeline::Orchestrator`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod adapter;
pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod server;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Lamports per SOL.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
