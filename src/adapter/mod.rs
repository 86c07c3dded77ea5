//! Upstream adapter boundaries.
//!
//! Every external collaborator sits behind a trait with a fixed method
//! signature and a closed set of failure kinds, so the orchestrator can match
//! on failure kind without inspecting transport details. Concrete adapters
//! share pooled `reqwest` clients and are safe for concurrent use; none of
//! them hold request-specific state.

mod narrative;
mod shipper;
mod social;
mod solana;

pub use narrative::BedrockClient;
pub use shipper::DatadogShipper;
pub use social::XSearchClient;
pub use solana::SolanaRpcFetcher;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::{
    IntelligenceGraph, NarrativeAnalysis, QuickMetrics, SocialIntel, TraceEntry, TransactionRecord,
};

// ============================================================================
// Chain data fetcher
// ============================================================================

/// Chain fetch failures. Fatal to the pipeline.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The RPC endpoint rate limited the request
    #[error("Solana RPC rate limited (HTTP 429)")]
    RateLimited,
    /// The RPC endpoint could not be reached or returned a server error
    #[error("Solana RPC unreachable: {0}")]
    Unreachable(String),
    /// The endpoint rejected the address itself
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    /// The endpoint answered with something we could not interpret
    #[error("malformed RPC response: {0}")]
    Malformed(String),
}

impl FetchError {
    /// Whether retrying the whole request might succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Unreachable(_))
    }
}

/// Fetches and parses a wallet's recent transactions.
#[async_trait]
pub trait ChainFetcher: Send + Sync {
    /// Fetch up to `limit` recent transactions for `wallet`, newest first.
    async fn fetch(
        &self,
        wallet: &str,
        limit: u32,
    ) -> Result<Vec<TransactionRecord>, FetchError>;
}

// ============================================================================
// Social search
// ============================================================================

/// Social search failures. Non-fatal to the pipeline.
#[derive(Debug, Clone, Error)]
pub enum SocialError {
    /// Credentials were rejected
    #[error("Unauthorized")]
    Unauthorized,
    /// Credentials lack access to the search endpoint
    #[error("Forbidden")]
    Forbidden,
    /// The search endpoint rate limited the request
    #[error("RateLimited")]
    RateLimited,
    /// Transport-level failure
    #[error("transport error: {0}")]
    Transport(String),
    /// The endpoint answered with something we could not interpret
    #[error("malformed search response: {0}")]
    Malformed(String),
}

/// Searches recent social posts for mentions of the given terms.
#[async_trait]
pub trait SocialSearch: Send + Sync {
    /// Search for recent mentions of `terms` (the adapter may cap how many
    /// terms it uses), returning at most `max_results` posts.
    async fn search(&self, terms: &[String], max_results: u32)
    -> Result<SocialIntel, SocialError>;
}

// ============================================================================
// Narrative generation
// ============================================================================

/// Narrative generation failures. Non-fatal to the pipeline.
#[derive(Debug, Clone, Error)]
pub enum NarrativeError {
    /// Credentials were rejected
    #[error("Unauthorized")]
    Unauthorized,
    /// The model endpoint is unavailable
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
    /// Transport-level failure
    #[error("transport error: {0}")]
    Transport(String),
    /// The endpoint answered with something we could not interpret
    #[error("malformed model response: {0}")]
    Malformed(String),
}

/// Everything the narrative model is given about a wallet. Serialized as the
/// auditable context snapshot attached to the resulting analysis.
#[derive(Debug, Clone, Serialize)]
pub struct ResearchContext<'a> {
    /// Target wallet
    pub wallet: &'a str,
    /// Quick aggregate metrics
    pub metrics: &'a QuickMetrics,
    /// Relationship graph
    pub intelligence: &'a IntelligenceGraph,
    /// Social enrichment, when it ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social: Option<&'a SocialIntel>,
}

/// Generates prose analysis from a research context.
#[async_trait]
pub trait NarrativeModel: Send + Sync {
    /// Produce a narrative analysis of the wallet described by `context`.
    async fn analyze(
        &self,
        context: &ResearchContext<'_>,
    ) -> Result<NarrativeAnalysis, NarrativeError>;
}

// ============================================================================
// Trace shipping
// ============================================================================

/// Trace shipping failures. Never affect the report returned to the caller.
#[derive(Debug, Clone, Error)]
#[error("trace shipping failed: {0}")]
pub struct ShipError(pub String);

/// Finalized trace + report summary shipped out-of-band after a request.
#[derive(Debug, Clone, Serialize)]
pub struct ReportShipment {
    /// Target wallet
    pub wallet: String,
    /// When the report completed
    pub completed_at: DateTime<Utc>,
    /// Full per-stage trace
    pub trace: Vec<TraceEntry>,
    /// Quick metrics snapshot
    pub metrics: QuickMetrics,
    /// Number of social mentions found (0 when the stage did not run)
    pub social_results: u64,
}

/// Ships a finalized trace + report summary for out-of-band observability.
#[async_trait]
pub trait TraceShipper: Send + Sync {
    /// Ship `shipment`. Best-effort; callers must tolerate failure.
    async fn ship(&self, shipment: &ReportShipment) -> Result<(), ShipError>;
}
