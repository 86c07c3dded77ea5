//! Request, report and progress-event data model.
//!
//! Everything here is scoped to a single request execution: the fetcher
//! produces [`TransactionRecord`]s once, the pure stages derive
//! [`QuickMetrics`] and [`IntelligenceGraph`] from them, and the orchestrator
//! assembles the terminal [`Report`]. Nothing persists across requests.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Request
// ============================================================================

/// A wallet report request, immutable once accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRequest {
    /// Target Solana wallet address (format-validated by the transport layer)
    pub wallet: String,
    /// Override the signature fetch limit for this request
    #[serde(default)]
    pub max_signatures: Option<u32>,
}

// ============================================================================
// Chain data
// ============================================================================

/// A native SOL transfer parsed out of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeTransfer {
    /// Sending address
    pub source: String,
    /// Receiving address
    pub destination: String,
    /// Transferred amount in lamports
    pub lamports: u64,
}

/// One parsed on-chain transaction. Produced once by the chain fetcher and
/// read-only afterward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Transaction signature
    pub signature: String,
    /// Block time, when the RPC node reports one
    pub block_time: Option<DateTime<Utc>>,
    /// Transaction fee in lamports
    pub fee_lamports: u64,
    /// All account keys referenced by the transaction
    pub account_keys: Vec<String>,
    /// Programs invoked by parsed instructions
    pub programs: Vec<String>,
    /// Parsed native transfers
    pub transfers: Vec<NativeTransfer>,
}

// ============================================================================
// Derived analytics
// ============================================================================

/// Transfer activity with a single counterparty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterpartyActivity {
    /// Counterparty address
    pub wallet: String,
    /// Number of transfers exchanged with the target wallet
    pub transfers: u64,
}

/// Quick aggregate metrics derived from the full transaction set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickMetrics {
    /// Target wallet
    pub wallet: String,
    /// Number of signatures fetched
    pub signature_count: u64,
    /// Total fees paid, in SOL
    pub total_fees_sol: f64,
    /// Inbound transfer volume, in SOL
    pub inbound_sol: f64,
    /// Outbound transfer volume, in SOL
    pub outbound_sol: f64,
    /// Inbound + outbound volume, in SOL
    pub transfer_volume_sol: f64,
    /// Inbound minus outbound, in SOL
    pub net_flow_sol: f64,
    /// Number of distinct UTC calendar days with activity
    pub active_days: u64,
    /// Number of distinct transfer counterparties
    pub distinct_counterparties: u64,
    /// Most active counterparties, by transfer count
    pub top_counterparties: Vec<CounterpartyActivity>,
}

/// A funding relationship edge, ranked by recency-weighted value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingEdge {
    /// Counterparty address
    pub wallet: String,
    /// Total value moved along this edge, in SOL
    pub total_sol: f64,
    /// Number of transfers along this edge
    pub transfers: u64,
}

/// How a linked wallet relates to the target wallet. An address may carry
/// several relations at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Exchanged value directly with the wallet
    Counterparty,
    /// Sent value into the wallet
    Funder,
    /// Received value from the wallet
    Funded,
}

/// An address connected to the wallet by observed on-chain activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedWallet {
    /// The linked address
    pub address: String,
    /// Every relation observed for this address
    pub relations: Vec<Relation>,
}

/// A well-known address that appeared in the wallet's orbit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownLabel {
    /// Labeled address
    pub address: String,
    /// Human-readable label
    pub label: String,
    /// Label category (e.g. "axiom", "pumpfun")
    pub category: String,
}

/// An entity cluster inferred from labels and address patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferredEntity {
    /// Entity description
    pub entity: String,
    /// Confidence bucket ("high" / "medium")
    pub confidence: String,
    /// Why the entity was inferred
    pub reason: String,
    /// Addresses supporting the inference
    pub evidence: Vec<String>,
}

/// Relationship graph derived from the transaction set.
///
/// Invariant: every address in `funded_wallets` and `linked_wallets` was
/// observed in at least one input transaction — no fabricated edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntelligenceGraph {
    /// Earliest observed block time
    pub first_seen_at: Option<DateTime<Utc>>,
    /// Latest observed block time
    pub last_seen_at: Option<DateTime<Utc>>,
    /// Number of distinct transfer counterparties
    pub unique_counterparties: u64,
    /// Funding sources, ranked by recency-weighted inbound value
    pub likely_funders: Vec<FundingEdge>,
    /// Funding destinations, ranked by recency-weighted outbound value
    pub funded_wallets: Vec<FundingEdge>,
    /// Every address co-occurring with the wallet, tagged with relations
    pub linked_wallets: Vec<LinkedWallet>,
    /// Invocation count per program id
    pub program_usage: BTreeMap<String, u64>,
    /// Well-known addresses observed in the wallet's orbit
    pub known_labels: Vec<KnownLabel>,
    /// Entity clusters inferred from labels and address patterns
    pub inferred_entities: Vec<InferredEntity>,
}

// ============================================================================
// Enrichment & narrative
// ============================================================================

/// One social post mentioning a queried term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialMention {
    /// Author handle
    pub username: Option<String>,
    /// Author display name
    pub name: Option<String>,
    /// Post text
    pub text: String,
    /// Post creation time, as reported by the API
    pub created_at: Option<String>,
    /// Canonical post URL
    pub url: Option<String>,
}

/// Social search results tied to the wallet and its discovered addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialIntel {
    /// Terms actually queried
    pub queried_terms: Vec<String>,
    /// Number of mentions returned
    pub total_results: u64,
    /// The mentions themselves
    pub mentions: Vec<SocialMention>,
}

/// LLM narrative plus the exact context snapshot it was generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeAnalysis {
    /// Free-text analysis
    pub analysis: String,
    /// Model that produced the analysis
    pub model: String,
    /// The research context the model was given (auditability)
    pub context: Value,
}

// ============================================================================
// Stage results & trace
// ============================================================================

/// Outcome of an optional pipeline stage.
///
/// A tagged variant, never a nullable field: "not run" is always
/// distinguishable from "ran and found nothing".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StageResult<T> {
    /// The stage ran and produced a value
    Ran {
        /// The stage's output
        value: T,
    },
    /// The stage was intentionally not run
    Skipped {
        /// Why the stage did not run
        reason: String,
    },
    /// The stage ran and failed non-fatally
    Unavailable {
        /// The failure detail
        error: String,
    },
}

impl<T> StageResult<T> {
    /// Returns the stage value, if the stage ran.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Ran { value } => Some(value),
            _ => None,
        }
    }
}

/// Pipeline stage names, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    /// Chain data fetch (fatal on failure)
    Fetch,
    /// Quick metrics computation
    Metrics,
    /// Intelligence graph construction
    Intelligence,
    /// Social enrichment (optional, non-fatal)
    Social,
    /// Narrative generation (optional, non-fatal)
    Narrative,
}

impl StageName {
    /// Stable wire name for trace entries and SSE events.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Metrics => "metrics",
            Self::Intelligence => "intelligence",
            Self::Social => "social",
            Self::Narrative => "narrative",
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of one stage attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    /// The stage completed
    Success,
    /// The stage was intentionally not run
    Skipped,
    /// The stage failed
    Failed,
}

/// One entry in the per-request trace. Every stage attempt produces exactly
/// one entry, regardless of outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Stage the entry belongs to
    pub stage: StageName,
    /// When the stage started
    pub started_at: DateTime<Utc>,
    /// How long the stage ran
    pub duration_ms: u64,
    /// Terminal outcome
    pub outcome: StageOutcome,
    /// Success detail, skip reason, or error detail
    pub detail: Option<String>,
}

// ============================================================================
// Report & progress events
// ============================================================================

/// The terminal aggregate returned by the blocking endpoint and carried by
/// the final event of the streaming endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Target wallet
    pub wallet: String,
    /// Quick aggregate metrics (guaranteed payload)
    pub metrics: QuickMetrics,
    /// Relationship graph (guaranteed payload)
    pub intelligence: IntelligenceGraph,
    /// Social enrichment outcome
    pub social: StageResult<SocialIntel>,
    /// Narrative outcome
    pub narrative: StageResult<NarrativeAnalysis>,
    /// Full per-stage trace
    pub trace: Vec<TraceEntry>,
}

/// Partial contribution carried by a stage progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StagePayload {
    /// Metrics stage output
    Metrics(QuickMetrics),
    /// Intelligence stage output
    Intelligence(IntelligenceGraph),
    /// Social stage output
    Social(SocialIntel),
    /// Narrative stage output
    Narrative(NarrativeAnalysis),
    /// Fetch stage: how many transactions were retrieved.
    /// Last so untagged deserialization never shadows the richer payloads,
    /// which also carry a `signature_count` field.
    Fetched {
        /// Number of signatures returned by the fetcher
        signature_count: u64,
    },
}

/// One event in the streaming-mode progress sequence.
///
/// A stream is a finite sequence of `Stage` events (exactly one per pipeline
/// stage, including skipped ones) terminated by exactly one `Completed` or
/// `Aborted` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A stage resolved (success, skip, or non-fatal failure)
    Stage {
        /// Which stage resolved
        stage: StageName,
        /// How it resolved
        outcome: StageOutcome,
        /// Stage duration
        duration_ms: u64,
        /// Skip reason or error detail
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
        /// The stage's partial contribution, when it produced one
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<StagePayload>,
    },
    /// Terminal event: the pipeline completed and produced a report
    Completed {
        /// The finished report
        report: Box<Report>,
    },
    /// Terminal event: a fatal stage failure aborted the pipeline
    Aborted {
        /// The stage that failed fatally
        stage: StageName,
        /// Failure detail
        error: String,
        /// Whether retrying the whole request might succeed
        retryable: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn stage_result_serializes_with_state_tag() {
        let ran: StageResult<SocialIntel> = StageResult::Ran {
            value: SocialIntel {
                queried_terms: vec!["abc".to_string()],
                total_results: 0,
                mentions: vec![],
            },
        };
        let json = serde_json::to_value(&ran).unwrap();
        assert_eq!(json["state"], "ran");
        assert_eq!(json["value"]["total_results"], 0);

        let skipped: StageResult<SocialIntel> = StageResult::Skipped {
            reason: "disabled".to_string(),
        };
        let json = serde_json::to_value(&skipped).unwrap();
        assert_eq!(json["state"], "skipped");
        assert_eq!(json["reason"], "disabled");

        let unavailable: StageResult<SocialIntel> = StageResult::Unavailable {
            error: "Unauthorized".to_string(),
        };
        let json = serde_json::to_value(&unavailable).unwrap();
        assert_eq!(json["state"], "unavailable");
    }

    #[test]
    fn progress_event_serializes_with_event_tag() {
        let event = ProgressEvent::Stage {
            stage: StageName::Fetch,
            outcome: StageOutcome::Success,
            duration_ms: 12,
            detail: None,
            payload: Some(StagePayload::Fetched { signature_count: 3 }),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "stage");
        assert_eq!(json["stage"], "fetch");
        assert_eq!(json["outcome"], "success");
        assert_eq!(json["payload"]["signature_count"], 3);
        assert!(json.get("detail").is_none());
    }

    #[test]
    fn stage_names_are_stable() {
        assert_eq!(StageName::Fetch.as_str(), "fetch");
        assert_eq!(StageName::Narrative.to_string(), "narrative");
        assert_eq!(
            serde_json::to_value(StageName::Intelligence).unwrap(),
            "intelligence"
        );
    }
}
