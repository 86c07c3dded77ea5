//! Wallet relationship graph construction.
//!
//! Pure and deterministic: the graph is a function of the input transaction
//! set only. Funding edges are ranked by recency-weighted transferred value,
//! where recency is measured against the newest block time in the set — no
//! wall clock, so rebuilding from the same input always yields the same
//! ranking.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use super::metrics::round_sol;
use crate::model::{
    FundingEdge, InferredEntity, IntelligenceGraph, KnownLabel, LinkedWallet, Relation,
    TransactionRecord,
};

/// Recency half-life for funding-edge weights, in days: a transfer this old
/// counts half as much as one at the reference time.
const RECENCY_HALF_LIFE_DAYS: f64 = 30.0;

/// How many funding edges each ranked list carries.
const TOP_EDGES: usize = 10;

/// How many linked wallets the graph carries.
const TOP_LINKED: usize = 20;

/// Well-known addresses: (address, label, category).
const KNOWN_ADDRESS_LABELS: &[(&str, &str, &str)] = &[
    (
        "jitodontfront31111111TradeWithAxiomDotTrade",
        "Axiom anti-front-run program",
        "axiom",
    ),
    (
        "FLASHX8DrLbgeR8FcfNV1F5krxYcYMUdBkrP1EPBtxB9",
        "Axiom execution/flash program",
        "axiom",
    ),
    (
        "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P",
        "Pump.fun program",
        "pumpfun",
    ),
];

#[derive(Debug, Default, Clone, Copy)]
struct EdgeAccumulator {
    score: f64,
    total_lamports: u64,
    transfers: u64,
}

/// Build the relationship graph for `wallet` over `transactions`.
///
/// Every address in the output was observed in at least one input
/// transaction; the builder never fabricates edges.
#[must_use]
pub fn build(wallet: &str, transactions: &[TransactionRecord]) -> IntelligenceGraph {
    let reference_time = transactions.iter().filter_map(|tx| tx.block_time).max();

    let mut first_seen_at: Option<DateTime<Utc>> = None;
    let mut last_seen_at: Option<DateTime<Utc>> = None;
    let mut counterparties: BTreeMap<&str, u64> = BTreeMap::new();
    let mut inbound: BTreeMap<&str, EdgeAccumulator> = BTreeMap::new();
    let mut outbound: BTreeMap<&str, EdgeAccumulator> = BTreeMap::new();
    let mut co_occurrence: BTreeMap<&str, u64> = BTreeMap::new();
    let mut program_usage: BTreeMap<String, u64> = BTreeMap::new();

    for tx in transactions {
        if let Some(at) = tx.block_time {
            first_seen_at = Some(first_seen_at.map_or(at, |seen| seen.min(at)));
            last_seen_at = Some(last_seen_at.map_or(at, |seen| seen.max(at)));
        }

        for key in &tx.account_keys {
            if !key.is_empty() && key != wallet {
                *co_occurrence.entry(key).or_default() += 1;
            }
        }

        for program in &tx.programs {
            *program_usage.entry(program.clone()).or_default() += 1;
        }

        let weight = recency_weight(reference_time, tx.block_time);
        for transfer in &tx.transfers {
            if transfer.source == wallet {
                *counterparties.entry(&transfer.destination).or_default() += 1;
                let edge = outbound.entry(&transfer.destination).or_default();
                edge.score += transfer.lamports as f64 * weight;
                edge.total_lamports += transfer.lamports;
                edge.transfers += 1;
            } else if transfer.destination == wallet {
                *counterparties.entry(&transfer.source).or_default() += 1;
                let edge = inbound.entry(&transfer.source).or_default();
                edge.score += transfer.lamports as f64 * weight;
                edge.total_lamports += transfer.lamports;
                edge.transfers += 1;
            }
        }
    }

    let likely_funders = rank_edges(&inbound);
    let funded_wallets = rank_edges(&outbound);

    let mut linked: Vec<(&str, u64)> = co_occurrence.iter().map(|(a, c)| (*a, *c)).collect();
    linked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let linked_wallets: Vec<LinkedWallet> = linked
        .into_iter()
        .take(TOP_LINKED)
        .map(|(address, _)| {
            let mut relations = vec![Relation::Counterparty];
            if inbound.contains_key(address) {
                relations.push(Relation::Funder);
            }
            if outbound.contains_key(address) {
                relations.push(Relation::Funded);
            }
            LinkedWallet {
                address: address.to_string(),
                relations,
            }
        })
        .collect();

    let candidates: BTreeSet<&str> = co_occurrence
        .keys()
        .chain(counterparties.keys())
        .copied()
        .chain(program_usage.keys().map(String::as_str))
        .collect();
    let known_labels = match_known_labels(&candidates);
    let inferred_entities = infer_entities(&candidates, &known_labels);

    IntelligenceGraph {
        first_seen_at,
        last_seen_at,
        unique_counterparties: counterparties.len() as u64,
        likely_funders,
        funded_wallets,
        linked_wallets,
        program_usage,
        known_labels,
        inferred_entities,
    }
}

/// Weight of a transfer at `block_time` relative to `reference_time`:
/// `0.5^(age_days / half_life)`. Transactions without a block time rank last.
fn recency_weight(
    reference_time: Option<DateTime<Utc>>,
    block_time: Option<DateTime<Utc>>,
) -> f64 {
    match (reference_time, block_time) {
        (Some(reference), Some(at)) => {
            let age_days = (reference - at).num_seconds().max(0) as f64 / 86_400.0;
            0.5_f64.powf(age_days / RECENCY_HALF_LIFE_DAYS)
        }
        _ => 0.0,
    }
}

/// Rank edges by recency-weighted score descending; ties broken by transfer
/// count descending, then lexicographic address order.
fn rank_edges(edges: &BTreeMap<&str, EdgeAccumulator>) -> Vec<FundingEdge> {
    let mut ranked: Vec<(&str, EdgeAccumulator)> =
        edges.iter().map(|(a, e)| (*a, *e)).collect();
    ranked.sort_by(|a, b| {
        b.1.score
            .partial_cmp(&a.1.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.1.transfers.cmp(&a.1.transfers))
            .then_with(|| a.0.cmp(b.0))
    });
    ranked
        .into_iter()
        .take(TOP_EDGES)
        .map(|(address, edge)| FundingEdge {
            wallet: address.to_string(),
            total_sol: round_sol(edge.total_lamports),
            transfers: edge.transfers,
        })
        .collect()
}

fn match_known_labels(candidates: &BTreeSet<&str>) -> Vec<KnownLabel> {
    KNOWN_ADDRESS_LABELS
        .iter()
        .filter(|(address, _, _)| candidates.contains(address))
        .map(|(address, label, category)| KnownLabel {
            address: (*address).to_string(),
            label: (*label).to_string(),
            category: (*category).to_string(),
        })
        .collect()
}

fn infer_entities(candidates: &BTreeSet<&str>, known_labels: &[KnownLabel]) -> Vec<InferredEntity> {
    let mut entities = Vec::new();

    // Axiom cluster: axm vanity-prefixed wallets and/or Axiom-labeled programs
    let axm_wallets: Vec<&str> = candidates
        .iter()
        .filter(|a| a.to_lowercase().starts_with("axm"))
        .copied()
        .collect();
    let axiom_labels: Vec<&KnownLabel> = known_labels
        .iter()
        .filter(|l| l.category == "axiom")
        .collect();
    if !axm_wallets.is_empty() || !axiom_labels.is_empty() {
        let mut evidence: Vec<String> = axm_wallets
            .iter()
            .take(4)
            .map(|a| (*a).to_string())
            .collect();
        for label in axiom_labels.iter().take(3) {
            if !evidence.contains(&label.address) {
                evidence.push(label.address.clone());
            }
        }
        let signal_count = axm_wallets.len() + axiom_labels.len();
        entities.push(InferredEntity {
            entity: "Axiom-linked trading cluster".to_string(),
            confidence: if signal_count >= 3 { "high" } else { "medium" }.to_string(),
            reason: "Detected Axiom-associated addresses/programs and/or axm vanity-linked wallets."
                .to_string(),
            evidence,
        });
    }

    let pump_labels: Vec<&KnownLabel> = known_labels
        .iter()
        .filter(|l| l.category == "pumpfun")
        .collect();
    if !pump_labels.is_empty() {
        entities.push(InferredEntity {
            entity: "Pump.fun ecosystem activity".to_string(),
            confidence: "medium".to_string(),
            reason: "Detected known Pump.fun program interaction in linked/program addresses."
                .to_string(),
            evidence: pump_labels
                .iter()
                .take(3)
                .map(|l| l.address.clone())
                .collect(),
        });
    }

    entities
}
