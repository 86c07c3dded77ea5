//! Quick metrics over a wallet's transaction set.
//!
//! Pure and deterministic: no I/O, no failure mode. Empty input yields
//! all-zero metrics, never an error.

use std::collections::{BTreeMap, BTreeSet};

use crate::LAMPORTS_PER_SOL;
use crate::model::{CounterpartyActivity, QuickMetrics, TransactionRecord};

/// How many counterparties the ranked list carries.
const TOP_COUNTERPARTIES: usize = 8;

/// Compute quick aggregate metrics for `wallet` over `transactions`.
///
/// Aggregates are order-independent; the counterparty ranking breaks ties by
/// lexicographic address order so the output is stable.
#[must_use]
pub fn compute(wallet: &str, transactions: &[TransactionRecord]) -> QuickMetrics {
    let mut total_fees_lamports: u64 = 0;
    let mut inbound_lamports: u64 = 0;
    let mut outbound_lamports: u64 = 0;
    let mut active_days = BTreeSet::new();
    let mut counterparties: BTreeMap<&str, u64> = BTreeMap::new();

    for tx in transactions {
        total_fees_lamports += tx.fee_lamports;
        if let Some(at) = tx.block_time {
            active_days.insert(at.date_naive());
        }

        for transfer in &tx.transfers {
            if transfer.source == wallet {
                outbound_lamports += transfer.lamports;
                *counterparties.entry(&transfer.destination).or_default() += 1;
            } else if transfer.destination == wallet {
                inbound_lamports += transfer.lamports;
                *counterparties.entry(&transfer.source).or_default() += 1;
            }
        }
    }

    let mut ranked: Vec<(&str, u64)> = counterparties.iter().map(|(a, c)| (*a, *c)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let inbound_sol = round_sol(inbound_lamports);
    let outbound_sol = round_sol(outbound_lamports);

    QuickMetrics {
        wallet: wallet.to_string(),
        signature_count: transactions.len() as u64,
        total_fees_sol: round_sol(total_fees_lamports),
        inbound_sol,
        outbound_sol,
        transfer_volume_sol: round6(inbound_sol + outbound_sol),
        net_flow_sol: round6(inbound_sol - outbound_sol),
        active_days: active_days.len() as u64,
        distinct_counterparties: counterparties.len() as u64,
        top_counterparties: ranked
            .into_iter()
            .take(TOP_COUNTERPARTIES)
            .map(|(wallet, transfers)| CounterpartyActivity {
                wallet: wallet.to_string(),
                transfers,
            })
            .collect(),
    }
}

/// Lamports to SOL, rounded to 6 decimal places.
pub(crate) fn round_sol(lamports: u64) -> f64 {
    round6(lamports as f64 / LAMPORTS_PER_SOL as f64)
}

pub(crate) fn round6(sol: f64) -> f64 {
    (sol * 1e6).round() / 1e6
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NativeTransfer;
    use chrono::DateTime;
    use pretty_assertions::assert_eq;

    const WALLET: &str = "TargetWallet11111111111111111111111111111111";

    fn tx(
        signature: &str,
        day: &str,
        fee: u64,
        transfers: Vec<NativeTransfer>,
    ) -> TransactionRecord {
        TransactionRecord {
            signature: signature.to_string(),
            block_time: Some(
                DateTime::parse_from_rfc3339(&format!("{day}T12:00:00Z"))
                    .unwrap()
                    .to_utc(),
            ),
            fee_lamports: fee,
            account_keys: vec![],
            programs: vec![],
            transfers,
        }
    }

    fn inbound(from: &str, lamports: u64) -> NativeTransfer {
        NativeTransfer {
            source: from.to_string(),
            destination: WALLET.to_string(),
            lamports,
        }
    }

    #[test]
    fn empty_input_yields_all_zero_metrics() {
        let metrics = compute(WALLET, &[]);

        assert_eq!(metrics.signature_count, 0);
        assert_eq!(metrics.total_fees_sol, 0.0);
        assert_eq!(metrics.inbound_sol, 0.0);
        assert_eq!(metrics.outbound_sol, 0.0);
        assert_eq!(metrics.transfer_volume_sol, 0.0);
        assert_eq!(metrics.net_flow_sol, 0.0);
        assert_eq!(metrics.active_days, 0);
        assert_eq!(metrics.distinct_counterparties, 0);
        assert!(metrics.top_counterparties.is_empty());
    }

    #[test]
    fn three_inbound_transfers_on_two_days() {
        // 3 inbound transfers from distinct addresses on 2 distinct days
        let txs = vec![
            tx("s1", "2024-06-01", 5000, vec![inbound("FunderA", 1_000_000_000)]),
            tx("s2", "2024-06-01", 5000, vec![inbound("FunderB", 2_000_000_000)]),
            tx("s3", "2024-06-02", 5000, vec![inbound("FunderC", 500_000_000)]),
        ];

        let metrics = compute(WALLET, &txs);
        assert_eq!(metrics.active_days, 2);
        assert_eq!(metrics.distinct_counterparties, 3);
        assert_eq!(metrics.signature_count, 3);
        assert_eq!(metrics.inbound_sol, 3.5);
        assert_eq!(metrics.outbound_sol, 0.0);
        assert_eq!(metrics.net_flow_sol, 3.5);
        assert_eq!(metrics.transfer_volume_sol, 3.5);
        assert_eq!(metrics.total_fees_sol, 0.000015);
    }

    #[test]
    fn net_flow_subtracts_outbound() {
        let txs = vec![tx(
            "s1",
            "2024-06-01",
            0,
            vec![
                inbound("FunderA", 3_000_000_000),
                NativeTransfer {
                    source: WALLET.to_string(),
                    destination: "SinkD".to_string(),
                    lamports: 1_000_000_000,
                },
            ],
        )];

        let metrics = compute(WALLET, &txs);
        assert_eq!(metrics.inbound_sol, 3.0);
        assert_eq!(metrics.outbound_sol, 1.0);
        assert_eq!(metrics.net_flow_sol, 2.0);
        assert_eq!(metrics.transfer_volume_sol, 4.0);
    }

    #[test]
    fn counterparty_ranking_breaks_ties_lexicographically() {
        let txs = vec![tx(
            "s1",
            "2024-06-01",
            0,
            vec![
                inbound("Bbb", 1),
                inbound("Aaa", 1),
                inbound("Ccc", 1),
                inbound("Ccc", 1),
            ],
        )];

        let metrics = compute(WALLET, &txs);
        let order: Vec<&str> = metrics
            .top_counterparties
            .iter()
            .map(|c| c.wallet.as_str())
            .collect();
        // Ccc has 2 transfers; Aaa/Bbb tie at 1 and sort lexicographically
        assert_eq!(order, vec!["Ccc", "Aaa", "Bbb"]);
    }

    #[test]
    fn transfers_not_involving_the_wallet_are_ignored() {
        let txs = vec![tx(
            "s1",
            "2024-06-01",
            0,
            vec![NativeTransfer {
                source: "OtherA".to_string(),
                destination: "OtherB".to_string(),
                lamports: 9_000_000_000,
            }],
        )];

        let metrics = compute(WALLET, &txs);
        assert_eq!(metrics.inbound_sol, 0.0);
        assert_eq!(metrics.outbound_sol, 0.0);
        assert_eq!(metrics.distinct_counterparties, 0);
    }

    #[test]
    fn compute_is_idempotent() {
        let txs = vec![
            tx("s1", "2024-06-01", 5000, vec![inbound("FunderA", 1_000_000_000)]),
            tx("s2", "2024-06-03", 7000, vec![inbound("FunderB", 250_000_000)]),
        ];
        assert_eq!(compute(WALLET, &txs), compute(WALLET, &txs));
    }
}
