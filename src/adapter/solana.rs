//! Solana JSON-RPC chain fetcher.
//!
//! Fetches recent signatures with `getSignaturesForAddress`, then resolves
//! transactions with batched `getTransaction` calls (falling back to
//! sequential calls for providers that reject JSON-RPC batch payloads).
//! Transient failures (HTTP 429, transport errors) are retried here with
//! exponential backoff; the orchestrator above never retries.

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{ChainFetcher, FetchError};
use crate::config::SolanaConfig;
use crate::model::{NativeTransfer, TransactionRecord};

/// JSON-RPC "invalid params" error code (bad address, bad limit).
const RPC_INVALID_PARAMS: i64 = -32602;

/// Chain fetcher backed by a Solana JSON-RPC endpoint.
pub struct SolanaRpcFetcher {
    client: Client,
    rpc_url: String,
    batch_size: usize,
}

impl SolanaRpcFetcher {
    /// Create a new fetcher. `timeout` bounds each individual RPC round trip.
    #[must_use]
    pub fn new(config: &SolanaConfig, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            rpc_url: config.rpc_url.clone(),
            batch_size: config.batch_size.max(1),
        }
    }

    fn backoff() -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(400))
            .with_max_times(3)
    }

    async fn post(&self, body: &Value) -> Result<(StatusCode, Value), FetchError> {
        let response = self
            .client
            .post(&self.rpc_url)
            .json(body)
            .send()
            .await
            .map_err(|e| FetchError::Unreachable(format!("Solana RPC transport error: {e}")))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }
        if !status.is_success() {
            // Surface the status so batch callers can decide on a fallback.
            return Ok((status, Value::Null));
        }

        let data = response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::Malformed(format!("Solana RPC returned non-JSON: {e}")))?;
        Ok((status, data))
    }

    /// Single JSON-RPC call with retries on rate limiting and transport errors.
    async fn rpc(&self, method: &str, params: Value) -> Result<Value, FetchError> {
        let body = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
        let call = || async {
            let (status, data) = self.post(&body).await?;
            if !status.is_success() {
                return Err(FetchError::Unreachable(format!(
                    "Solana RPC HTTP error: {status}"
                )));
            }
            if let Some(error) = data.get("error").filter(|e| !e.is_null()) {
                return Err(classify_rpc_error(error));
            }
            Ok(data.get("result").cloned().unwrap_or(Value::Null))
        };

        call.retry(Self::backoff())
            .when(FetchError::is_retryable)
            .notify(|err, delay| {
                debug!(method, error = %err, ?delay, "Retrying Solana RPC call");
            })
            .await
    }

    /// Resolve transactions for `signatures`, batched `batch_size` at a time.
    async fn get_transactions(
        &self,
        signatures: &[String],
    ) -> Result<Vec<Option<Value>>, FetchError> {
        let mut results = Vec::with_capacity(signatures.len());

        for chunk in signatures.chunks(self.batch_size) {
            let batch: Vec<Value> = chunk
                .iter()
                .enumerate()
                .map(|(idx, sig)| {
                    json!({
                        "jsonrpc": "2.0",
                        "id": idx + 1,
                        "method": "getTransaction",
                        "params": [sig, tx_request_options()],
                    })
                })
                .collect();
            let body = Value::Array(batch);

            let call = || async {
                let (status, data) = self.post(&body).await?;
                if !status.is_success() {
                    return Err(FetchError::Unreachable(format!(
                        "Solana RPC HTTP error: {status}"
                    )));
                }
                let Value::Array(items) = data else {
                    return Err(FetchError::Malformed(
                        "unexpected batch response format".to_string(),
                    ));
                };
                let mut chunk_results = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(error) = item.get("error").filter(|e| !e.is_null()) {
                        return Err(classify_rpc_error(error));
                    }
                    chunk_results.push(item.get("result").filter(|r| !r.is_null()).cloned());
                }
                Ok(chunk_results)
            };

            let outcome = call
                .retry(Self::backoff())
                .when(FetchError::is_retryable)
                .notify(|err, delay| {
                    debug!(error = %err, ?delay, "Retrying Solana RPC batch call");
                })
                .await;

            match outcome {
                Ok(mut chunk_results) => {
                    // Providers may silently truncate batches; pad to keep
                    // results aligned with the signature list.
                    chunk_results.resize(chunk.len(), None);
                    results.append(&mut chunk_results);
                }
                Err(FetchError::Unreachable(detail)) if batch_rejected(&detail) => {
                    // Some providers/plans do not accept JSON-RPC batch payloads.
                    warn!(detail, "Batch payload rejected, falling back to sequential calls");
                    for sig in chunk {
                        let result = self
                            .rpc("getTransaction", json!([sig, tx_request_options()]))
                            .await?;
                        results.push(if result.is_null() { None } else { Some(result) });
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Ok(results)
    }
}

#[async_trait]
impl ChainFetcher for SolanaRpcFetcher {
    async fn fetch(
        &self,
        wallet: &str,
        limit: u32,
    ) -> Result<Vec<TransactionRecord>, FetchError> {
        let signatures = self
            .rpc(
                "getSignaturesForAddress",
                json!([wallet, { "limit": limit }]),
            )
            .await?;

        let Value::Array(entries) = signatures else {
            return Err(FetchError::Malformed(
                "getSignaturesForAddress did not return an array".to_string(),
            ));
        };

        let mut ids = Vec::with_capacity(entries.len());
        let mut block_times = Vec::with_capacity(entries.len());
        for entry in &entries {
            let Some(signature) = entry.get("signature").and_then(Value::as_str) else {
                continue;
            };
            ids.push(signature.to_string());
            block_times.push(
                entry
                    .get("blockTime")
                    .and_then(Value::as_i64)
                    .and_then(|ts| DateTime::from_timestamp(ts, 0)),
            );
        }

        debug!(wallet, signatures = ids.len(), "Fetched signature list");
        let transactions = self.get_transactions(&ids).await?;

        let records = ids
            .iter()
            .zip(block_times)
            .zip(transactions)
            .map(|((signature, block_time), tx)| {
                parse_transaction(signature, block_time, tx.as_ref())
            })
            .collect();

        Ok(records)
    }
}

fn tx_request_options() -> Value {
    json!({ "encoding": "jsonParsed", "maxSupportedTransactionVersion": 0 })
}

fn classify_rpc_error(error: &Value) -> FetchError {
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown RPC error")
        .to_string();
    match error.get("code").and_then(Value::as_i64) {
        Some(RPC_INVALID_PARAMS) => FetchError::InvalidAddress(message),
        _ => FetchError::Unreachable(message),
    }
}

/// Whether an HTTP failure means the provider rejects batch payloads.
fn batch_rejected(detail: &str) -> bool {
    ["401", "403", "405", "415"]
        .iter()
        .any(|code| detail.contains(code))
}

/// Turn one `getTransaction` result into a [`TransactionRecord`].
///
/// A missing transaction (pruned by the RPC node) still yields a record so
/// the signature and its block time count toward metrics.
fn parse_transaction(
    signature: &str,
    block_time: Option<DateTime<Utc>>,
    tx: Option<&Value>,
) -> TransactionRecord {
    let mut record = TransactionRecord {
        signature: signature.to_string(),
        block_time,
        fee_lamports: 0,
        account_keys: Vec::new(),
        programs: Vec::new(),
        transfers: Vec::new(),
    };

    let Some(tx) = tx else {
        return record;
    };

    record.fee_lamports = tx
        .pointer("/meta/fee")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    if let Some(keys) = tx
        .pointer("/transaction/message/accountKeys")
        .and_then(Value::as_array)
    {
        for key in keys {
            // Keys arrive either as bare strings or {pubkey, signer, ...}
            let pubkey = key
                .as_str()
                .or_else(|| key.get("pubkey").and_then(Value::as_str));
            if let Some(pubkey) = pubkey {
                record.account_keys.push(pubkey.to_string());
            }
        }
    }

    if let Some(instructions) = tx
        .pointer("/transaction/message/instructions")
        .and_then(Value::as_array)
    {
        for ix in instructions {
            let Some(parsed) = ix.get("parsed").filter(|p| p.is_object()) else {
                continue;
            };
            if let Some(program) = ix
                .get("program")
                .and_then(Value::as_str)
                .or_else(|| ix.get("programId").and_then(Value::as_str))
            {
                record.programs.push(program.to_string());
            }
            if parsed.get("type").and_then(Value::as_str) != Some("transfer") {
                continue;
            }
            let info = &parsed["info"];
            let (Some(source), Some(destination), Some(lamports)) = (
                info.get("source").and_then(Value::as_str),
                info.get("destination").and_then(Value::as_str),
                info.get("lamports").and_then(Value::as_u64),
            ) else {
                continue;
            };
            record.transfers.push(NativeTransfer {
                source: source.to_string(),
                destination: destination.to_string(),
                lamports,
            });
        }
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_tx() -> Value {
        serde_json::from_str(
            r#"{
                "meta": { "fee": 5000 },
                "transaction": {
                    "message": {
                        "accountKeys": [
                            { "pubkey": "WalletAaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "signer": true },
                            "CounterpartyBbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"
                        ],
                        "instructions": [
                            {
                                "program": "system",
                                "parsed": {
                                    "type": "transfer",
                                    "info": {
                                        "source": "WalletAaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
                                        "destination": "CounterpartyBbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb",
                                        "lamports": 2000000000
                                    }
                                }
                            },
                            { "programId": "UnparsedProgram1111111111111111111111111111" }
                        ]
                    }
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn parses_fee_keys_programs_and_transfers() {
        let tx = sample_tx();
        let record = parse_transaction("sig1", None, Some(&tx));

        assert_eq!(record.fee_lamports, 5000);
        assert_eq!(record.account_keys.len(), 2);
        assert_eq!(record.programs, vec!["system".to_string()]);
        assert_eq!(
            record.transfers,
            vec![NativeTransfer {
                source: "WalletAaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_string(),
                destination: "CounterpartyBbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb".to_string(),
                lamports: 2_000_000_000,
            }]
        );
    }

    #[test]
    fn missing_transaction_still_yields_a_record() {
        let block_time = DateTime::from_timestamp(1_700_000_000, 0);
        let record = parse_transaction("sig2", block_time, None);

        assert_eq!(record.signature, "sig2");
        assert_eq!(record.block_time, block_time);
        assert_eq!(record.fee_lamports, 0);
        assert!(record.transfers.is_empty());
    }

    #[test]
    fn non_transfer_instructions_are_not_transfers() {
        let tx: Value = serde_json::from_str(
            r#"{
                "meta": { "fee": 100 },
                "transaction": {
                    "message": {
                        "accountKeys": [],
                        "instructions": [
                            { "program": "vote", "parsed": { "type": "vote", "info": {} } }
                        ]
                    }
                }
            }"#,
        )
        .unwrap();
        let record = parse_transaction("sig3", None, Some(&tx));

        assert_eq!(record.programs, vec!["vote".to_string()]);
        assert!(record.transfers.is_empty());
    }

    #[test]
    fn classifies_invalid_params_as_invalid_address() {
        let error = json!({ "code": -32602, "message": "Invalid param: WrongSize" });
        assert!(matches!(
            classify_rpc_error(&error),
            FetchError::InvalidAddress(_)
        ));

        let error = json!({ "code": -32005, "message": "node is behind" });
        assert!(matches!(
            classify_rpc_error(&error),
            FetchError::Unreachable(_)
        ));
    }

    #[test]
    fn batch_rejection_detection() {
        assert!(batch_rejected("Solana RPC HTTP error: 405 Method Not Allowed"));
        assert!(!batch_rejected("Solana RPC HTTP error: 500 Internal Server Error"));
    }
}
