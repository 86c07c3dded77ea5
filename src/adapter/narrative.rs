//! Bedrock invoke-model narrative client.
//!
//! Calls the Bedrock runtime HTTP endpoint with bearer-token auth and an
//! Anthropic-format message body, and returns the generated analysis together
//! with the exact context snapshot it was given.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tracing::debug;

use super::{NarrativeError, NarrativeModel, ResearchContext};
use crate::config::NarrativeConfig;
use crate::model::NarrativeAnalysis;

const SYSTEM_PROMPT: &str = "You are a Solana wallet intelligence analyst. \
    Given wallet metrics, linkage intelligence, and optional social context, \
    infer behavior, risk profile, and actionable conclusions. \
    Be concise, specific, and avoid hallucinating unavailable data. \
    When mentioning timing/recency, use exact values from \
    intelligence.first_seen_at and intelligence.last_seen_at; do not invent \
    dates or years. \
    Use sections: Summary, Wallet Graph, Behavior, Risk Flags, Actionable Next Steps.";

/// Narrative client backed by the Bedrock runtime API.
pub struct BedrockClient {
    client: Client,
    api_key: String,
    model_id: String,
    endpoint: String,
}

impl BedrockClient {
    /// Create a new client. `timeout` bounds each model invocation.
    #[must_use]
    pub fn new(config: &NarrativeConfig, api_key: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key,
            model_id: config.model_id.clone(),
            endpoint: format!(
                "https://bedrock-runtime.{}.amazonaws.com/model/{}/invoke",
                config.region, config.model_id
            ),
        }
    }

    fn build_body(context_snapshot: &Value) -> Value {
        let user_prompt = json!({
            "context": context_snapshot,
            "instructions": [
                "Infer likely strategy type (sniper, swing, passive, etc.)",
                "Assess whether this wallet is worth monitoring for alpha signals",
                "Call out likely funder ties and notable linked wallets from the data only",
                "If social data exists, summarize signal quality and potential identity clues",
                "List 2-4 concrete next checks a trader should run",
                "If you mention wallet age or recency, cite first_seen_at/last_seen_at directly from the input data",
            ],
        });

        json!({
            "anthropic_version": "bedrock-2023-05-31",
            "max_tokens": 700,
            "temperature": 0.2,
            "system": SYSTEM_PROMPT,
            "messages": [
                { "role": "user", "content": [{ "type": "text", "text": user_prompt.to_string() }] }
            ],
        })
    }
}

#[async_trait]
impl NarrativeModel for BedrockClient {
    async fn analyze(
        &self,
        context: &ResearchContext<'_>,
    ) -> Result<NarrativeAnalysis, NarrativeError> {
        let snapshot =
            serde_json::to_value(context).map_err(|e| NarrativeError::Malformed(e.to_string()))?;
        let body = Self::build_body(&snapshot);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| NarrativeError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(NarrativeError::Unauthorized);
            }
            status if status.is_server_error() => {
                return Err(NarrativeError::ModelUnavailable(format!("HTTP {status}")));
            }
            status if !status.is_success() => {
                return Err(NarrativeError::Transport(format!("HTTP {status}")));
            }
            _ => {}
        }

        let payload = response
            .json::<Value>()
            .await
            .map_err(|e| NarrativeError::Malformed(e.to_string()))?;

        let analysis = extract_text(&payload);
        if analysis.is_empty() {
            return Err(NarrativeError::Malformed(
                "model response contained no text content".to_string(),
            ));
        }

        debug!(model = %self.model_id, chars = analysis.len(), "Narrative generated");
        Ok(NarrativeAnalysis {
            analysis,
            model: self.model_id.clone(),
            context: snapshot,
        })
    }
}

/// Concatenate the text chunks of an Anthropic-format response.
fn extract_text(payload: &Value) -> String {
    payload
        .get("content")
        .and_then(Value::as_array)
        .map(|chunks| {
            chunks
                .iter()
                .filter_map(|c| c.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extracts_and_joins_text_chunks() {
        let payload = json!({
            "content": [
                { "type": "text", "text": "Summary: quiet wallet." },
                { "type": "text", "text": " Risk Flags: none." }
            ]
        });
        assert_eq!(
            extract_text(&payload),
            "Summary: quiet wallet. Risk Flags: none."
        );
    }

    #[test]
    fn missing_content_yields_empty_text() {
        assert_eq!(extract_text(&json!({})), "");
        assert_eq!(extract_text(&json!({ "content": [] })), "");
    }

    #[test]
    fn body_carries_system_prompt_and_context() {
        let snapshot = json!({ "wallet": "abc" });
        let body = BedrockClient::build_body(&snapshot);
        assert_eq!(body["anthropic_version"], "bedrock-2023-05-31");
        assert_eq!(body["max_tokens"], 700);
        let text = body["messages"][0]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("\"wallet\":\"abc\""));
    }
}
