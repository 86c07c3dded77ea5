//! X (Twitter) recent-search client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

use super::{SocialError, SocialSearch};
use crate::model::{SocialIntel, SocialMention};

const SEARCH_URL: &str = "https://api.x.com/2/tweets/search/recent";

/// How many query terms a single search uses at most.
const MAX_QUERY_TERMS: usize = 5;

/// Social search client backed by the X recent-search API.
pub struct XSearchClient {
    client: Client,
    bearer_token: String,
}

impl XSearchClient {
    /// Create a new client. `timeout` bounds each search round trip.
    #[must_use]
    pub fn new(bearer_token: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            bearer_token: bearer_token.trim().to_string(),
        }
    }
}

#[async_trait]
impl SocialSearch for XSearchClient {
    async fn search(
        &self,
        terms: &[String],
        max_results: u32,
    ) -> Result<SocialIntel, SocialError> {
        let terms: Vec<&String> = terms
            .iter()
            .filter(|t| !t.is_empty())
            .take(MAX_QUERY_TERMS)
            .collect();
        if terms.is_empty() {
            return Ok(SocialIntel {
                queried_terms: vec![],
                total_results: 0,
                mentions: vec![],
            });
        }

        let query = terms
            .iter()
            .map(|t| format!("\"{t}\""))
            .collect::<Vec<_>>()
            .join(" OR ");
        // The API requires max_results in [10, 100]
        let page_size = max_results.clamp(10, 100);

        let response = self
            .client
            .get(SEARCH_URL)
            .bearer_auth(&self.bearer_token)
            .query(&[
                ("query", query.as_str()),
                ("max_results", &page_size.to_string()),
                ("tweet.fields", "created_at,author_id"),
                ("expansions", "author_id"),
                ("user.fields", "username,name"),
            ])
            .send()
            .await
            .map_err(|e| SocialError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED => return Err(SocialError::Unauthorized),
            StatusCode::FORBIDDEN => return Err(SocialError::Forbidden),
            StatusCode::TOO_MANY_REQUESTS => return Err(SocialError::RateLimited),
            status if !status.is_success() => {
                return Err(SocialError::Transport(format!("HTTP {status}")));
            }
            _ => {}
        }

        let payload = response
            .json::<Value>()
            .await
            .map_err(|e| SocialError::Malformed(e.to_string()))?;

        let intel = parse_search_response(
            &payload,
            terms.into_iter().cloned().collect(),
            max_results as usize,
        );
        debug!(results = intel.total_results, "Social search completed");
        Ok(intel)
    }
}

fn parse_search_response(
    payload: &Value,
    queried_terms: Vec<String>,
    max_results: usize,
) -> SocialIntel {
    let mut user_by_id = std::collections::HashMap::new();
    if let Some(users) = payload.pointer("/includes/users").and_then(Value::as_array) {
        for user in users {
            if let Some(id) = user.get("id").and_then(Value::as_str) {
                user_by_id.insert(id, user);
            }
        }
    }

    let mut mentions = Vec::new();
    if let Some(tweets) = payload.get("data").and_then(Value::as_array) {
        for tweet in tweets.iter().take(max_results) {
            let user = tweet
                .get("author_id")
                .and_then(Value::as_str)
                .and_then(|id| user_by_id.get(id));
            let username = user
                .and_then(|u| u.get("username").and_then(Value::as_str))
                .map(String::from);
            let url = match (&username, tweet.get("id").and_then(Value::as_str)) {
                (Some(username), Some(id)) => {
                    Some(format!("https://x.com/{username}/status/{id}"))
                }
                _ => None,
            };
            mentions.push(SocialMention {
                username,
                name: user
                    .and_then(|u| u.get("name").and_then(Value::as_str))
                    .map(String::from),
                text: tweet
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                created_at: tweet
                    .get("created_at")
                    .and_then(Value::as_str)
                    .map(String::from),
                url,
            });
        }
    }

    SocialIntel {
        queried_terms,
        total_results: mentions.len() as u64,
        mentions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parses_mentions_with_author_expansion() {
        let payload = json!({
            "data": [
                { "id": "111", "text": "watching this wallet", "author_id": "u1", "created_at": "2024-06-01T00:00:00Z" },
                { "id": "222", "text": "no author match", "author_id": "u9" }
            ],
            "includes": {
                "users": [ { "id": "u1", "username": "observer", "name": "Chain Observer" } ]
            }
        });

        let intel = parse_search_response(&payload, vec!["abc".to_string()], 10);
        assert_eq!(intel.total_results, 2);
        assert_eq!(intel.mentions[0].username.as_deref(), Some("observer"));
        assert_eq!(
            intel.mentions[0].url.as_deref(),
            Some("https://x.com/observer/status/111")
        );
        assert_eq!(intel.mentions[1].username, None);
        assert_eq!(intel.mentions[1].url, None);
    }

    #[test]
    fn caps_results_at_max() {
        let tweets: Vec<Value> = (0..20)
            .map(|i| json!({ "id": i.to_string(), "text": format!("t{i}") }))
            .collect();
        let payload = json!({ "data": tweets });

        let intel = parse_search_response(&payload, vec![], 5);
        assert_eq!(intel.total_results, 5);
    }

    #[test]
    fn empty_payload_yields_empty_intel() {
        let intel = parse_search_response(&json!({}), vec!["term".to_string()], 10);
        assert_eq!(intel.total_results, 0);
        assert!(intel.mentions.is_empty());
        assert_eq!(intel.queried_terms, vec!["term".to_string()]);
    }
}
