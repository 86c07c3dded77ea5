//! Datadog log-intake trace shipper.
//!
//! Ships finalized traces + report summaries out-of-band. Strictly
//! best-effort: the orchestrator fires this from a spawned task and only logs
//! failures.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use super::{ReportShipment, ShipError, TraceShipper};
use crate::config::ShippingConfig;

/// Trace shipper backed by the Datadog v2 log intake.
pub struct DatadogShipper {
    client: Client,
    url: String,
    api_key: String,
    service: String,
    tags: String,
}

impl DatadogShipper {
    /// Create a new shipper. `timeout` bounds each intake call.
    #[must_use]
    pub fn new(config: &ShippingConfig, api_key: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            url: format!("https://http-intake.logs.{}/api/v2/logs", config.site),
            api_key,
            service: config.service.clone(),
            tags: format!("env:{},version:{}", config.env, config.version),
        }
    }
}

#[async_trait]
impl TraceShipper for DatadogShipper {
    async fn ship(&self, shipment: &ReportShipment) -> Result<(), ShipError> {
        let payload = json!([{
            "ddsource": "recon-gateway",
            "service": self.service,
            "ddtags": self.tags,
            "hostname": "recon-gateway",
            "timestamp": Utc::now().to_rfc3339(),
            "message": "wallet_report_completed",
            "wallet": shipment.wallet,
            "trace": shipment.trace,
            "metrics": shipment.metrics,
            "social_results": shipment.social_results,
        }]);

        let response = self
            .client
            .post(&self.url)
            .header("DD-API-KEY", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ShipError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ShipError(format!("log intake returned HTTP {status}")));
        }

        debug!(wallet = %shipment.wallet, "Shipped report trace");
        Ok(())
    }
}
