//! HTTP transport: routing, request validation, SSE framing.
//!
//! Owns everything the pipeline core does not: wallet format validation,
//! status-code mapping, and the SSE envelope around progress events. The
//! core only produces logical [`ProgressEvent`]/[`Report`] values.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::{Stream, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::adapter::{BedrockClient, DatadogShipper, SolanaRpcFetcher, XSearchClient};
use crate::config::Config;
use crate::model::{ProgressEvent, Report, WalletRequest};
use crate::pipeline::Orchestrator;
use crate::{Error, Result};

/// Interval between SSE keep-alive pings.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The pipeline orchestrator shared by both endpoints
    pub orchestrator: Arc<Orchestrator>,
}

/// Wire an [`Orchestrator`] from configuration: the chain fetcher is always
/// installed; social, narrative, and shipping only when enabled and
/// credentialed. Missing credentials become a self-describing skip reason,
/// never a crash.
#[must_use]
pub fn orchestrator_from_config(config: &Config) -> Orchestrator {
    let timeout = config.pipeline.stage_timeout;
    let chain = Arc::new(SolanaRpcFetcher::new(&config.solana, timeout));

    let mut orchestrator = Orchestrator::new(config.pipeline.clone(), chain);

    orchestrator = match (
        config.social.enabled,
        config.social.bearer_token.as_deref().filter(|t| !t.is_empty()),
    ) {
        (false, _) => orchestrator.without_social("social enrichment disabled"),
        (true, None) => orchestrator.without_social("no social search credentials configured"),
        (true, Some(token)) => orchestrator.with_social(
            Arc::new(XSearchClient::new(token.to_string(), timeout)),
            config.social.max_results,
        ),
    };

    orchestrator = match (
        config.narrative.enabled,
        config.narrative.api_key.as_deref().filter(|k| !k.is_empty()),
    ) {
        (false, _) => orchestrator.without_narrative("narrative generation disabled"),
        (true, None) => orchestrator.without_narrative("no narrative API key configured"),
        (true, Some(key)) => orchestrator.with_narrative(Arc::new(BedrockClient::new(
            &config.narrative,
            key.to_string(),
            timeout,
        ))),
    };

    if config.shipping.enabled {
        if let Some(key) = config.shipping.api_key.as_deref().filter(|k| !k.is_empty()) {
            orchestrator = orchestrator.with_shipper(Arc::new(DatadogShipper::new(
                &config.shipping,
                key.to_string(),
                timeout,
            )));
        } else {
            warn!("Trace shipping enabled but no API key configured, skipping");
        }
    }

    orchestrator
}

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/wallet/report", post(report_handler))
        .route("/v1/wallet/report/stream", post(report_stream_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until ctrl-c.
pub async fn serve(config: &Config) -> Result<()> {
    let addr = SocketAddr::new(
        config
            .server
            .host
            .parse()
            .map_err(|e| Error::Config(format!("Invalid host: {e}")))?,
        config.server.port,
    );

    let state = AppState {
        orchestrator: Arc::new(orchestrator_from_config(config)),
    };
    let router = create_router(state);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Recon gateway listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "Failed to install ctrl-c handler");
    }
    info!("Shutdown signal received");
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// POST /v1/wallet/report - blocking mode.
async fn report_handler(
    State(state): State<AppState>,
    Json(request): Json<WalletRequest>,
) -> Response {
    if let Err(e) = validate_wallet(&request.wallet) {
        return error_response(&e);
    }

    match state.orchestrator.run(request).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// POST /v1/wallet/report/stream - streaming mode over SSE.
async fn report_stream_handler(
    State(state): State<AppState>,
    Json(request): Json<WalletRequest>,
) -> Response {
    if let Err(e) = validate_wallet(&request.wallet) {
        return error_response(&e);
    }

    let stream = sse_events(state.orchestrator.stream(request));
    Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("ping"))
        .into_response()
}

/// Frame progress events for SSE. The event name mirrors the variant so
/// clients can subscribe without parsing payloads.
fn sse_events(
    events: impl Stream<Item = ProgressEvent> + Send,
) -> impl Stream<Item = std::result::Result<Event, Infallible>> + Send {
    events.map(|event| {
        let name = match &event {
            ProgressEvent::Stage { .. } => "stage",
            ProgressEvent::Completed { .. } => "report",
            ProgressEvent::Aborted { .. } => "error",
        };
        Ok(Event::default()
            .event(name)
            .data(serde_json::to_string(&event).unwrap_or_default()))
    })
}

/// Reject anything that is not plausibly a base58 Solana address before the
/// pipeline runs.
fn validate_wallet(wallet: &str) -> Result<()> {
    const BASE58: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
    if wallet.len() < 32 || wallet.len() > 44 || !wallet.chars().all(|c| BASE58.contains(c)) {
        return Err(Error::InvalidRequest(
            "Invalid Solana wallet format".to_string(),
        ));
    }
    Ok(())
}

fn error_response(error: &Error) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(json!({
            "error": error.to_string(),
            "retryable": error.is_retryable(),
        })),
    )
        .into_response()
}

/// Used by the one-shot CLI path, which shares the blocking mode.
pub async fn run_once(config: &Config, request: WalletRequest) -> Result<Report> {
    validate_wallet(&request.wallet)?;
    let orchestrator = orchestrator_from_config(config);
    orchestrator.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plausible_solana_addresses() {
        assert!(validate_wallet("9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM").is_ok());
        assert!(validate_wallet("11111111111111111111111111111111").is_ok());
    }

    #[test]
    fn rejects_bad_addresses() {
        // too short
        assert!(validate_wallet("abc").is_err());
        // 0, O, I, l are not in the base58 alphabet
        assert!(validate_wallet("0OIl111111111111111111111111111111111111").is_err());
        // too long
        assert!(validate_wallet(&"1".repeat(45)).is_err());
    }

    #[test]
    fn invalid_request_maps_to_400() {
        let err = validate_wallet("nope").unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(!err.is_retryable());
    }
}
