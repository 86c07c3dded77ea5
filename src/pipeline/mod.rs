//! Pipeline orchestration.
//!
//! The [`Orchestrator`] sequences the pipeline stages — fetch, metrics,
//! intelligence, social enrichment, narrative — applying the timeout and
//! degradation policy at every stage boundary:
//!
//! - The fetch stage is **fatal**: without transactions no partial report is
//!   meaningful, so the pipeline aborts.
//! - Social and narrative are **non-fatal**: a failure is traced, the stage
//!   result is marked unavailable, and the pipeline continues. Metrics and
//!   intelligence are the guaranteed payload of every successful report.
//!
//! Both consumption modes share one execution plan: the streaming mode yields
//! the plan's progress events directly over SSE, the blocking mode drains the
//! same plan and returns its terminal report. Dropping the stream cancels the
//! in-flight stage; no background work outlives a disconnected client.

pub mod intel;
pub mod metrics;
pub mod trace;

use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use futures::{Stream, StreamExt, pin_mut};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::adapter::{
    ChainFetcher, NarrativeModel, ReportShipment, ResearchContext, SocialSearch, TraceShipper,
};
use crate::config::PipelineConfig;
use crate::model::{
    IntelligenceGraph, ProgressEvent, Report, StageName, StagePayload, StageResult, TraceEntry,
    WalletRequest,
};
use crate::{Error, Result};
use trace::TraceRecorder;

/// How many funding edges feed the social search terms.
const SOCIAL_TERMS_PER_EDGE: usize = 2;

/// An optional pipeline stage: either an installed adapter or a recorded
/// reason why the stage will be skipped.
#[derive(Clone)]
enum OptionalStage<T> {
    Enabled(T),
    Disabled { reason: String },
}

/// Internal plan item: progress events plus one typed terminal result, so the
/// blocking mode keeps the full error type while the streaming mode maps it
/// to a wire event.
enum PlanItem {
    Progress(ProgressEvent),
    Completed(Box<Report>),
    Aborted { stage: StageName, error: Error },
}

/// Sequences pipeline stages over the configured adapters.
///
/// Construction wires in the chain fetcher (mandatory) and optionally the
/// social, narrative, and shipping adapters; per request the orchestrator
/// builds an isolated execution context, so instances are cheap to clone and
/// safe to share across concurrent requests.
#[derive(Clone)]
pub struct Orchestrator {
    config: PipelineConfig,
    chain: Arc<dyn ChainFetcher>,
    social: OptionalStage<Arc<dyn SocialSearch>>,
    social_max_results: u32,
    narrative: OptionalStage<Arc<dyn NarrativeModel>>,
    shipper: Option<Arc<dyn TraceShipper>>,
}

impl Orchestrator {
    /// Create an orchestrator with both optional stages disabled.
    #[must_use]
    pub fn new(config: PipelineConfig, chain: Arc<dyn ChainFetcher>) -> Self {
        Self {
            config,
            chain,
            social: OptionalStage::Disabled {
                reason: "social enrichment disabled".to_string(),
            },
            social_max_results: 10,
            narrative: OptionalStage::Disabled {
                reason: "narrative generation disabled".to_string(),
            },
            shipper: None,
        }
    }

    /// Enable the social enrichment stage.
    #[must_use]
    pub fn with_social(mut self, adapter: Arc<dyn SocialSearch>, max_results: u32) -> Self {
        self.social = OptionalStage::Enabled(adapter);
        self.social_max_results = max_results;
        self
    }

    /// Record why the social stage is off (configuration vs missing
    /// credentials) so the skip is self-describing.
    #[must_use]
    pub fn without_social(mut self, reason: impl Into<String>) -> Self {
        self.social = OptionalStage::Disabled {
            reason: reason.into(),
        };
        self
    }

    /// Enable the narrative stage.
    #[must_use]
    pub fn with_narrative(mut self, adapter: Arc<dyn NarrativeModel>) -> Self {
        self.narrative = OptionalStage::Enabled(adapter);
        self
    }

    /// Record why the narrative stage is off.
    #[must_use]
    pub fn without_narrative(mut self, reason: impl Into<String>) -> Self {
        self.narrative = OptionalStage::Disabled {
            reason: reason.into(),
        };
        self
    }

    /// Install a best-effort trace shipper, fired after each finished report.
    #[must_use]
    pub fn with_shipper(mut self, shipper: Arc<dyn TraceShipper>) -> Self {
        self.shipper = Some(shipper);
        self
    }

    /// Blocking mode: drain the execution plan and return the terminal report.
    pub async fn run(&self, request: WalletRequest) -> Result<Report> {
        let plan = self.clone().plan(request);
        pin_mut!(plan);

        while let Some(item) = plan.next().await {
            match item {
                PlanItem::Progress(_) => {}
                PlanItem::Completed(report) => return Ok(*report),
                PlanItem::Aborted { error, .. } => return Err(error),
            }
        }

        Err(Error::Internal(
            "pipeline ended without a terminal result".to_string(),
        ))
    }

    /// Streaming mode: a lazy sequence of progress events, one per stage,
    /// terminated by exactly one `Completed` or `Aborted` event.
    pub fn stream(&self, request: WalletRequest) -> impl Stream<Item = ProgressEvent> + Send + use<> {
        self.clone().plan(request).map(|item| match item {
            PlanItem::Progress(event) => event,
            PlanItem::Completed(report) => ProgressEvent::Completed { report },
            PlanItem::Aborted { stage, error } => ProgressEvent::Aborted {
                stage,
                retryable: error.is_retryable(),
                error: error.to_string(),
            },
        })
    }

    /// The shared execution plan.
    fn plan(self, request: WalletRequest) -> impl Stream<Item = PlanItem> + Send {
        stream! {
            let recorder = TraceRecorder::new();
            let wallet = request.wallet.clone();

            // 1. Validate the signature limit against the configured ceiling.
            let limit = match self.effective_limit(&request) {
                Ok(limit) => limit,
                Err(error) => {
                    yield PlanItem::Aborted { stage: StageName::Fetch, error };
                    return;
                }
            };

            // 2. Fetch stage - fatal on error or timeout.
            let guard = recorder.begin(StageName::Fetch);
            let fetched = match timeout(
                self.config.stage_timeout,
                self.chain.fetch(&wallet, limit),
            )
            .await
            {
                Ok(Ok(records)) => {
                    let entry = guard.success(Some(format!("{} signatures", records.len())));
                    info!(wallet = %wallet, signatures = records.len(), "Chain fetch completed");
                    yield PlanItem::Progress(stage_event(
                        &entry,
                        Some(StagePayload::Fetched { signature_count: records.len() as u64 }),
                    ));
                    records
                }
                Ok(Err(source)) => {
                    let entry = guard.failed(source.to_string());
                    warn!(wallet = %wallet, error = %source, "Chain fetch failed, aborting pipeline");
                    yield PlanItem::Progress(stage_event(&entry, None));
                    yield PlanItem::Aborted {
                        stage: StageName::Fetch,
                        error: Error::FatalFetch { source },
                    };
                    return;
                }
                Err(_) => {
                    let source = crate::adapter::FetchError::Unreachable(timeout_detail(
                        self.config.stage_timeout,
                    ));
                    let entry = guard.failed(source.to_string());
                    warn!(wallet = %wallet, "Chain fetch timed out, aborting pipeline");
                    yield PlanItem::Progress(stage_event(&entry, None));
                    yield PlanItem::Aborted {
                        stage: StageName::Fetch,
                        error: Error::FatalFetch { source },
                    };
                    return;
                }
            };

            // 3. Pure analysis stages - no failure mode, empty input included.
            let guard = recorder.begin(StageName::Metrics);
            let quick_metrics = metrics::compute(&wallet, &fetched);
            let entry = guard.success(None);
            yield PlanItem::Progress(stage_event(
                &entry,
                Some(StagePayload::Metrics(quick_metrics.clone())),
            ));

            let guard = recorder.begin(StageName::Intelligence);
            let graph = intel::build(&wallet, &fetched);
            let entry = guard.success(None);
            yield PlanItem::Progress(stage_event(
                &entry,
                Some(StagePayload::Intelligence(graph.clone())),
            ));

            // Transactions are no longer needed past this point.
            drop(fetched);

            // 4. Social enrichment - optional, non-fatal.
            let social = match &self.social {
                OptionalStage::Disabled { reason } => {
                    let entry = recorder.begin(StageName::Social).skipped(reason.clone());
                    yield PlanItem::Progress(stage_event(&entry, None));
                    StageResult::Skipped { reason: reason.clone() }
                }
                OptionalStage::Enabled(adapter) => {
                    let guard = recorder.begin(StageName::Social);
                    let terms = social_terms(&wallet, &graph);
                    match timeout(
                        self.config.stage_timeout,
                        adapter.search(&terms, self.social_max_results),
                    )
                    .await
                    {
                        Ok(Ok(intel)) => {
                            let entry = guard.success(Some(format!(
                                "{} mentions over {} terms",
                                intel.total_results,
                                intel.queried_terms.len()
                            )));
                            yield PlanItem::Progress(stage_event(
                                &entry,
                                Some(StagePayload::Social(intel.clone())),
                            ));
                            StageResult::Ran { value: intel }
                        }
                        Ok(Err(e)) => {
                            let entry = guard.failed(e.to_string());
                            warn!(wallet = %wallet, error = %e, "Social enrichment unavailable");
                            yield PlanItem::Progress(stage_event(&entry, None));
                            StageResult::Unavailable { error: e.to_string() }
                        }
                        Err(_) => {
                            let detail = timeout_detail(self.config.stage_timeout);
                            let entry = guard.failed(detail.clone());
                            warn!(wallet = %wallet, "Social enrichment timed out");
                            yield PlanItem::Progress(stage_event(&entry, None));
                            StageResult::Unavailable { error: detail }
                        }
                    }
                }
            };

            // 5. Narrative - optional, non-fatal; uses whatever is available.
            let narrative = match &self.narrative {
                OptionalStage::Disabled { reason } => {
                    let entry = recorder.begin(StageName::Narrative).skipped(reason.clone());
                    yield PlanItem::Progress(stage_event(&entry, None));
                    StageResult::Skipped { reason: reason.clone() }
                }
                OptionalStage::Enabled(adapter) => {
                    let guard = recorder.begin(StageName::Narrative);
                    let context = ResearchContext {
                        wallet: &wallet,
                        metrics: &quick_metrics,
                        intelligence: &graph,
                        social: social.value(),
                    };
                    match timeout(self.config.stage_timeout, adapter.analyze(&context)).await {
                        Ok(Ok(analysis)) => {
                            let entry = guard.success(Some(format!("model={}", analysis.model)));
                            yield PlanItem::Progress(stage_event(
                                &entry,
                                Some(StagePayload::Narrative(analysis.clone())),
                            ));
                            StageResult::Ran { value: analysis }
                        }
                        Ok(Err(e)) => {
                            let entry = guard.failed(e.to_string());
                            warn!(wallet = %wallet, error = %e, "Narrative generation failed");
                            yield PlanItem::Progress(stage_event(&entry, None));
                            StageResult::Unavailable { error: e.to_string() }
                        }
                        Err(_) => {
                            let detail = timeout_detail(self.config.stage_timeout);
                            let entry = guard.failed(detail.clone());
                            warn!(wallet = %wallet, "Narrative generation timed out");
                            yield PlanItem::Progress(stage_event(&entry, None));
                            StageResult::Unavailable { error: detail }
                        }
                    }
                }
            };

            // 6. Finalize and ship.
            let report = Report {
                wallet: wallet.clone(),
                metrics: quick_metrics,
                intelligence: graph,
                social,
                narrative,
                trace: recorder.entries(),
            };
            self.ship(&report);
            info!(wallet = %wallet, stages = report.trace.len(), "Wallet report completed");

            yield PlanItem::Completed(Box::new(report));
        }
    }

    /// Resolve and clamp the signature limit for a request.
    fn effective_limit(&self, request: &WalletRequest) -> Result<u32> {
        match request.max_signatures {
            Some(0) => Err(Error::InvalidRequest(
                "max_signatures must be positive".to_string(),
            )),
            Some(limit) => Ok(limit.min(self.config.max_signatures)),
            None => Ok(self.config.default_signatures),
        }
    }

    /// Fire-and-forget trace shipping; failures are logged, never surfaced.
    fn ship(&self, report: &Report) {
        let Some(shipper) = self.shipper.clone() else {
            return;
        };
        let shipment = ReportShipment {
            wallet: report.wallet.clone(),
            completed_at: chrono::Utc::now(),
            trace: report.trace.clone(),
            metrics: report.metrics.clone(),
            social_results: report
                .social
                .value()
                .map_or(0, |intel| intel.total_results),
        };
        tokio::spawn(async move {
            if let Err(e) = shipper.ship(&shipment).await {
                debug!(wallet = %shipment.wallet, error = %e, "Trace shipping failed");
            }
        });
    }
}

/// Build the social search terms: the wallet itself plus its strongest
/// funding edges in both directions.
fn social_terms(wallet: &str, graph: &IntelligenceGraph) -> Vec<String> {
    let mut terms = vec![wallet.to_string()];
    terms.extend(
        graph
            .likely_funders
            .iter()
            .take(SOCIAL_TERMS_PER_EDGE)
            .map(|e| e.wallet.clone()),
    );
    terms.extend(
        graph
            .funded_wallets
            .iter()
            .take(SOCIAL_TERMS_PER_EDGE)
            .map(|e| e.wallet.clone()),
    );
    terms
}

fn stage_event(entry: &TraceEntry, payload: Option<StagePayload>) -> ProgressEvent {
    ProgressEvent::Stage {
        stage: entry.stage,
        outcome: entry.outcome,
        duration_ms: entry.duration_ms,
        detail: entry.detail.clone(),
        payload,
    }
}

fn timeout_detail(limit: Duration) -> String {
    format!("stage timed out after {}s", limit.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FundingEdge;
    use pretty_assertions::assert_eq;

    fn edge(wallet: &str) -> FundingEdge {
        FundingEdge {
            wallet: wallet.to_string(),
            total_sol: 1.0,
            transfers: 1,
        }
    }

    #[test]
    fn social_terms_combine_wallet_and_strongest_edges() {
        let graph = IntelligenceGraph {
            first_seen_at: None,
            last_seen_at: None,
            unique_counterparties: 5,
            likely_funders: vec![edge("F1"), edge("F2"), edge("F3")],
            funded_wallets: vec![edge("D1")],
            linked_wallets: vec![],
            program_usage: std::collections::BTreeMap::new(),
            known_labels: vec![],
            inferred_entities: vec![],
        };

        let terms = social_terms("WalletX", &graph);
        assert_eq!(terms, vec!["WalletX", "F1", "F2", "D1"]);
    }

    #[test]
    fn timeout_detail_names_the_limit() {
        assert_eq!(
            timeout_detail(Duration::from_secs(25)),
            "stage timed out after 25s"
        );
    }
}
