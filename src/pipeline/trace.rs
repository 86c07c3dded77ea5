//! Per-request stage trace recording.
//!
//! [`TraceRecorder::begin`] hands out a [`StageGuard`] whose completion
//! methods record the terminal trace entry. A guard dropped without explicit
//! completion records a failure, so no exit path (success, non-fatal failure,
//! fatal abort, timeout, panic unwind) leaves a stage untraced.

use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::model::{StageName, StageOutcome, TraceEntry};

/// Collects one trace entry per stage attempt for a single request.
#[derive(Debug, Default)]
pub struct TraceRecorder {
    entries: Mutex<Vec<TraceEntry>>,
}

impl TraceRecorder {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start timing a stage.
    pub fn begin(&self, stage: StageName) -> StageGuard<'_> {
        StageGuard {
            recorder: self,
            stage,
            started_at: Utc::now(),
            started: Instant::now(),
            completed: false,
        }
    }

    /// Snapshot the entries recorded so far.
    #[must_use]
    pub fn entries(&self) -> Vec<TraceEntry> {
        self.entries.lock().clone()
    }

    fn record(&self, entry: TraceEntry) {
        self.entries.lock().push(entry);
    }
}

/// In-flight stage timer. Complete it with exactly one of [`success`],
/// [`skipped`], or [`failed`]; dropping it uncompleted records a failure.
///
/// [`success`]: StageGuard::success
/// [`skipped`]: StageGuard::skipped
/// [`failed`]: StageGuard::failed
#[derive(Debug)]
pub struct StageGuard<'a> {
    recorder: &'a TraceRecorder,
    stage: StageName,
    started_at: DateTime<Utc>,
    started: Instant,
    completed: bool,
}

impl StageGuard<'_> {
    /// Record a successful stage completion.
    pub fn success(mut self, detail: Option<String>) -> TraceEntry {
        self.complete(StageOutcome::Success, detail)
    }

    /// Record an intentionally skipped stage.
    pub fn skipped(mut self, reason: impl Into<String>) -> TraceEntry {
        self.complete(StageOutcome::Skipped, Some(reason.into()))
    }

    /// Record a failed stage attempt.
    pub fn failed(mut self, error: impl Into<String>) -> TraceEntry {
        self.complete(StageOutcome::Failed, Some(error.into()))
    }

    fn complete(&mut self, outcome: StageOutcome, detail: Option<String>) -> TraceEntry {
        self.completed = true;
        let entry = TraceEntry {
            stage: self.stage,
            started_at: self.started_at,
            duration_ms: self.started.elapsed().as_millis() as u64,
            outcome,
            detail,
        };
        self.recorder.record(entry.clone());
        entry
    }
}

impl Drop for StageGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.complete(
                StageOutcome::Failed,
                Some("stage aborted before completion".to_string()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn success_records_one_entry() {
        let recorder = TraceRecorder::new();
        let entry = recorder
            .begin(StageName::Fetch)
            .success(Some("42 signatures".to_string()));

        assert_eq!(entry.stage, StageName::Fetch);
        assert_eq!(entry.outcome, StageOutcome::Success);

        let entries = recorder.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0], entry);
    }

    #[test]
    fn skipped_and_failed_record_their_detail() {
        let recorder = TraceRecorder::new();
        recorder.begin(StageName::Social).skipped("disabled");
        recorder.begin(StageName::Narrative).failed("Unauthorized");

        let entries = recorder.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].outcome, StageOutcome::Skipped);
        assert_eq!(entries[0].detail.as_deref(), Some("disabled"));
        assert_eq!(entries[1].outcome, StageOutcome::Failed);
        assert_eq!(entries[1].detail.as_deref(), Some("Unauthorized"));
    }

    #[test]
    fn dropped_guard_records_a_failure() {
        let recorder = TraceRecorder::new();
        {
            let _guard = recorder.begin(StageName::Fetch);
            // dropped without completion (e.g. cancelled future)
        }

        let entries = recorder.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome, StageOutcome::Failed);
        assert_eq!(
            entries[0].detail.as_deref(),
            Some("stage aborted before completion")
        );
    }

    #[test]
    fn completed_guard_does_not_double_record_on_drop() {
        let recorder = TraceRecorder::new();
        recorder.begin(StageName::Metrics).success(None);
        assert_eq!(recorder.entries().len(), 1);
    }
}
