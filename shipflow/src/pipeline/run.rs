//! Run records, run context, and the run registry.

use crate::cancellation::CancellationToken;
use crate::core::{ActionStatus, Artifact, ArtifactRetention, RunStatus};
use crate::events::{EventSink, NoOpEventSink};
use crate::stage::{ActionRecord, StageRecord};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Per-run wiring supplied by the caller: event sink, cancellation token,
/// artifact retention, and an optional registry for status queries.
#[derive(Clone)]
pub struct RunContext {
    /// The event sink lifecycle events are emitted to.
    pub events: Arc<dyn EventSink>,
    /// The operator-held cancellation token.
    pub cancel: Arc<CancellationToken>,
    /// What happens to artifact bindings when the run ends.
    pub retention: ArtifactRetention,
    /// Registry to expose this run's status through, if any.
    pub registry: Option<Arc<RunRegistry>>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    /// Creates a context with a no-op sink, a fresh token, and discard
    /// retention.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: Arc::new(NoOpEventSink),
            cancel: Arc::new(CancellationToken::new()),
            retention: ArtifactRetention::Discard,
            registry: None,
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Sets the cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, cancel: Arc<CancellationToken>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Keeps artifact bindings on the finished run record.
    #[must_use]
    pub fn retain_artifacts(mut self) -> Self {
        self.retention = ArtifactRetention::Retain;
        self
    }

    /// Registers the run in the given registry.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<RunRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("retention", &self.retention)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// The completed record of one pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// The run id.
    pub run_id: Uuid,
    /// The pipeline name.
    pub pipeline: String,
    /// The terminal run status.
    pub status: RunStatus,
    /// Per-stage records, in declaration order.
    pub stages: Vec<StageRecord>,
    /// The index of the last stage the driver entered, if any.
    pub current_stage: Option<usize>,
    /// Human-readable failure detail, when the run did not succeed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine-readable failure kind, when the run did not succeed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    /// Names of every artifact produced during the run.
    pub artifact_names: Vec<String>,
    /// Retained artifact bindings (empty under discard retention).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub artifacts: HashMap<String, Artifact>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run reached its terminal status.
    pub finished_at: DateTime<Utc>,
}

impl PipelineRun {
    /// Returns true if the run succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Looks up a stage record by name.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageRecord> {
        self.stages.iter().find(|s| s.stage == name)
    }

    /// Looks up an action's terminal status by name.
    #[must_use]
    pub fn action_status(&self, name: &str) -> Option<ActionStatus> {
        self.stages
            .iter()
            .find_map(|s| s.action(name))
            .map(|r| r.status)
    }

    /// Returns the first failed or cancelled action across all stages.
    #[must_use]
    pub fn failed_action(&self) -> Option<&ActionRecord> {
        self.stages.iter().find_map(StageRecord::first_failure)
    }

    /// Renders the run record as pretty JSON for operator surfaces.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// A live handle to a registered run.
#[derive(Debug, Clone)]
pub struct RunHandle {
    /// The run id.
    pub run_id: Uuid,
    /// The pipeline name.
    pub pipeline: String,
    status: Arc<RwLock<RunStatus>>,
    cancel: Arc<CancellationToken>,
}

impl RunHandle {
    pub(crate) fn new(
        run_id: Uuid,
        pipeline: impl Into<String>,
        status: Arc<RwLock<RunStatus>>,
        cancel: Arc<CancellationToken>,
    ) -> Self {
        Self {
            run_id,
            pipeline: pipeline.into(),
            status,
            cancel,
        }
    }

    /// Returns the run's current status.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        *self.status.read()
    }

    /// Cancels the run.
    pub fn cancel(&self, reason: impl Into<String>) {
        self.cancel.cancel(reason);
    }
}

/// Tracks in-flight and finished runs for status queries and operator
/// cancellation.
///
/// Runs do not share state through the registry; it only holds each run's
/// status cell and cancellation token.
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: RwLock<HashMap<Uuid, RunHandle>>,
}

impl RunRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, handle: RunHandle) {
        self.runs.write().insert(handle.run_id, handle);
    }

    /// Returns a run's current status.
    #[must_use]
    pub fn status(&self, run_id: Uuid) -> Option<RunStatus> {
        self.runs.read().get(&run_id).map(RunHandle::status)
    }

    /// Returns a live handle to a run.
    #[must_use]
    pub fn handle(&self, run_id: Uuid) -> Option<RunHandle> {
        self.runs.read().get(&run_id).cloned()
    }

    /// Cancels a run. Returns false if the run is unknown.
    pub fn cancel(&self, run_id: Uuid, reason: impl Into<String>) -> bool {
        if let Some(handle) = self.handle(run_id) {
            handle.cancel(reason);
            true
        } else {
            false
        }
    }

    /// Returns the ids of all registered runs.
    #[must_use]
    pub fn run_ids(&self) -> Vec<Uuid> {
        self.runs.read().keys().copied().collect()
    }

    /// Drops a run from the registry. Returns false if the run is unknown.
    pub fn remove(&self, run_id: Uuid) -> bool {
        self.runs.write().remove(&run_id).is_some()
    }

    /// Drops every run whose status is terminal, returning how many were
    /// evicted. Keeps long-lived registries bounded.
    pub fn prune_finished(&self) -> usize {
        let mut runs = self.runs.write();
        let before = runs.len();
        runs.retain(|_, handle| !handle.status().is_terminal());
        before - runs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_status_and_cancel() {
        let registry = RunRegistry::new();
        let run_id = Uuid::new_v4();
        let status = Arc::new(RwLock::new(RunStatus::Running));
        let cancel = Arc::new(CancellationToken::new());

        registry.register(RunHandle::new(run_id, "delivery", status.clone(), cancel.clone()));

        assert_eq!(registry.status(run_id), Some(RunStatus::Running));
        assert!(registry.cancel(run_id, "operator request"));
        assert!(cancel.is_cancelled());

        *status.write() = RunStatus::Cancelled;
        assert_eq!(registry.status(run_id), Some(RunStatus::Cancelled));

        assert_eq!(registry.status(Uuid::new_v4()), None);
        assert!(!registry.cancel(Uuid::new_v4(), "nope"));
    }

    #[test]
    fn test_registry_eviction() {
        let registry = RunRegistry::new();
        let running = Uuid::new_v4();
        let finished = Uuid::new_v4();
        let cancel = Arc::new(CancellationToken::new());

        registry.register(RunHandle::new(
            running,
            "delivery",
            Arc::new(RwLock::new(RunStatus::Running)),
            cancel.clone(),
        ));
        registry.register(RunHandle::new(
            finished,
            "delivery",
            Arc::new(RwLock::new(RunStatus::Succeeded)),
            cancel,
        ));

        // Pruning evicts only terminal runs.
        assert_eq!(registry.prune_finished(), 1);
        assert_eq!(registry.status(finished), None);
        assert_eq!(registry.status(running), Some(RunStatus::Running));

        assert!(registry.remove(running));
        assert!(!registry.remove(running));
        assert!(registry.run_ids().is_empty());
    }

    #[test]
    fn test_run_context_defaults() {
        let ctx = RunContext::new();
        assert_eq!(ctx.retention, ArtifactRetention::Discard);
        assert!(!ctx.cancel.is_cancelled());
        assert!(ctx.registry.is_none());
    }
}
