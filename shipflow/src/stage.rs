//! Stages: ordered groups of actions gating progression to the next stage.

use crate::actions::{Action, ActionContext};
use crate::core::{ActionKind, ActionStatus, RunStatus};
use crate::errors::PipelineError;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// The recorded outcome of one action within a stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    /// The action name.
    pub action: String,
    /// The action kind.
    pub kind: ActionKind,
    /// The action's run-order band.
    pub run_order: u32,
    /// The action status.
    pub status: ActionStatus,
    /// Error message, when the action failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine-readable error kind, when the action failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    /// Wall-clock duration, when the action was dispatched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
}

impl ActionRecord {
    fn not_started(action: &dyn Action) -> Self {
        Self {
            action: action.name().to_string(),
            kind: action.kind(),
            run_order: action.run_order(),
            status: ActionStatus::NotStarted,
            error: None,
            error_kind: None,
            duration_ms: None,
        }
    }
}

/// The recorded outcome of one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    /// The stage name.
    pub stage: String,
    /// The aggregate stage status.
    pub status: RunStatus,
    /// Per-action records, in declaration order.
    pub actions: Vec<ActionRecord>,
}

impl StageRecord {
    /// Creates a record with every action not started.
    #[must_use]
    pub fn not_started(stage: &Stage) -> Self {
        Self {
            stage: stage.name().to_string(),
            status: RunStatus::NotStarted,
            actions: stage
                .actions
                .iter()
                .map(|a| ActionRecord::not_started(a.as_ref()))
                .collect(),
        }
    }

    /// Looks up an action record by name.
    #[must_use]
    pub fn action(&self, name: &str) -> Option<&ActionRecord> {
        self.actions.iter().find(|r| r.action == name)
    }

    /// Returns the first failed or cancelled action, if any.
    #[must_use]
    pub fn first_failure(&self) -> Option<&ActionRecord> {
        self.actions.iter().find(|r| r.status.is_failure())
    }
}

/// Aggregates action statuses into a stage status.
///
/// Failed takes precedence over Cancelled: a stage with a genuinely failed
/// action reports Failed even when cancellation also interrupted it.
#[must_use]
pub fn aggregate_actions(statuses: &[ActionStatus]) -> RunStatus {
    if statuses.iter().any(|s| *s == ActionStatus::Failed) {
        RunStatus::Failed
    } else if statuses.iter().any(|s| *s == ActionStatus::Cancelled) {
        RunStatus::Cancelled
    } else if !statuses.is_empty() && statuses.iter().all(|s| *s == ActionStatus::Succeeded) {
        RunStatus::Succeeded
    } else if statuses.iter().any(|s| *s == ActionStatus::Running) {
        RunStatus::Running
    } else {
        RunStatus::NotStarted
    }
}

/// An ordered group of actions executed in run-order bands.
///
/// Actions sharing a run-order run concurrently; a higher band starts only
/// after every action in the lower bands reached a terminal status. The
/// stage completes Succeeded only when every action succeeded.
#[derive(Debug, Clone)]
pub struct Stage {
    name: String,
    actions: Vec<Arc<dyn Action>>,
}

impl Stage {
    /// Creates an empty stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
        }
    }

    /// Appends an action.
    #[must_use]
    pub fn action(mut self, action: Arc<dyn Action>) -> Self {
        self.actions.push(action);
        self
    }

    /// Returns the stage name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the actions, in declaration order.
    #[must_use]
    pub fn actions(&self) -> &[Arc<dyn Action>] {
        &self.actions
    }

    /// Executes the stage's run-order bands to a terminal stage status.
    pub async fn execute(&self, ctx: &ActionContext) -> StageRecord {
        let mut record = StageRecord::not_started(self);
        record.status = RunStatus::Running;

        // Band actions by run-order, lowest first.
        let mut bands: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (idx, action) in self.actions.iter().enumerate() {
            bands.entry(action.run_order()).or_default().push(idx);
        }

        for (run_order, indices) in bands {
            if ctx.cancel.is_cancelled() {
                record.status = RunStatus::Cancelled;
                return record;
            }

            debug!(stage = %self.name, run_order, actions = indices.len(), "dispatching band");

            let mut futures = Vec::with_capacity(indices.len());
            for &idx in &indices {
                let action = &self.actions[idx];
                record.actions[idx].status = ActionStatus::Running;
                ctx.events.try_emit(
                    "action.started",
                    Some(serde_json::json!({
                        "stage": self.name,
                        "action": action.name(),
                        "kind": action.kind().to_string(),
                        "run_order": run_order,
                    })),
                );
                futures.push(async move {
                    let started = Instant::now();
                    let output = action.execute(ctx).await;
                    (started.elapsed(), output)
                });
            }

            let outputs = join_all(futures).await;

            for (&idx, (elapsed, output)) in indices.iter().zip(outputs) {
                let entry = &mut record.actions[idx];
                entry.duration_ms = Some(elapsed.as_secs_f64() * 1000.0);
                entry.status = output.status;
                if let Some(err) = &output.error {
                    entry.error = Some(err.to_string());
                    entry.error_kind = Some(err.kind().to_string());
                }

                if output.status == ActionStatus::Succeeded {
                    for artifact in output.artifacts {
                        if let Err(conflict) = ctx.artifacts.put(artifact) {
                            let err = PipelineError::from(conflict);
                            entry.status = ActionStatus::Failed;
                            entry.error = Some(err.to_string());
                            entry.error_kind = Some(err.kind().to_string());
                            break;
                        }
                    }
                }

                let event = match entry.status {
                    ActionStatus::Succeeded => "action.completed",
                    ActionStatus::Cancelled => "action.cancelled",
                    _ => "action.failed",
                };
                ctx.events.try_emit(
                    event,
                    Some(serde_json::json!({
                        "stage": self.name,
                        "action": entry.action,
                        "status": entry.status,
                        "error": entry.error,
                    })),
                );
            }

            // A failed or cancelled band halts the stage; later bands stay
            // NotStarted.
            let band_statuses: Vec<ActionStatus> =
                indices.iter().map(|&idx| record.actions[idx].status).collect();
            match aggregate_actions(&band_statuses) {
                RunStatus::Failed => {
                    record.status = RunStatus::Failed;
                    return record;
                }
                RunStatus::Cancelled => {
                    record.status = RunStatus::Cancelled;
                    return record;
                }
                _ => {}
            }
        }

        let statuses: Vec<ActionStatus> = record.actions.iter().map(|r| r.status).collect();
        record.status = aggregate_actions(&statuses);
        record
    }
}
