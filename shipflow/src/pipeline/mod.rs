//! Pipeline assembly and the run driver.
//!
//! A pipeline is an ordered sequence of stages. The driver executes stages
//! strictly in order: stage N+1 never starts before stage N reaches a
//! terminal status, and the first failed stage fails the run without
//! invoking the remaining stages.

mod builder;
mod delivery;
mod run;

#[cfg(test)]
mod integration_tests;

pub use builder::PipelineBuilder;
pub use delivery::{DeliveryPipelineBuilder, IMAGE_DEFINITIONS_ARTIFACT, SOURCE_ARTIFACT};
pub use run::{PipelineRun, RunContext, RunHandle, RunRegistry};

use crate::actions::ActionContext;
use crate::core::{ArtifactRetention, ArtifactStore, RunStatus};
use crate::stage::{Stage, StageRecord};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// An ordered sequence of stages driven to a terminal run status.
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    stages: Vec<Stage>,
}

impl Pipeline {
    pub(crate) fn new(name: impl Into<String>, stages: Vec<Stage>) -> Self {
        Self {
            name: name.into(),
            stages,
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Returns the stages, in execution order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Executes the pipeline once and returns the completed run record.
    ///
    /// Each run owns its artifact store; concurrent runs of the same
    /// pipeline share nothing.
    pub async fn run(&self, ctx: &RunContext) -> PipelineRun {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let store = Arc::new(ArtifactStore::new());
        let status_cell = Arc::new(RwLock::new(RunStatus::Running));

        if let Some(registry) = &ctx.registry {
            registry.register(run::RunHandle::new(
                run_id,
                &self.name,
                status_cell.clone(),
                ctx.cancel.clone(),
            ));
        }

        info!(pipeline = %self.name, %run_id, "run started");
        ctx.events
            .emit(
                "pipeline.started",
                Some(serde_json::json!({
                    "pipeline": self.name,
                    "run_id": run_id,
                })),
            )
            .await;

        let action_ctx =
            ActionContext::new(run_id, store.clone(), ctx.cancel.clone(), ctx.events.clone());

        let mut records: Vec<StageRecord> =
            self.stages.iter().map(StageRecord::not_started).collect();
        let mut status = RunStatus::Running;
        let mut current_stage = None;
        let mut error = None;
        let mut error_kind = None;

        for (idx, stage) in self.stages.iter().enumerate() {
            if ctx.cancel.is_cancelled() {
                status = RunStatus::Cancelled;
                error = ctx.cancel.reason();
                error_kind = Some("cancelled".to_string());
                break;
            }

            current_stage = Some(idx);
            ctx.events.try_emit(
                "stage.started",
                Some(serde_json::json!({
                    "pipeline": self.name,
                    "run_id": run_id,
                    "stage": stage.name(),
                })),
            );

            let record = stage.execute(&action_ctx).await;
            let stage_event = match record.status {
                RunStatus::Succeeded => "stage.completed",
                RunStatus::Cancelled => "stage.cancelled",
                _ => "stage.failed",
            };
            ctx.events.try_emit(
                stage_event,
                Some(serde_json::json!({
                    "pipeline": self.name,
                    "run_id": run_id,
                    "stage": stage.name(),
                    "status": record.status,
                })),
            );

            let stage_status = record.status;
            let failure = record.first_failure().map(|action| {
                (
                    format!(
                        "stage '{}' action '{}': {}",
                        record.stage,
                        action.action,
                        action.error.as_deref().unwrap_or("failed")
                    ),
                    action.error_kind.clone(),
                )
            });
            records[idx] = record;

            match stage_status {
                RunStatus::Succeeded => {}
                RunStatus::Cancelled => {
                    status = RunStatus::Cancelled;
                    error = ctx
                        .cancel
                        .reason()
                        .or_else(|| failure.as_ref().map(|(msg, _)| msg.clone()));
                    error_kind = Some("cancelled".to_string());
                    break;
                }
                _ => {
                    status = RunStatus::Failed;
                    if let Some((msg, kind)) = failure {
                        error = Some(msg);
                        error_kind = kind;
                    }
                    break;
                }
            }
        }

        if status == RunStatus::Running {
            status = RunStatus::Succeeded;
        }
        *status_cell.write() = status;

        let run_event = match status {
            RunStatus::Succeeded => "pipeline.succeeded",
            RunStatus::Cancelled => "pipeline.cancelled",
            _ => "pipeline.failed",
        };
        ctx.events
            .emit(
                run_event,
                Some(serde_json::json!({
                    "pipeline": self.name,
                    "run_id": run_id,
                    "status": status,
                    "error": error,
                })),
            )
            .await;
        info!(pipeline = %self.name, %run_id, %status, "run finished");

        let artifact_names = {
            let mut names = store.names();
            names.sort();
            names
        };
        let artifacts = match ctx.retention {
            ArtifactRetention::Retain => store.snapshot(),
            ArtifactRetention::Discard => {
                store.discard();
                HashMap::new()
            }
        };

        PipelineRun {
            run_id,
            pipeline: self.name.clone(),
            status,
            stages: records,
            current_stage,
            error,
            error_kind,
            artifact_names,
            artifacts,
            started_at,
            finished_at: Utc::now(),
        }
    }
}
