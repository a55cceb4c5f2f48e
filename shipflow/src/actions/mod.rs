//! Actions: the units of work stages are made of.
//!
//! Each action declares its kind, its run-order, and the artifacts it
//! consumes and produces, and implements a single `execute` contract:
//! given the run's artifact bindings, return a terminal status plus any
//! produced artifacts.

mod approval;
mod build;
mod deploy;
mod source;

pub use approval::{ApprovalAction, ApprovalDecision, ApprovalGate, PendingRequest};
pub use build::BuildAction;
pub use deploy::DeployAction;
pub use source::{SourceAction, REVISION_METADATA_KEY};

use crate::cancellation::CancellationToken;
use crate::core::{ActionKind, ActionStatus, Artifact, ArtifactStore};
use crate::errors::PipelineError;
use crate::events::EventSink;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use uuid::Uuid;

/// Run-scoped context handed to each executing action.
#[derive(Clone)]
pub struct ActionContext {
    /// The pipeline run this action belongs to.
    pub run_id: Uuid,
    /// The run's artifact bindings.
    pub artifacts: Arc<ArtifactStore>,
    /// The run's cancellation token.
    pub cancel: Arc<CancellationToken>,
    /// The run's event sink.
    pub events: Arc<dyn EventSink>,
}

impl ActionContext {
    /// Creates a new context.
    #[must_use]
    pub fn new(
        run_id: Uuid,
        artifacts: Arc<ArtifactStore>,
        cancel: Arc<CancellationToken>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            run_id,
            artifacts,
            cancel,
            events,
        }
    }

    /// Resolves a declared input artifact.
    ///
    /// # Errors
    ///
    /// Returns an error if no earlier action produced the artifact.
    pub fn input(&self, name: &str) -> Result<Artifact, PipelineError> {
        self.artifacts
            .get(name)
            .ok_or_else(|| PipelineError::MissingArtifact(name.to_string()))
    }
}

impl Debug for ActionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionContext")
            .field("run_id", &self.run_id)
            .field("artifacts", &self.artifacts.names())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// The terminal result of one action execution.
#[derive(Debug)]
pub struct ActionOutput {
    /// The terminal status.
    pub status: ActionStatus,
    /// Artifacts produced (empty unless the action succeeded).
    pub artifacts: Vec<Artifact>,
    /// The error, when the action failed.
    pub error: Option<PipelineError>,
}

impl ActionOutput {
    /// Creates a successful output.
    #[must_use]
    pub fn succeeded(artifacts: Vec<Artifact>) -> Self {
        Self {
            status: ActionStatus::Succeeded,
            artifacts,
            error: None,
        }
    }

    /// Creates a failed output.
    ///
    /// Failed actions never promote artifacts; partial outputs are
    /// discarded.
    #[must_use]
    pub fn failed(error: impl Into<PipelineError>) -> Self {
        Self {
            status: ActionStatus::Failed,
            artifacts: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Creates a cancelled output.
    #[must_use]
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Cancelled,
            artifacts: Vec::new(),
            error: Some(PipelineError::Cancelled(reason.into())),
        }
    }

    /// Returns true if the action succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Trait for pipeline actions.
#[async_trait]
pub trait Action: Send + Sync + Debug {
    /// Returns the action name, unique within its pipeline.
    fn name(&self) -> &str;

    /// Returns the kind of work this action performs.
    fn kind(&self) -> ActionKind;

    /// Returns the run-order tie-break within the enclosing stage.
    ///
    /// Lower runs first; actions sharing a run-order may run concurrently.
    fn run_order(&self) -> u32 {
        1
    }

    /// Returns the names of the artifacts this action consumes.
    fn inputs(&self) -> &[String] {
        &[]
    }

    /// Returns the names of the artifacts this action produces.
    fn outputs(&self) -> &[String] {
        &[]
    }

    /// Executes the action to a terminal status.
    async fn execute(&self, ctx: &ActionContext) -> ActionOutput;
}
