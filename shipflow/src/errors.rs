//! Error types for the shipflow orchestrator.
//!
//! Every failure an action can surface maps onto one of the variants here.
//! An action error fails its stage, a stage failure fails the run, and the
//! failed action, stage, and error kind are reported on the run record.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The main error type for shipflow operations.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// Fetching a source revision failed.
    #[error("{0}")]
    SourceFetch(#[from] SourceFetchError),

    /// A build action failed.
    #[error("{0}")]
    Build(#[from] BuildError),

    /// A manual approval was rejected or timed out.
    #[error("{0}")]
    Approval(#[from] ApprovalError),

    /// A rollout to a deploy target failed.
    #[error("{0}")]
    Deploy(#[from] DeployError),

    /// The pipeline definition is invalid.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// Two actions produced an artifact with the same name in one run.
    #[error("{0}")]
    ArtifactConflict(#[from] ArtifactConflictError),

    /// An action declared an input artifact that no earlier action produced.
    #[error("missing artifact '{0}'")]
    MissingArtifact(String),

    /// An image-definition manifest could not be parsed or rendered.
    #[error("malformed image definition manifest: {0}")]
    Manifest(String),

    /// The run was cancelled by an operator.
    #[error("cancelled: {0}")]
    Cancelled(String),
}

impl PipelineError {
    /// A short machine-readable kind tag, used in run records and events.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceFetch(_) => "source_fetch",
            Self::Build(e) => match e.kind {
                BuildFailure::CompileFailure => "build.compile_failure",
                BuildFailure::PushFailure => "build.push_failure",
                BuildFailure::Timeout => "build.timeout",
            },
            Self::Approval(ApprovalError::Rejected { .. }) => "approval.rejected",
            Self::Approval(ApprovalError::Timeout { .. }) => "approval.timeout",
            Self::Deploy(e) => match e.kind {
                DeployFailure::UnhealthyTarget => "deploy.unhealthy_target",
                DeployFailure::RolloutTimeout => "deploy.rollout_timeout",
            },
            Self::Validation(_) => "validation",
            Self::ArtifactConflict(_) => "artifact_conflict",
            Self::MissingArtifact(_) => "missing_artifact",
            Self::Manifest(_) => "manifest",
            Self::Cancelled(_) => "cancelled",
        }
    }
}

/// Error raised when a source revision cannot be fetched.
#[derive(Debug, Clone, Error)]
#[error("source fetch failed for {owner}/{repository}@{branch}: {message}")]
pub struct SourceFetchError {
    /// The repository owner.
    pub owner: String,
    /// The repository name.
    pub repository: String,
    /// The branch that was requested.
    pub branch: String,
    /// Backend-supplied detail (bad revision, invalid credential, ...).
    pub message: String,
}

impl SourceFetchError {
    /// Creates a new source fetch error.
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        repository: impl Into<String>,
        branch: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repository: repository.into(),
            branch: branch.into(),
            message: message.into(),
        }
    }
}

/// The sub-kind of a build failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildFailure {
    /// A build phase command exited non-zero.
    CompileFailure,
    /// Pushing the produced image to the registry failed.
    PushFailure,
    /// The build exceeded its configured duration ceiling.
    Timeout,
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CompileFailure => write!(f, "compile failure"),
            Self::PushFailure => write!(f, "push failure"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

/// Error raised when a build action fails.
#[derive(Debug, Clone, Error)]
#[error("build failed ({kind}): {message}")]
pub struct BuildError {
    /// The failure sub-kind.
    pub kind: BuildFailure,
    /// Backend-supplied detail (command, exit code, ...).
    pub message: String,
}

impl BuildError {
    /// Creates a compile failure.
    #[must_use]
    pub fn compile_failure(message: impl Into<String>) -> Self {
        Self {
            kind: BuildFailure::CompileFailure,
            message: message.into(),
        }
    }

    /// Creates a push failure.
    #[must_use]
    pub fn push_failure(message: impl Into<String>) -> Self {
        Self {
            kind: BuildFailure::PushFailure,
            message: message.into(),
        }
    }

    /// Creates a timeout failure.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: BuildFailure::Timeout,
            message: message.into(),
        }
    }
}

/// Error raised when a manual approval gate does not approve.
#[derive(Debug, Clone, Error)]
pub enum ApprovalError {
    /// The approver rejected the request.
    #[error("approval rejected{}", reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    Rejected {
        /// Optional reason supplied by the approver.
        reason: Option<String>,
    },

    /// No response arrived before the deadline.
    #[error("approval timed out after {timeout_seconds}s")]
    Timeout {
        /// The configured deadline in seconds.
        timeout_seconds: f64,
    },
}

impl ApprovalError {
    /// Creates a rejection without a reason.
    #[must_use]
    pub fn rejected() -> Self {
        Self::Rejected { reason: None }
    }

    /// Creates a rejection with a reason.
    #[must_use]
    pub fn rejected_with_reason(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: Some(reason.into()),
        }
    }

    /// Creates a timeout from a duration.
    #[must_use]
    pub fn timed_out(timeout: std::time::Duration) -> Self {
        Self::Timeout {
            timeout_seconds: timeout.as_secs_f64(),
        }
    }
}

/// The sub-kind of a deploy failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployFailure {
    /// The target service failed its health checks during rollout.
    UnhealthyTarget,
    /// The rollout did not stabilize within the configured timeout.
    RolloutTimeout,
}

impl fmt::Display for DeployFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnhealthyTarget => write!(f, "unhealthy target"),
            Self::RolloutTimeout => write!(f, "rollout timeout"),
        }
    }
}

/// Error raised when a rollout fails.
#[derive(Debug, Clone, Error)]
#[error("deploy to '{service}' failed ({kind}): {message}")]
pub struct DeployError {
    /// The running-service handle that was targeted.
    pub service: String,
    /// The failure sub-kind.
    pub kind: DeployFailure,
    /// Backend-supplied detail.
    pub message: String,
}

impl DeployError {
    /// Creates an unhealthy-target failure.
    #[must_use]
    pub fn unhealthy_target(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            kind: DeployFailure::UnhealthyTarget,
            message: message.into(),
        }
    }

    /// Creates a rollout-timeout failure.
    #[must_use]
    pub fn rollout_timeout(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            kind: DeployFailure::RolloutTimeout,
            message: message.into(),
        }
    }
}

/// Error raised when a pipeline definition fails validation.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
}

impl PipelineValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }
}

/// Error raised when two actions produce an artifact with the same name.
#[derive(Debug, Clone, Error)]
#[error("artifact '{name}' already produced by action '{existing_producer}'")]
pub struct ArtifactConflictError {
    /// The conflicting artifact name.
    pub name: String,
    /// The action that produced it first.
    pub existing_producer: String,
}

impl ArtifactConflictError {
    /// Creates a new artifact conflict error.
    #[must_use]
    pub fn new(name: impl Into<String>, existing_producer: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            existing_producer: existing_producer.into(),
        }
    }
}
