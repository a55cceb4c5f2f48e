//! Action and run status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of work an action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Fetches a revision from a version-control endpoint.
    Source,
    /// Runs a build script through an external build executor.
    Build,
    /// Suspends until an external approver responds.
    Approval,
    /// Rolls an image version out to a running service.
    Deploy,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Build => write!(f, "build"),
            Self::Approval => write!(f, "approval"),
            Self::Deploy => write!(f, "deploy"),
        }
    }
}

/// The execution status of a single action.
///
/// Actions move `NotStarted -> Running -> {Succeeded, Failed, Cancelled}`.
/// There is no retry state at this layer; retry policy belongs to the
/// external executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// The action has not been dispatched yet.
    NotStarted,
    /// The action is currently executing.
    Running,
    /// The action completed successfully.
    Succeeded,
    /// The action failed.
    Failed,
    /// The action was interrupted by run cancellation.
    Cancelled,
}

impl Default for ActionStatus {
    fn default() -> Self {
        Self::NotStarted
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl ActionStatus {
    /// Returns true if the status is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Returns true if the status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Returns true if the status indicates failure (cancellation included).
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled)
    }
}

/// The aggregate status of a stage or of a whole pipeline run.
///
/// A stage is `Succeeded` only when every action inside it succeeded, and
/// `Failed` as soon as any action failed. The same aggregation applies one
/// level up: the first failed stage fails the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Not dispatched yet.
    NotStarted,
    /// Currently executing.
    Running,
    /// Every constituent succeeded.
    Succeeded,
    /// At least one constituent failed.
    Failed,
    /// Execution was halted by operator cancellation.
    Cancelled,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self::NotStarted
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl RunStatus {
    /// Returns true if the status is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Returns true if the status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}
