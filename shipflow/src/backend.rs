//! Trait seams to the provisioning backend.
//!
//! The orchestrator does not implement compute allocation, registry storage,
//! build execution, or service rollout. Those concerns live behind these
//! traits. Every call may be slow (seconds to tens of minutes); actions wrap
//! each call in a caller-supplied timeout and race it against the run's
//! cancellation token, so implementations only need to be honest about
//! success and failure.

use crate::config::{BuildConfig, DeployConfig, SourceLocation};
use crate::core::{Artifact, ArtifactLocation, ImageDefinition};
use crate::errors::{BuildError, DeployError, SourceFetchError};
use crate::script::BuildScript;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;

/// A file-tree snapshot fetched from a version-control endpoint.
#[derive(Debug, Clone)]
pub struct SourceSnapshot {
    /// The resolved revision (commit id) of the fetched tree.
    pub revision: String,
    /// Where the fetched tree lives.
    pub tree: ArtifactLocation,
}

impl SourceSnapshot {
    /// Creates a new snapshot.
    #[must_use]
    pub fn new(revision: impl Into<String>, tree: ArtifactLocation) -> Self {
        Self {
            revision: revision.into(),
            tree,
        }
    }
}

/// Files produced by a successful build, keyed by declared output path.
#[derive(Debug, Clone, Default)]
pub struct BuildOutputs {
    /// Produced files by declared path.
    pub files: HashMap<String, ArtifactLocation>,
}

impl BuildOutputs {
    /// Creates an empty output set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a produced file.
    #[must_use]
    pub fn file(mut self, path: impl Into<String>, location: ArtifactLocation) -> Self {
        self.files.insert(path.into(), location);
        self
    }
}

/// Fetches revisions from a version-control endpoint.
#[async_trait]
pub trait SourceProvider: Send + Sync + Debug {
    /// Fetches a snapshot of the given location's branch head.
    ///
    /// # Errors
    ///
    /// Returns an error if the revision or credential is invalid.
    async fn fetch(&self, location: &SourceLocation) -> Result<SourceSnapshot, SourceFetchError>;
}

/// Runs build scripts on external build infrastructure.
#[async_trait]
pub trait BuildExecutor: Send + Sync + Debug {
    /// Runs the script phases in order under the given configuration.
    ///
    /// The first command that exits non-zero fails the build. On success the
    /// declared output files must all be present in the returned outputs.
    ///
    /// # Errors
    ///
    /// Returns an error describing the failed command or push.
    async fn run(
        &self,
        script: &BuildScript,
        config: &BuildConfig,
        source: &Artifact,
    ) -> Result<BuildOutputs, BuildError>;
}

/// Rolls image versions out to a running service.
#[async_trait]
pub trait DeployTarget: Send + Sync + Debug {
    /// Performs a rolling update of the configured service to the given
    /// image definitions.
    ///
    /// # Errors
    ///
    /// Returns an error if the target is unhealthy or the rollout fails.
    async fn roll_out(
        &self,
        config: &DeployConfig,
        images: &[ImageDefinition],
    ) -> Result<(), DeployError>;
}
