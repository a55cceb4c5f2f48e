//! The build script contract: shell commands grouped into named phases.

use crate::errors::PipelineValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named build phase, executed in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildPhase {
    /// Runs before the main build (login, dependency fetch).
    PreBuild,
    /// The main build (compile, image build, push).
    Build,
    /// Runs after the main build (manifest rendering, cleanup).
    PostBuild,
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreBuild => write!(f, "pre_build"),
            Self::Build => write!(f, "build"),
            Self::PostBuild => write!(f, "post_build"),
        }
    }
}

/// An ordered list of shell-invocable commands grouped into phases.
///
/// The external build executor runs the phases in order and stops at the
/// first command that exits non-zero. The declared output files must exist
/// after the final phase; they become the build action's artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildScript {
    /// Commands for the `pre_build` phase.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_build: Vec<String>,
    /// Commands for the `build` phase.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build: Vec<String>,
    /// Commands for the `post_build` phase.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_build: Vec<String>,
    /// Files that must exist after the final phase.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_files: Vec<String>,
}

impl BuildScript {
    /// Creates an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a `pre_build` command.
    #[must_use]
    pub fn pre_build(mut self, command: impl Into<String>) -> Self {
        self.pre_build.push(command.into());
        self
    }

    /// Appends a `build` command.
    #[must_use]
    pub fn build(mut self, command: impl Into<String>) -> Self {
        self.build.push(command.into());
        self
    }

    /// Appends a `post_build` command.
    #[must_use]
    pub fn post_build(mut self, command: impl Into<String>) -> Self {
        self.post_build.push(command.into());
        self
    }

    /// Declares an output file.
    #[must_use]
    pub fn output_file(mut self, path: impl Into<String>) -> Self {
        self.output_files.push(path.into());
        self
    }

    /// Iterates over the phases in execution order.
    pub fn phases(&self) -> impl Iterator<Item = (BuildPhase, &[String])> {
        [
            (BuildPhase::PreBuild, self.pre_build.as_slice()),
            (BuildPhase::Build, self.build.as_slice()),
            (BuildPhase::PostBuild, self.post_build.as_slice()),
        ]
        .into_iter()
    }

    /// Returns the total number of commands across all phases.
    #[must_use]
    pub fn command_count(&self) -> usize {
        self.pre_build.len() + self.build.len() + self.post_build.len()
    }

    /// Validates the script.
    ///
    /// # Errors
    ///
    /// Returns an error if the script has no commands.
    pub fn validate(&self) -> Result<(), PipelineValidationError> {
        if self.command_count() == 0 {
            return Err(PipelineValidationError::new(
                "build script has no commands",
            ));
        }
        Ok(())
    }
}
