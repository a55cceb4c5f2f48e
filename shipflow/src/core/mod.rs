//! Core data model: statuses, artifacts, and the image-definition manifest.

mod artifact;
mod manifest;
mod status;

pub use artifact::{Artifact, ArtifactLocation, ArtifactRetention, ArtifactStore};
pub use manifest::{parse_manifest, render_manifest, ImageDefinition};
pub use status::{ActionKind, ActionStatus, RunStatus};
