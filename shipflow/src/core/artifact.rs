//! Artifacts and the per-run artifact store.

use crate::errors::ArtifactConflictError;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A reference to the location where an artifact's bytes live.
///
/// The orchestrator never interprets artifact contents beyond what an
/// individual action needs (the deploy action parses the image-definition
/// manifest); everything else is an opaque handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum ArtifactLocation {
    /// Bytes held directly in the run's store.
    Inline(Vec<u8>),
    /// A path into a build workspace shared with the external executor.
    Path(String),
    /// A URI into an external object store.
    Uri(String),
}

impl ArtifactLocation {
    /// Creates an inline location from UTF-8 text.
    #[must_use]
    pub fn inline_text(text: impl Into<String>) -> Self {
        Self::Inline(text.into().into_bytes())
    }

    /// Returns the inline bytes, if the location is inline.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Inline(bytes) => Some(bytes),
            Self::Path(_) | Self::Uri(_) => None,
        }
    }
}

/// A named handle to a blob or file tree produced by one action.
///
/// Artifact names are unique within a pipeline run: each artifact is produced
/// by exactly one action and consumed by zero or more downstream actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// The artifact name, unique within a run.
    pub name: String,
    /// The action that produced this artifact.
    pub produced_by: String,
    /// Where the produced bytes live.
    pub location: ArtifactLocation,
    /// Additional string metadata (e.g. the resolved source revision).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    /// When the artifact was produced.
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    /// Creates a new artifact.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        produced_by: impl Into<String>,
        location: ArtifactLocation,
    ) -> Self {
        Self {
            name: name.into(),
            produced_by: produced_by.into(),
            location,
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Looks up a metadata entry.
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// Retention policy for a run's artifact bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArtifactRetention {
    /// Artifacts are dropped when the run reaches a terminal state.
    #[default]
    Discard,
    /// Artifacts are kept on the finished run record.
    Retain,
}

/// The per-run artifact registry.
///
/// A run owns its store exclusively; nothing is shared across runs of the
/// same pipeline. Writes enforce the produce-once invariant.
#[derive(Debug, Default)]
pub struct ArtifactStore {
    bindings: RwLock<HashMap<String, Artifact>>,
}

impl ArtifactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a produced artifact.
    ///
    /// # Errors
    ///
    /// Returns an error if an artifact with the same name was already
    /// produced during this run.
    pub fn put(&self, artifact: Artifact) -> Result<(), ArtifactConflictError> {
        let mut bindings = self.bindings.write();
        if let Some(existing) = bindings.get(&artifact.name) {
            return Err(ArtifactConflictError::new(
                &artifact.name,
                &existing.produced_by,
            ));
        }
        bindings.insert(artifact.name.clone(), artifact);
        Ok(())
    }

    /// Looks up an artifact by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Artifact> {
        self.bindings.read().get(name).cloned()
    }

    /// Returns the registered artifact names.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.bindings.read().keys().cloned().collect()
    }

    /// Returns the number of registered artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.read().len()
    }

    /// Returns true if no artifacts are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.read().is_empty()
    }

    /// Takes a snapshot of all bindings.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, Artifact> {
        self.bindings.read().clone()
    }

    /// Drops all bindings, returning how many were held.
    pub fn discard(&self) -> usize {
        let mut bindings = self.bindings.write();
        let count = bindings.len();
        bindings.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_creation() {
        let artifact = Artifact::new(
            "source",
            "fetch-main",
            ArtifactLocation::inline_text("tree"),
        )
        .with_metadata("revision", "abc123");

        assert_eq!(artifact.name, "source");
        assert_eq!(artifact.produced_by, "fetch-main");
        assert_eq!(artifact.metadata("revision"), Some("abc123"));
        assert_eq!(artifact.location.as_bytes(), Some(b"tree".as_ref()));
    }

    #[test]
    fn test_non_inline_location_has_no_bytes() {
        let location = ArtifactLocation::Uri("s3://bucket/key".to_string());
        assert!(location.as_bytes().is_none());
    }

    #[test]
    fn test_store_put_and_get() {
        let store = ArtifactStore::new();
        store
            .put(Artifact::new("source", "fetch", ArtifactLocation::inline_text("x")))
            .unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("source").unwrap().produced_by, "fetch");
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn test_store_rejects_duplicate_producer() {
        let store = ArtifactStore::new();
        store
            .put(Artifact::new("source", "fetch-a", ArtifactLocation::inline_text("x")))
            .unwrap();

        let err = store
            .put(Artifact::new("source", "fetch-b", ArtifactLocation::inline_text("y")))
            .unwrap_err();
        assert_eq!(err.name, "source");
        assert_eq!(err.existing_producer, "fetch-a");
    }

    #[test]
    fn test_store_discard() {
        let store = ArtifactStore::new();
        store
            .put(Artifact::new("a", "p", ArtifactLocation::inline_text("x")))
            .unwrap();
        store
            .put(Artifact::new("b", "p", ArtifactLocation::inline_text("y")))
            .unwrap();

        assert_eq!(store.discard(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_artifact_serialization() {
        let artifact = Artifact::new("m", "build", ArtifactLocation::inline_text("[]"));
        let json = serde_json::to_string(&artifact).unwrap();
        let parsed: Artifact = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.name, artifact.name);
        assert_eq!(parsed.location, artifact.location);
    }
}
