//! The image-definition manifest exchanged between build and deploy actions.

use crate::errors::PipelineError;
use serde::{Deserialize, Serialize};

/// One entry of an image-definition manifest.
///
/// The wire format is the small JSON document
/// `[{"name": <container-name>, "imageUri": <registry-uri>}]` that a build
/// action writes and a deploy action reads to know which running container
/// to update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDefinition {
    /// The container name inside the target service.
    pub name: String,
    /// The full registry URI (including tag) to roll out.
    #[serde(rename = "imageUri")]
    pub image_uri: String,
}

impl ImageDefinition {
    /// Creates a new image definition.
    #[must_use]
    pub fn new(name: impl Into<String>, image_uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image_uri: image_uri.into(),
        }
    }
}

/// Renders a manifest to its JSON wire form.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render_manifest(images: &[ImageDefinition]) -> Result<Vec<u8>, PipelineError> {
    serde_json::to_vec(images).map_err(|e| PipelineError::Manifest(e.to_string()))
}

/// Parses a manifest from its JSON wire form.
///
/// # Errors
///
/// Returns an error if the bytes are not a valid manifest document.
pub fn parse_manifest(bytes: &[u8]) -> Result<Vec<ImageDefinition>, PipelineError> {
    serde_json::from_slice(bytes).map_err(|e| PipelineError::Manifest(e.to_string()))
}
