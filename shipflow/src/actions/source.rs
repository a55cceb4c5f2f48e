//! The source-fetch action.

use super::{Action, ActionContext, ActionOutput};
use crate::backend::SourceProvider;
use crate::config::{SourceLocation, DEFAULT_SOURCE_TIMEOUT};
use crate::core::{ActionKind, Artifact};
use crate::errors::SourceFetchError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Metadata key under which the resolved revision is recorded on the
/// produced source artifact.
pub const REVISION_METADATA_KEY: &str = "revision";

/// Fetches a named revision from a version-control endpoint and publishes
/// the fetched tree as one output artifact.
#[derive(Debug)]
pub struct SourceAction {
    name: String,
    run_order: u32,
    location: SourceLocation,
    provider: Arc<dyn SourceProvider>,
    outputs: Vec<String>,
    timeout: Duration,
}

impl SourceAction {
    /// Creates a source action producing an artifact named `source`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        location: SourceLocation,
        provider: Arc<dyn SourceProvider>,
    ) -> Self {
        Self {
            name: name.into(),
            run_order: 1,
            location,
            provider,
            outputs: vec!["source".to_string()],
            timeout: DEFAULT_SOURCE_TIMEOUT,
        }
    }

    /// Renames the output artifact.
    #[must_use]
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.outputs = vec![output.into()];
        self
    }

    /// Sets the run-order tie-break.
    #[must_use]
    pub fn with_run_order(mut self, run_order: u32) -> Self {
        self.run_order = run_order;
        self
    }

    /// Sets the fetch timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Action for SourceAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Source
    }

    fn run_order(&self) -> u32 {
        self.run_order
    }

    fn outputs(&self) -> &[String] {
        &self.outputs
    }

    async fn execute(&self, ctx: &ActionContext) -> ActionOutput {
        debug!(action = %self.name, location = %self.location, "fetching source");

        let fetch = tokio::time::timeout(self.timeout, self.provider.fetch(&self.location));

        tokio::select! {
            () = ctx.cancel.cancelled() => {
                ActionOutput::cancelled(
                    ctx.cancel.reason().unwrap_or_else(|| "run cancelled".to_string()),
                )
            }
            result = fetch => match result {
                Ok(Ok(snapshot)) => {
                    let artifact = Artifact::new(&self.outputs[0], &self.name, snapshot.tree)
                        .with_metadata(REVISION_METADATA_KEY, snapshot.revision);
                    ActionOutput::succeeded(vec![artifact])
                }
                Ok(Err(err)) => ActionOutput::failed(err),
                Err(_) => ActionOutput::failed(SourceFetchError::new(
                    &self.location.owner,
                    &self.location.repository,
                    &self.location.branch,
                    format!("fetch timed out after {}s", self.timeout.as_secs()),
                )),
            }
        }
    }
}
