//! The deploy action: orchestrated rollout of a built image version.

use super::{Action, ActionContext, ActionOutput};
use crate::backend::DeployTarget;
use crate::config::DeployConfig;
use crate::core::{parse_manifest, ActionKind};
use crate::errors::{DeployError, PipelineError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Parses an image-definition manifest artifact and instructs the deploy
/// target to roll the listed images out to the configured service.
#[derive(Debug)]
pub struct DeployAction {
    name: String,
    run_order: u32,
    config: DeployConfig,
    target: Arc<dyn DeployTarget>,
    inputs: Vec<String>,
}

impl DeployAction {
    /// Creates a deploy action consuming the `imagedefinitions.json`
    /// artifact.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        config: DeployConfig,
        target: Arc<dyn DeployTarget>,
    ) -> Self {
        Self {
            name: name.into(),
            run_order: 1,
            config,
            target,
            inputs: vec!["imagedefinitions.json".to_string()],
        }
    }

    /// Renames the consumed manifest artifact.
    #[must_use]
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.inputs = vec![input.into()];
        self
    }

    /// Sets the run-order tie-break.
    #[must_use]
    pub fn with_run_order(mut self, run_order: u32) -> Self {
        self.run_order = run_order;
        self
    }
}

#[async_trait]
impl Action for DeployAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Deploy
    }

    fn run_order(&self) -> u32 {
        self.run_order
    }

    fn inputs(&self) -> &[String] {
        &self.inputs
    }

    async fn execute(&self, ctx: &ActionContext) -> ActionOutput {
        let manifest = match ctx.input(&self.inputs[0]) {
            Ok(artifact) => artifact,
            Err(err) => return ActionOutput::failed(err),
        };

        let Some(bytes) = manifest.location.as_bytes() else {
            return ActionOutput::failed(PipelineError::Manifest(format!(
                "artifact '{}' has no inline manifest content",
                manifest.name
            )));
        };

        let images = match parse_manifest(bytes) {
            Ok(images) => images,
            Err(err) => return ActionOutput::failed(err),
        };

        debug!(
            action = %self.name,
            service = %self.config.service,
            images = images.len(),
            "starting rollout"
        );

        let rollout = tokio::time::timeout(
            self.config.timeout,
            self.target.roll_out(&self.config, &images),
        );

        tokio::select! {
            () = ctx.cancel.cancelled() => {
                ActionOutput::cancelled(
                    ctx.cancel.reason().unwrap_or_else(|| "run cancelled".to_string()),
                )
            }
            result = rollout => match result {
                Ok(Ok(())) => ActionOutput::succeeded(Vec::new()),
                Ok(Err(err)) => ActionOutput::failed(err),
                Err(_) => ActionOutput::failed(DeployError::rollout_timeout(
                    &self.config.service,
                    format!("rollout did not stabilize within {}s", self.config.timeout.as_secs()),
                )),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;
    use crate::core::{ActionStatus, Artifact, ArtifactLocation, ArtifactStore, ImageDefinition};
    use crate::events::NoOpEventSink;
    use crate::testing::RecordingDeployTarget;
    use std::time::Duration;
    use uuid::Uuid;

    fn context_with_manifest(bytes: &[u8]) -> ActionContext {
        let store = Arc::new(ArtifactStore::new());
        store
            .put(Artifact::new(
                "imagedefinitions.json",
                "docker-build",
                ArtifactLocation::Inline(bytes.to_vec()),
            ))
            .unwrap();
        ActionContext::new(
            Uuid::new_v4(),
            store,
            Arc::new(CancellationToken::new()),
            Arc::new(NoOpEventSink),
        )
    }

    #[tokio::test]
    async fn test_rollout_receives_parsed_manifest() {
        let target = Arc::new(RecordingDeployTarget::new());
        let action = DeployAction::new("roll-out", DeployConfig::new("sentinel"), target.clone());

        let ctx =
            context_with_manifest(br#"[{"name":"app","imageUri":"registry/repo:abc123"}]"#);
        let output = action.execute(&ctx).await;
        assert!(output.is_success());

        let rollouts = target.rollouts();
        assert_eq!(rollouts.len(), 1);
        assert_eq!(rollouts[0].0, "sentinel");
        assert_eq!(
            rollouts[0].1,
            vec![ImageDefinition::new("app", "registry/repo:abc123")]
        );
    }

    #[tokio::test]
    async fn test_unhealthy_target() {
        let target = Arc::new(RecordingDeployTarget::new().with_failure(
            DeployError::unhealthy_target("sentinel", "0/2 tasks healthy"),
        ));
        let action = DeployAction::new("roll-out", DeployConfig::new("sentinel"), target);

        let ctx = context_with_manifest(b"[]");
        let output = action.execute(&ctx).await;
        assert_eq!(output.status, ActionStatus::Failed);
        assert_eq!(output.error.map(|e| e.kind()), Some("deploy.unhealthy_target"));
    }

    #[tokio::test]
    async fn test_rollout_timeout() {
        let target = Arc::new(RecordingDeployTarget::new().with_delay(Duration::from_secs(5)));
        let action = DeployAction::new(
            "roll-out",
            DeployConfig::new("sentinel").with_timeout(Duration::from_millis(20)),
            target,
        );

        let ctx = context_with_manifest(b"[]");
        let output = action.execute(&ctx).await;
        assert_eq!(output.status, ActionStatus::Failed);
        assert_eq!(output.error.map(|e| e.kind()), Some("deploy.rollout_timeout"));
    }

    #[tokio::test]
    async fn test_malformed_manifest_never_reaches_target() {
        let target = Arc::new(RecordingDeployTarget::new());
        let action = DeployAction::new("roll-out", DeployConfig::new("sentinel"), target.clone());

        let ctx = context_with_manifest(b"not json");
        let output = action.execute(&ctx).await;
        assert_eq!(output.status, ActionStatus::Failed);
        assert_eq!(output.error.map(|e| e.kind()), Some("manifest"));
        assert!(target.rollouts().is_empty());
    }
}
