//! The containerized build action.

use super::{Action, ActionContext, ActionOutput};
use crate::backend::BuildExecutor;
use crate::config::BuildConfig;
use crate::core::{ActionKind, Artifact};
use crate::errors::BuildError;
use crate::script::BuildScript;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Runs a build script through an external build executor.
///
/// The action consumes one source artifact, hands the script and the
/// explicit [`BuildConfig`] to the executor, and promotes the declared
/// output files as artifacts. A build that overruns the configured ceiling
/// fails with a timeout; partial outputs of a failed build are never
/// promoted.
#[derive(Debug)]
pub struct BuildAction {
    name: String,
    run_order: u32,
    script: BuildScript,
    config: BuildConfig,
    executor: Arc<dyn BuildExecutor>,
    inputs: Vec<String>,
    outputs: Vec<String>,
}

impl BuildAction {
    /// Creates a build action.
    ///
    /// The produced artifact names default to the script's declared output
    /// files.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        script: BuildScript,
        config: BuildConfig,
        executor: Arc<dyn BuildExecutor>,
    ) -> Self {
        let outputs = script.output_files.clone();
        Self {
            name: name.into(),
            run_order: 1,
            script,
            config,
            executor,
            inputs: vec!["source".to_string()],
            outputs,
        }
    }

    /// Renames the consumed source artifact.
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

    /// Returns the build configuration.
    #[must_use]
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }
}

#[async_trait]
impl Action for BuildAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Build
    }

    fn run_order(&self) -> u32 {
        self.run_order
    }

    fn inputs(&self) -> &[String] {
        &self.inputs
    }

    fn outputs(&self) -> &[String] {
        &self.outputs
    }

    async fn execute(&self, ctx: &ActionContext) -> ActionOutput {
        let source = match ctx.input(&self.inputs[0]) {
            Ok(artifact) => artifact,
            Err(err) => return ActionOutput::failed(err),
        };

        debug!(
            action = %self.name,
            commands = self.script.command_count(),
            timeout_secs = self.config.timeout.as_secs(),
            "starting build"
        );

        let run = tokio::time::timeout(
            self.config.timeout,
            self.executor.run(&self.script, &self.config, &source),
        );

        let outputs = tokio::select! {
            () = ctx.cancel.cancelled() => {
                return ActionOutput::cancelled(
                    ctx.cancel.reason().unwrap_or_else(|| "run cancelled".to_string()),
                );
            }
            result = run => match result {
                Ok(Ok(outputs)) => outputs,
                Ok(Err(err)) => return ActionOutput::failed(err),
                Err(_) => {
                    return ActionOutput::failed(BuildError::timeout(format!(
                        "build exceeded {}s ceiling",
                        self.config.timeout.as_secs()
                    )));
                }
            }
        };

        // Every declared output file must exist after the final phase.
        let mut artifacts = Vec::with_capacity(self.outputs.len());
        for declared in &self.outputs {
            match outputs.files.get(declared) {
                Some(location) => {
                    let mut artifact =
                        Artifact::new(declared, &self.name, location.clone());
                    if let Some(version) = &self.config.source_version {
                        artifact = artifact.with_metadata("source_version", version);
                    }
                    artifacts.push(artifact);
                }
                None => {
                    return ActionOutput::failed(BuildError::compile_failure(format!(
                        "declared output file '{declared}' missing after final phase"
                    )));
                }
            }
        }

        ActionOutput::succeeded(artifacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;
    use crate::core::{ActionStatus, ArtifactLocation, ArtifactStore};
    use crate::events::NoOpEventSink;
    use crate::testing::ScriptedBuildExecutor;
    use std::time::Duration;
    use uuid::Uuid;

    fn context_with_source() -> ActionContext {
        let store = Arc::new(ArtifactStore::new());
        store
            .put(Artifact::new("source", "fetch", ArtifactLocation::inline_text("tree")))
            .unwrap();
        ActionContext::new(
            Uuid::new_v4(),
            store,
            Arc::new(CancellationToken::new()),
            Arc::new(NoOpEventSink),
        )
    }

    fn docker_script() -> BuildScript {
        BuildScript::new()
            .build("docker build -t $ecr:$tag .")
            .build("docker push $ecr:$tag")
            .output_file("imagedefinitions.json")
    }

    #[tokio::test]
    async fn test_successful_build_promotes_declared_outputs() {
        let executor = Arc::new(ScriptedBuildExecutor::succeeding([(
            "imagedefinitions.json",
            br#"[{"name":"app","imageUri":"registry/repo:abc123"}]"#.to_vec(),
        )]));
        let action = BuildAction::new(
            "docker-build",
            docker_script(),
            BuildConfig::new("registry/repo").with_source_version("abc123"),
            executor,
        );

        let output = action.execute(&context_with_source()).await;
        assert!(output.is_success());
        assert_eq!(output.artifacts.len(), 1);
        assert_eq!(output.artifacts[0].name, "imagedefinitions.json");
        assert_eq!(output.artifacts[0].metadata("source_version"), Some("abc123"));
    }

    #[tokio::test]
    async fn test_push_failure_is_surfaced() {
        let executor = Arc::new(ScriptedBuildExecutor::failing(BuildError::push_failure(
            "docker push exited with 1",
        )));
        let action = BuildAction::new(
            "docker-build",
            docker_script(),
            BuildConfig::new("registry/repo"),
            executor,
        );

        let output = action.execute(&context_with_source()).await;
        assert_eq!(output.status, ActionStatus::Failed);
        assert_eq!(output.error.map(|e| e.kind()), Some("build.push_failure"));
        assert!(output.artifacts.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_ceiling() {
        let executor = Arc::new(
            ScriptedBuildExecutor::succeeding([("imagedefinitions.json", b"[]".to_vec())])
                .with_delay(Duration::from_secs(5)),
        );
        let action = BuildAction::new(
            "docker-build",
            docker_script(),
            BuildConfig::new("registry/repo").with_timeout(Duration::from_millis(20)),
            executor,
        );

        let output = action.execute(&context_with_source()).await;
        assert_eq!(output.status, ActionStatus::Failed);
        assert_eq!(output.error.map(|e| e.kind()), Some("build.timeout"));
    }

    #[tokio::test]
    async fn test_missing_declared_output_fails() {
        // Executor reports success but never produced the declared file.
        let executor = Arc::new(ScriptedBuildExecutor::succeeding([(
            "other.json",
            b"{}".to_vec(),
        )]));
        let action = BuildAction::new(
            "docker-build",
            docker_script(),
            BuildConfig::new("registry/repo"),
            executor,
        );

        let output = action.execute(&context_with_source()).await;
        assert_eq!(output.status, ActionStatus::Failed);
        assert_eq!(output.error.map(|e| e.kind()), Some("build.compile_failure"));
    }

    #[tokio::test]
    async fn test_missing_source_artifact_fails() {
        let executor = Arc::new(ScriptedBuildExecutor::succeeding([(
            "imagedefinitions.json",
            b"[]".to_vec(),
        )]));
        let action = BuildAction::new(
            "docker-build",
            docker_script(),
            BuildConfig::new("registry/repo"),
            executor,
        );

        let ctx = ActionContext::new(
            Uuid::new_v4(),
            Arc::new(ArtifactStore::new()),
            Arc::new(CancellationToken::new()),
            Arc::new(NoOpEventSink),
        );
        let output = action.execute(&ctx).await;
        assert_eq!(output.status, ActionStatus::Failed);
        assert_eq!(output.error.map(|e| e.kind()), Some("missing_artifact"));
    }

    #[tokio::test]
    async fn test_cancel_discards_partial_outputs() {
        let executor = Arc::new(
            ScriptedBuildExecutor::succeeding([("imagedefinitions.json", b"[]".to_vec())])
                .with_delay(Duration::from_secs(5)),
        );
        let action = BuildAction::new(
            "docker-build",
            docker_script(),
            BuildConfig::new("registry/repo"),
            executor,
        );

        let ctx = context_with_source();
        let cancel = ctx.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel("operator request");
        });

        let output = action.execute(&ctx).await;
        assert_eq!(output.status, ActionStatus::Cancelled);
        assert!(output.artifacts.is_empty());
    }
}
