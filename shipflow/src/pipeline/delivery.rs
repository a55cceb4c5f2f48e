//! The standard delivery topology: source, build, optional approval,
//! optional deploy.
//!
//! One configurable builder replaces copy-pasted pipeline variants: the
//! optional stages are selected by what the caller wires in, yielding
//! Build-only, Build+Deploy, or Build+Approval+Deploy pipelines from the
//! same code path.

use super::{Pipeline, PipelineBuilder};
use crate::actions::{ApprovalAction, ApprovalGate, BuildAction, DeployAction, SourceAction};
use crate::backend::{BuildExecutor, DeployTarget, SourceProvider};
use crate::config::{ApprovalPolicy, BuildConfig, DeployConfig, SourceLocation};
use crate::errors::PipelineValidationError;
use crate::script::BuildScript;
use crate::stage::Stage;
use std::sync::Arc;

/// The artifact name the source stage publishes.
pub const SOURCE_ARTIFACT: &str = "source";

/// The manifest artifact name the build stage publishes and the deploy
/// stage consumes.
pub const IMAGE_DEFINITIONS_ARTIFACT: &str = "imagedefinitions.json";

/// Builder for the standard delivery pipeline.
pub struct DeliveryPipelineBuilder {
    name: String,
    source: Option<(SourceLocation, Arc<dyn SourceProvider>)>,
    build: Option<(BuildScript, BuildConfig, Arc<dyn BuildExecutor>)>,
    approval: Option<(ApprovalPolicy, Arc<ApprovalGate>)>,
    deploy: Option<(DeployConfig, Arc<dyn DeployTarget>)>,
}

impl DeliveryPipelineBuilder {
    /// Creates a builder for a named pipeline.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: None,
            build: None,
            approval: None,
            deploy: None,
        }
    }

    /// Wires the source stage.
    #[must_use]
    pub fn source(mut self, location: SourceLocation, provider: Arc<dyn SourceProvider>) -> Self {
        self.source = Some((location, provider));
        self
    }

    /// Wires the build stage.
    #[must_use]
    pub fn build_stage(
        mut self,
        script: BuildScript,
        config: BuildConfig,
        executor: Arc<dyn BuildExecutor>,
    ) -> Self {
        self.build = Some((script, config, executor));
        self
    }

    /// Wires the optional manual-approval gate before deploy.
    #[must_use]
    pub fn approval(mut self, policy: ApprovalPolicy, gate: Arc<ApprovalGate>) -> Self {
        self.approval = Some((policy, gate));
        self
    }

    /// Wires the optional deploy stage.
    #[must_use]
    pub fn deploy(mut self, config: DeployConfig, target: Arc<dyn DeployTarget>) -> Self {
        self.deploy = Some((config, target));
        self
    }

    /// Assembles the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if source or build is missing, the build script is
    /// empty, or an approval gate is configured without a deploy stage.
    pub fn assemble(self) -> Result<Pipeline, PipelineValidationError> {
        let (location, provider) = self
            .source
            .ok_or_else(|| PipelineValidationError::new("delivery pipeline needs a source stage"))?;
        let (script, config, executor) = self
            .build
            .ok_or_else(|| PipelineValidationError::new("delivery pipeline needs a build stage"))?;
        script.validate()?;

        if self.approval.is_some() && self.deploy.is_none() {
            return Err(PipelineValidationError::new(
                "approval gate configured without a deploy stage",
            )
            .with_stages(vec!["Approve".to_string()]));
        }

        // The deploy stage consumes the first declared build output.
        let manifest_artifact = script
            .output_files
            .first()
            .cloned()
            .unwrap_or_else(|| IMAGE_DEFINITIONS_ARTIFACT.to_string());

        let mut builder = PipelineBuilder::new(self.name)
            .stage(Stage::new("Source").action(Arc::new(
                SourceAction::new("fetch-source", location, provider).with_output(SOURCE_ARTIFACT),
            )))?
            .stage(Stage::new("Build").action(Arc::new(
                BuildAction::new("container-build", script, config, executor)
                    .with_input(SOURCE_ARTIFACT),
            )))?;

        if let Some((policy, gate)) = self.approval {
            builder = builder.stage(
                Stage::new("Approve").action(Arc::new(ApprovalAction::new(
                    "gate-deploy",
                    policy,
                    gate,
                ))),
            )?;
        }

        if let Some((config, target)) = self.deploy {
            builder = builder.stage(
                Stage::new("Deploy").action(Arc::new(
                    DeployAction::new("rollout", config, target).with_input(manifest_artifact),
                )),
            )?;
        }

        builder.build()
    }
}

impl std::fmt::Debug for DeliveryPipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryPipelineBuilder")
            .field("name", &self.name)
            .field("has_source", &self.source.is_some())
            .field("has_build", &self.build.is_some())
            .field("has_approval", &self.approval.is_some())
            .field("has_deploy", &self.deploy.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingDeployTarget, ScriptedBuildExecutor, StaticSourceProvider};

    fn wired(name: &str) -> DeliveryPipelineBuilder {
        DeliveryPipelineBuilder::new(name)
            .source(
                SourceLocation::new("acme", "sentinel", "main"),
                Arc::new(StaticSourceProvider::new("abc123", "tree")),
            )
            .build_stage(
                BuildScript::new()
                    .build("docker build .")
                    .output_file(IMAGE_DEFINITIONS_ARTIFACT),
                BuildConfig::new("registry/repo"),
                Arc::new(ScriptedBuildExecutor::succeeding([(
                    IMAGE_DEFINITIONS_ARTIFACT,
                    b"[]".to_vec(),
                )])),
            )
    }

    #[test]
    fn test_build_only_topology() {
        let pipeline = wired("build-only").assemble().unwrap();
        assert_eq!(pipeline.stage_count(), 2);
        assert_eq!(pipeline.stages()[0].name(), "Source");
        assert_eq!(pipeline.stages()[1].name(), "Build");
    }

    #[test]
    fn test_build_deploy_topology() {
        let pipeline = wired("build-deploy")
            .deploy(DeployConfig::new("sentinel"), Arc::new(RecordingDeployTarget::new()))
            .assemble()
            .unwrap();
        assert_eq!(pipeline.stage_count(), 3);
        assert_eq!(pipeline.stages()[2].name(), "Deploy");
    }

    #[test]
    fn test_gated_topology() {
        let pipeline = wired("gated")
            .approval(ApprovalPolicy::new("ship it?"), Arc::new(ApprovalGate::new()))
            .deploy(DeployConfig::new("sentinel"), Arc::new(RecordingDeployTarget::new()))
            .assemble()
            .unwrap();
        let names: Vec<&str> = pipeline.stages().iter().map(Stage::name).collect();
        assert_eq!(names, vec!["Source", "Build", "Approve", "Deploy"]);
    }

    #[test]
    fn test_approval_requires_deploy() {
        let err = wired("bad")
            .approval(ApprovalPolicy::new("ship it?"), Arc::new(ApprovalGate::new()))
            .assemble()
            .unwrap_err();
        assert!(err.to_string().contains("without a deploy stage"));
    }

    #[test]
    fn test_source_and_build_required() {
        let err = DeliveryPipelineBuilder::new("empty").assemble().unwrap_err();
        assert!(err.to_string().contains("source stage"));
    }
}
