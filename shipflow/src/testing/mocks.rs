//! Mock backends and scripted actions for tests.

use crate::actions::{Action, ActionContext, ActionOutput, ApprovalDecision, ApprovalGate};
use crate::backend::{BuildExecutor, BuildOutputs, DeployTarget, SourceProvider, SourceSnapshot};
use crate::config::{BuildConfig, DeployConfig, SourceLocation};
use crate::core::{ActionKind, Artifact, ArtifactLocation, ImageDefinition};
use crate::errors::{BuildError, DeployError, PipelineError, SourceFetchError};
use crate::script::BuildScript;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A source provider that returns a fixed revision and tree.
#[derive(Debug)]
pub struct StaticSourceProvider {
    revision: String,
    tree: Vec<u8>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticSourceProvider {
    /// Creates a provider returning the given revision and tree content.
    #[must_use]
    pub fn new(revision: impl Into<String>, tree: impl Into<String>) -> Self {
        Self {
            revision: revision.into(),
            tree: tree.into().into_bytes(),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Delays each fetch, to exercise cancellation and timeouts.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns how many fetches were attempted.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceProvider for StaticSourceProvider {
    async fn fetch(&self, _location: &SourceLocation) -> Result<SourceSnapshot, SourceFetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(SourceSnapshot::new(
            &self.revision,
            ArtifactLocation::Inline(self.tree.clone()),
        ))
    }
}

/// A source provider that always fails.
#[derive(Debug)]
pub struct FailingSourceProvider {
    message: String,
}

impl FailingSourceProvider {
    /// Creates a provider failing with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl SourceProvider for FailingSourceProvider {
    async fn fetch(&self, location: &SourceLocation) -> Result<SourceSnapshot, SourceFetchError> {
        Err(SourceFetchError::new(
            &location.owner,
            &location.repository,
            &location.branch,
            &self.message,
        ))
    }
}

#[derive(Debug, Clone)]
enum BuildBehavior {
    Succeed(HashMap<String, Vec<u8>>),
    Fail(BuildError),
}

/// A build executor with a scripted outcome.
///
/// Records every configuration it was invoked with, so tests can assert
/// the explicit build configuration (exports, source version) actually
/// reached the executor.
#[derive(Debug)]
pub struct ScriptedBuildExecutor {
    behavior: BuildBehavior,
    delay: Option<Duration>,
    configs: Mutex<Vec<BuildConfig>>,
}

impl ScriptedBuildExecutor {
    /// Creates an executor that succeeds with the given files.
    #[must_use]
    pub fn succeeding<K, I>(files: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Vec<u8>)>,
    {
        Self {
            behavior: BuildBehavior::Succeed(
                files.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            ),
            delay: None,
            configs: Mutex::new(Vec::new()),
        }
    }

    /// Creates an executor that fails with the given error.
    #[must_use]
    pub fn failing(error: BuildError) -> Self {
        Self {
            behavior: BuildBehavior::Fail(error),
            delay: None,
            configs: Mutex::new(Vec::new()),
        }
    }

    /// Delays each build, to exercise cancellation and timeouts.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns how many builds were attempted.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.configs.lock().len()
    }

    /// Returns the configurations each build was invoked with.
    #[must_use]
    pub fn recorded_configs(&self) -> Vec<BuildConfig> {
        self.configs.lock().clone()
    }
}

#[async_trait]
impl BuildExecutor for ScriptedBuildExecutor {
    async fn run(
        &self,
        _script: &BuildScript,
        config: &BuildConfig,
        _source: &Artifact,
    ) -> Result<BuildOutputs, BuildError> {
        self.configs.lock().push(config.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.behavior {
            BuildBehavior::Succeed(files) => {
                let mut outputs = BuildOutputs::new();
                for (path, bytes) in files {
                    outputs = outputs.file(path, ArtifactLocation::Inline(bytes.clone()));
                }
                Ok(outputs)
            }
            BuildBehavior::Fail(err) => Err(err.clone()),
        }
    }
}

/// A deploy target that records successful rollouts.
#[derive(Debug, Default)]
pub struct RecordingDeployTarget {
    rollouts: Mutex<Vec<(String, Vec<ImageDefinition>)>>,
    failure: Option<DeployError>,
    delay: Option<Duration>,
}

impl RecordingDeployTarget {
    /// Creates a target that accepts every rollout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every rollout fail with the given error.
    #[must_use]
    pub fn with_failure(mut self, failure: DeployError) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Delays each rollout, to exercise cancellation and timeouts.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns the recorded (service, images) rollouts.
    #[must_use]
    pub fn rollouts(&self) -> Vec<(String, Vec<ImageDefinition>)> {
        self.rollouts.lock().clone()
    }
}

#[async_trait]
impl DeployTarget for RecordingDeployTarget {
    async fn roll_out(
        &self,
        config: &DeployConfig,
        images: &[ImageDefinition],
    ) -> Result<(), DeployError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        self.rollouts
            .lock()
            .push((config.service.clone(), images.to_vec()));
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum FixedBehavior {
    Succeed,
    Produce(Vec<u8>),
    Consume,
    Fail(PipelineError),
}

/// A scripted action for stage and builder tests.
#[derive(Debug)]
pub struct FixedAction {
    name: String,
    run_order: u32,
    inputs: Vec<String>,
    outputs: Vec<String>,
    behavior: FixedBehavior,
    calls: AtomicUsize,
}

impl FixedAction {
    fn new(name: impl Into<String>, behavior: FixedBehavior) -> Self {
        Self {
            name: name.into(),
            run_order: 1,
            inputs: Vec::new(),
            outputs: Vec::new(),
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    /// An action that succeeds without artifacts.
    #[must_use]
    pub fn succeeding(name: impl Into<String>) -> Self {
        Self::new(name, FixedBehavior::Succeed)
    }

    /// An action that fails with the given error.
    #[must_use]
    pub fn failing(name: impl Into<String>, error: impl Into<PipelineError>) -> Self {
        Self::new(name, FixedBehavior::Fail(error.into()))
    }

    /// An action that produces one inline artifact.
    #[must_use]
    pub fn producing(
        name: impl Into<String>,
        artifact: impl Into<String>,
        bytes: &[u8],
    ) -> Self {
        let mut action = Self::new(name, FixedBehavior::Produce(bytes.to_vec()));
        action.outputs = vec![artifact.into()];
        action
    }

    /// An action that consumes one artifact and succeeds.
    #[must_use]
    pub fn consuming(name: impl Into<String>, artifact: impl Into<String>) -> Self {
        let mut action = Self::new(name, FixedBehavior::Consume);
        action.inputs = vec![artifact.into()];
        action
    }

    /// Sets the run-order tie-break.
    #[must_use]
    pub fn with_run_order(mut self, run_order: u32) -> Self {
        self.run_order = run_order;
        self
    }

    /// Returns how many times the action executed.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Action for FixedAction {
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
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            FixedBehavior::Succeed => ActionOutput::succeeded(Vec::new()),
            FixedBehavior::Produce(bytes) => ActionOutput::succeeded(vec![Artifact::new(
                &self.outputs[0],
                &self.name,
                ArtifactLocation::Inline(bytes.clone()),
            )]),
            FixedBehavior::Consume => match ctx.input(&self.inputs[0]) {
                Ok(_) => ActionOutput::succeeded(Vec::new()),
                Err(err) => ActionOutput::failed(err),
            },
            FixedBehavior::Fail(err) => ActionOutput::failed(err.clone()),
        }
    }
}

/// An action that rendezvouses with its partner before completing.
///
/// A pair deadlocks unless both run concurrently, which makes it a direct
/// probe of intra-band concurrency.
#[derive(Debug)]
pub struct SequencedAction {
    name: String,
    barrier: Arc<tokio::sync::Barrier>,
}

impl SequencedAction {
    /// Creates a pair sharing one rendezvous point.
    #[must_use]
    pub fn pair(a: impl Into<String>, b: impl Into<String>) -> (Self, Self) {
        let barrier = Arc::new(tokio::sync::Barrier::new(2));
        (
            Self {
                name: a.into(),
                barrier: barrier.clone(),
            },
            Self {
                name: b.into(),
                barrier,
            },
        )
    }
}

#[async_trait]
impl Action for SequencedAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Build
    }

    async fn execute(&self, _ctx: &ActionContext) -> ActionOutput {
        self.barrier.wait().await;
        ActionOutput::succeeded(Vec::new())
    }
}

/// Spawns a responder that answers the next request appearing on the gate.
pub fn respond_to_next_request(
    gate: Arc<ApprovalGate>,
    decision: ApprovalDecision,
) -> tokio::task::JoinHandle<bool> {
    tokio::spawn(async move {
        for _ in 0..400 {
            if let Some(request) = gate.pending().into_iter().next() {
                return match decision {
                    ApprovalDecision::Approved => gate.approve(request.id),
                    ApprovalDecision::Rejected { reason } => gate.reject(request.id, reason),
                };
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    })
}
