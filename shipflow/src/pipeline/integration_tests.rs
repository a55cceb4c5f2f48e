//! End-to-end runs of the standard delivery topology against scripted
//! backends.

use super::{DeliveryPipelineBuilder, Pipeline, RunContext, RunRegistry};
use crate::actions::{ApprovalDecision, ApprovalGate};
use crate::config::{ApprovalPolicy, DeployConfig};
use crate::core::{parse_manifest, render_manifest, ImageDefinition, RunStatus};
use crate::errors::BuildError;
use crate::events::CollectingEventSink;
use crate::observability;
use crate::testing::{
    docker_build_script, respond_to_next_request, sample_build_config, sample_source_location,
    RecordingDeployTarget, ScriptedBuildExecutor, StaticSourceProvider,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn manifest_bytes() -> Vec<u8> {
    render_manifest(&[ImageDefinition::new("app", "registry/repo:abc123")]).unwrap()
}

struct Harness {
    pipeline: Pipeline,
    gate: Arc<ApprovalGate>,
    deploy: Arc<RecordingDeployTarget>,
}

/// The full gated topology: Source, Build, Approve, Deploy.
fn gated(executor: Arc<ScriptedBuildExecutor>) -> Harness {
    let gate = Arc::new(ApprovalGate::new());
    let deploy = Arc::new(RecordingDeployTarget::new());

    let pipeline = DeliveryPipelineBuilder::new("sentinel-delivery")
        .source(
            sample_source_location(),
            Arc::new(StaticSourceProvider::new("abc123", "tree")),
        )
        .build_stage(docker_build_script(), sample_build_config(), executor)
        .approval(
            ApprovalPolicy::new("deploy registry/repo:abc123 to sentinel?")
                .with_timeout(Duration::from_secs(5)),
            gate.clone(),
        )
        .deploy(DeployConfig::new("sentinel"), deploy.clone())
        .assemble()
        .unwrap();

    Harness {
        pipeline,
        gate,
        deploy,
    }
}

fn stage_positions(events: &CollectingEventSink, event_type: &str) -> Vec<String> {
    events
        .events_of_type(event_type)
        .into_iter()
        .filter_map(|(_, data)| {
            data?
                .get("stage")
                .and_then(|v| v.as_str())
                .map(String::from)
        })
        .collect()
}

#[tokio::test]
async fn test_gated_delivery_happy_path() {
    observability::init_tracing();

    let harness = gated(Arc::new(ScriptedBuildExecutor::succeeding([(
        "imagedefinitions.json",
        manifest_bytes(),
    )])));
    let responder = respond_to_next_request(harness.gate.clone(), ApprovalDecision::Approved);

    let events = Arc::new(CollectingEventSink::new());
    let registry = Arc::new(RunRegistry::new());
    let ctx = RunContext::new()
        .with_events(events.clone())
        .with_registry(registry.clone());

    let run = harness.pipeline.run(&ctx).await;
    assert!(responder.await.unwrap());

    assert_eq!(run.status, RunStatus::Succeeded);
    assert!(run.is_success());
    assert!(run.error.is_none());
    for stage in &run.stages {
        assert_eq!(stage.status, RunStatus::Succeeded, "stage {}", stage.stage);
    }

    // The rollout received the manifest the build produced.
    assert_eq!(
        harness.deploy.rollouts(),
        vec![(
            "sentinel".to_string(),
            vec![ImageDefinition::new("app", "registry/repo:abc123")],
        )]
    );

    // Stages ran strictly in declaration order.
    assert_eq!(
        stage_positions(&events, "stage.started"),
        vec!["Source", "Build", "Approve", "Deploy"]
    );
    let types = events.event_types();
    assert_eq!(types.first().map(String::as_str), Some("pipeline.started"));
    assert_eq!(types.last().map(String::as_str), Some("pipeline.succeeded"));

    assert_eq!(
        run.artifact_names,
        vec!["imagedefinitions.json".to_string(), "source".to_string()]
    );
    assert_eq!(registry.status(run.run_id), Some(RunStatus::Succeeded));
}

#[tokio::test]
async fn test_push_failure_halts_run_before_deploy() {
    let harness = gated(Arc::new(ScriptedBuildExecutor::failing(
        BuildError::push_failure("docker push exited with 1"),
    )));

    let run = harness.pipeline.run(&RunContext::new()).await;

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.error_kind.as_deref(), Some("build.push_failure"));
    assert!(run
        .error
        .as_deref()
        .unwrap()
        .contains("action 'container-build'"));

    assert_eq!(run.stage("Source").unwrap().status, RunStatus::Succeeded);
    assert_eq!(run.stage("Build").unwrap().status, RunStatus::Failed);
    assert_eq!(run.stage("Approve").unwrap().status, RunStatus::NotStarted);
    assert_eq!(run.stage("Deploy").unwrap().status, RunStatus::NotStarted);

    // The rollout was never attempted.
    assert!(harness.deploy.rollouts().is_empty());
    assert_eq!(harness.gate.pending_count(), 0);
}

#[tokio::test]
async fn test_stage_completes_before_next_starts() {
    let harness = gated(Arc::new(ScriptedBuildExecutor::succeeding([(
        "imagedefinitions.json",
        manifest_bytes(),
    )])));
    let responder = respond_to_next_request(harness.gate.clone(), ApprovalDecision::Approved);

    let events = Arc::new(CollectingEventSink::new());
    let ctx = RunContext::new().with_events(events.clone());
    let run = harness.pipeline.run(&ctx).await;
    responder.await.unwrap();
    assert!(run.is_success());

    // Interleaved: each stage's completion precedes the next stage's start.
    let lifecycle: Vec<(String, String)> = events
        .events_of_type("stage.")
        .into_iter()
        .filter_map(|(event_type, data)| {
            let stage = data?.get("stage")?.as_str()?.to_string();
            Some((event_type, stage))
        })
        .collect();
    let expected: Vec<(String, String)> = [
        ("stage.started", "Source"),
        ("stage.completed", "Source"),
        ("stage.started", "Build"),
        ("stage.completed", "Build"),
        ("stage.started", "Approve"),
        ("stage.completed", "Approve"),
        ("stage.started", "Deploy"),
        ("stage.completed", "Deploy"),
    ]
    .into_iter()
    .map(|(t, s)| (t.to_string(), s.to_string()))
    .collect();
    assert_eq!(lifecycle, expected);
}

#[tokio::test]
async fn test_rejected_approval_fails_run() {
    let harness = gated(Arc::new(ScriptedBuildExecutor::succeeding([(
        "imagedefinitions.json",
        manifest_bytes(),
    )])));
    let responder = respond_to_next_request(
        harness.gate.clone(),
        ApprovalDecision::Rejected {
            reason: Some("image not signed".to_string()),
        },
    );

    let run = harness.pipeline.run(&RunContext::new()).await;
    assert!(responder.await.unwrap());

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.error_kind.as_deref(), Some("approval.rejected"));
    assert!(run.error.as_deref().unwrap().contains("image not signed"));
    assert_eq!(run.stage("Deploy").unwrap().status, RunStatus::NotStarted);
    assert!(harness.deploy.rollouts().is_empty());
}

#[tokio::test]
async fn test_unanswered_approval_times_out() {
    let gate = Arc::new(ApprovalGate::new());
    let deploy = Arc::new(RecordingDeployTarget::new());
    let pipeline = DeliveryPipelineBuilder::new("sentinel-delivery")
        .source(
            sample_source_location(),
            Arc::new(StaticSourceProvider::new("abc123", "tree")),
        )
        .build_stage(
            docker_build_script(),
            sample_build_config(),
            Arc::new(ScriptedBuildExecutor::succeeding([(
                "imagedefinitions.json",
                manifest_bytes(),
            )])),
        )
        .approval(
            ApprovalPolicy::new("anyone there?").with_timeout(Duration::from_millis(30)),
            gate,
        )
        .deploy(DeployConfig::new("sentinel"), deploy.clone())
        .assemble()
        .unwrap();

    let run = pipeline.run(&RunContext::new()).await;

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.error_kind.as_deref(), Some("approval.timeout"));
    assert!(deploy.rollouts().is_empty());
}

#[tokio::test]
async fn test_cancel_mid_build() {
    let harness = gated(Arc::new(
        ScriptedBuildExecutor::succeeding([("imagedefinitions.json", manifest_bytes())])
            .with_delay(Duration::from_secs(5)),
    ));

    let events = Arc::new(CollectingEventSink::new());
    let ctx = RunContext::new().with_events(events.clone());
    let cancel = ctx.cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel("operator request");
    });

    let run = harness.pipeline.run(&ctx).await;

    assert_eq!(run.status, RunStatus::Cancelled);
    assert_eq!(run.error_kind.as_deref(), Some("cancelled"));
    assert_eq!(run.stage("Source").unwrap().status, RunStatus::Succeeded);
    assert_eq!(run.stage("Build").unwrap().status, RunStatus::Cancelled);
    assert_eq!(run.stage("Deploy").unwrap().status, RunStatus::NotStarted);
    assert!(harness.deploy.rollouts().is_empty());
    assert_eq!(
        events.event_types().last().map(String::as_str),
        Some("pipeline.cancelled")
    );
}

#[tokio::test]
async fn test_registry_observes_running_run_and_cancels_it() {
    let harness = gated(Arc::new(
        ScriptedBuildExecutor::succeeding([("imagedefinitions.json", manifest_bytes())])
            .with_delay(Duration::from_secs(5)),
    ));

    let registry = Arc::new(RunRegistry::new());
    let ctx = RunContext::new().with_registry(registry.clone());
    let pipeline = harness.pipeline;
    let driver = tokio::spawn(async move { pipeline.run(&ctx).await });

    // Wait for the run to register, then query and cancel through the
    // registry alone.
    let mut run_id = None;
    for _ in 0..200 {
        if let Some(id) = registry.run_ids().first().copied() {
            run_id = Some(id);
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let run_id = run_id.unwrap();

    assert_eq!(registry.status(run_id), Some(RunStatus::Running));
    assert!(registry.cancel(run_id, "operator request"));

    let run = driver.await.unwrap();
    assert_eq!(run.run_id, run_id);
    assert_eq!(run.status, RunStatus::Cancelled);
    assert_eq!(registry.status(run_id), Some(RunStatus::Cancelled));
    assert_eq!(run.error.as_deref(), Some("operator request"));
}

#[tokio::test]
async fn test_retained_artifacts_carry_the_manifest() {
    let harness = gated(Arc::new(ScriptedBuildExecutor::succeeding([(
        "imagedefinitions.json",
        manifest_bytes(),
    )])));
    let responder = respond_to_next_request(harness.gate.clone(), ApprovalDecision::Approved);

    let ctx = RunContext::new().retain_artifacts();
    let run = harness.pipeline.run(&ctx).await;
    responder.await.unwrap();
    assert!(run.is_success());

    let manifest = run.artifacts.get("imagedefinitions.json").unwrap();
    let images = parse_manifest(manifest.location.as_bytes().unwrap()).unwrap();
    assert_eq!(images, vec![ImageDefinition::new("app", "registry/repo:abc123")]);

    // The run record itself serializes for operator surfaces.
    let report = run.to_json().unwrap();
    assert!(report.contains("\"status\": \"succeeded\""));
    assert!(report.contains("sentinel-delivery"));
}
