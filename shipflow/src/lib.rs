//! # Shipflow
//!
//! A staged build-and-deploy pipeline orchestrator.
//!
//! Shipflow models the delivery path from a source revision to a running
//! service as a pipeline of stages:
//!
//! - **Strict stage sequencing**: a stage starts only after the previous one
//!   succeeds; the first failure halts the run
//! - **Run-order bands**: actions sharing a run-order within a stage execute
//!   concurrently
//! - **Artifact hand-off**: named, immutable artifacts flow from producers to
//!   consumers, validated at assembly time
//! - **Manual approval gates**: runs park without polling until an approver
//!   responds or the deadline passes
//! - **Cooperative cancellation**: operator cancellation is a distinct
//!   terminal outcome, never conflated with failure
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shipflow::prelude::*;
//!
//! let pipeline = DeliveryPipelineBuilder::new("sentinel-delivery")
//!     .source(location, provider)
//!     .build_stage(script, build_config, executor)
//!     .approval(ApprovalPolicy::new("ship it?"), gate)
//!     .deploy(DeployConfig::new("sentinel"), target)
//!     .assemble()?;
//!
//! let run = pipeline.run(&RunContext::new()).await;
//! assert!(run.is_success());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod actions;
pub mod backend;
pub mod cancellation;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod script;
pub mod stage;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::actions::{
        Action, ActionContext, ActionOutput, ApprovalAction, ApprovalDecision, ApprovalGate,
        BuildAction, DeployAction, SourceAction,
    };
    pub use crate::backend::{
        BuildExecutor, BuildOutputs, DeployTarget, SourceProvider, SourceSnapshot,
    };
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{
        ApprovalPolicy, BuildConfig, DeployConfig, IngressPolicy, SourceLocation,
    };
    pub use crate::core::{
        ActionKind, ActionStatus, Artifact, ArtifactLocation, ArtifactRetention, ArtifactStore,
        ImageDefinition, RunStatus,
    };
    pub use crate::errors::{
        ApprovalError, BuildError, BuildFailure, DeployError, DeployFailure, PipelineError,
        PipelineValidationError, SourceFetchError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{
        DeliveryPipelineBuilder, Pipeline, PipelineBuilder, PipelineRun, RunContext, RunRegistry,
    };
    pub use crate::script::{BuildPhase, BuildScript};
    pub use crate::stage::{Stage, StageRecord};
}
