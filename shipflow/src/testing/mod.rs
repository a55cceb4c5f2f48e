//! Test doubles and fixtures.
//!
//! Everything here is deterministic: scripted backends, rendezvous actions,
//! and canonical fixtures for the standard delivery topology. The module is
//! compiled into the crate so downstream users can exercise their own
//! pipelines against the same doubles.

mod fixtures;
mod mocks;

pub use fixtures::{docker_build_script, sample_build_config, sample_source_location};
pub use mocks::{
    respond_to_next_request, FailingSourceProvider, FixedAction, RecordingDeployTarget,
    ScriptedBuildExecutor, SequencedAction, StaticSourceProvider,
};
