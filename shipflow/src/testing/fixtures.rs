//! Canonical fixtures for delivery pipeline tests.

use crate::config::{BuildConfig, SourceLocation};
use crate::script::BuildScript;

/// The source location most tests fetch from.
#[must_use]
pub fn sample_source_location() -> SourceLocation {
    SourceLocation::new("acme", "sentinel", "main")
}

/// A containerized build: login, build and push, render the manifest.
#[must_use]
pub fn docker_build_script() -> BuildScript {
    BuildScript::new()
        .pre_build("aws ecr get-login-password | docker login --username AWS --password-stdin $ecr")
        .build("docker build -t $ecr:$tag .")
        .build("docker push $ecr:$tag")
        .post_build("printf '[{\"name\":\"app\",\"imageUri\":\"%s\"}]' \"$ecr:$tag\" > imagedefinitions.json")
        .output_file("imagedefinitions.json")
}

/// A build configuration exporting the registry and tag variables the
/// [`docker_build_script`] commands reference.
#[must_use]
pub fn sample_build_config() -> BuildConfig {
    BuildConfig::new("registry/repo")
        .export("ecr", "registry/repo")
        .export("tag", "cdk")
}
