//! Explicit configuration objects for pipeline actions.
//!
//! Everything an action needs is passed in through one of these structs;
//! nothing reads the ambient process environment. The exported build
//! variables in particular are enumerated on [`BuildConfig`] rather than
//! inherited from the caller's environment.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Default build duration ceiling.
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Default source fetch timeout.
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Default rollout timeout.
pub const DEFAULT_DEPLOY_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Default approval deadline.
pub const DEFAULT_APPROVAL_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// A version-control endpoint: owner/repository/branch plus a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// The repository owner.
    pub owner: String,
    /// The repository name.
    pub repository: String,
    /// The branch to fetch.
    pub branch: String,
    /// Authentication token, if the endpoint requires one.
    pub auth_token: Option<String>,
}

impl SourceLocation {
    /// Creates a new source location.
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        repository: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repository: repository.into(),
            branch: branch.into(),
            auth_token: None,
        }
    }

    /// Sets the authentication token.
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repository, self.branch)
    }
}

/// Configuration handed to the build executor.
///
/// The exported variables replace implicit environment wiring: the registry
/// URI and image tag the build commands reference are declared here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// The container registry URI images are pushed to.
    pub repository_uri: String,
    /// The resolved source version being built, once known.
    pub source_version: Option<String>,
    /// Variables exported to the build commands, in declaration order.
    pub export: BTreeMap<String, String>,
    /// Duration ceiling; overruns become a build timeout failure.
    pub timeout: Duration,
}

impl BuildConfig {
    /// Creates a build configuration for a registry URI.
    #[must_use]
    pub fn new(repository_uri: impl Into<String>) -> Self {
        Self {
            repository_uri: repository_uri.into(),
            source_version: None,
            export: BTreeMap::new(),
            timeout: DEFAULT_BUILD_TIMEOUT,
        }
    }

    /// Sets the resolved source version.
    #[must_use]
    pub fn with_source_version(mut self, version: impl Into<String>) -> Self {
        self.source_version = Some(version.into());
        self
    }

    /// Exports a variable to the build commands.
    #[must_use]
    pub fn export(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.export.insert(key.into(), value.into());
        self
    }

    /// Sets the duration ceiling.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Policy for a manual approval gate.
#[derive(Debug, Clone)]
pub struct ApprovalPolicy {
    /// The message shown to the approver.
    pub message: String,
    /// How long to wait before unresponsiveness becomes a failure.
    pub timeout: Duration,
}

impl ApprovalPolicy {
    /// Creates a policy with the default deadline.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timeout: DEFAULT_APPROVAL_TIMEOUT,
        }
    }

    /// Sets the deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Network ingress policy for the deployed service.
///
/// Defaults to deny-all; every allowed range must be listed explicitly.
/// Opening the service port to the world is possible but never implicit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngressPolicy {
    /// CIDR ranges allowed to reach the service port.
    pub allow: Vec<String>,
}

impl IngressPolicy {
    /// Creates a deny-all policy.
    #[must_use]
    pub fn deny_all() -> Self {
        Self::default()
    }

    /// Allows a CIDR range.
    #[must_use]
    pub fn allow_cidr(mut self, cidr: impl Into<String>) -> Self {
        self.allow.push(cidr.into());
        self
    }

    /// Creates a policy open to all addresses.
    #[must_use]
    pub fn open_to_world() -> Self {
        Self::deny_all().allow_cidr("0.0.0.0/0")
    }

    /// Returns true if no traffic is allowed.
    #[must_use]
    pub fn is_deny_all(&self) -> bool {
        self.allow.is_empty()
    }
}

/// Configuration for a rollout to a running service.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    /// The running-service handle to update.
    pub service: String,
    /// Rollout timeout; overruns become a rollout-timeout failure.
    pub timeout: Duration,
    /// Ingress policy applied to the service.
    pub ingress: IngressPolicy,
}

impl DeployConfig {
    /// Creates a deploy configuration with deny-all ingress.
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            timeout: DEFAULT_DEPLOY_TIMEOUT,
            ingress: IngressPolicy::deny_all(),
        }
    }

    /// Sets the rollout timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the ingress policy.
    #[must_use]
    pub fn with_ingress(mut self, ingress: IngressPolicy) -> Self {
        self.ingress = ingress;
        self
    }
}
