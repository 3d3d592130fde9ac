//! Error types for the Astro operator
//!
//! Graph and launch errors are part of the reconciliation outcome and end up
//! in status conditions. Only [`Error`] is returned from a reconcile call.

use thiserror::Error;

/// Structural problems in a declared star graph. Fatal for a pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("duplicate star name '{name}'")]
    DuplicateName { name: String },

    #[error("star '{star}' depends on undeclared star '{dependency}'")]
    UnknownDependency { star: String, dependency: String },

    #[error("dependency cycle detected: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },
}

impl GraphError {
    /// Machine-readable reason used in status conditions
    pub fn reason(&self) -> &'static str {
        match self {
            GraphError::DuplicateName { .. } => "DuplicateName",
            GraphError::UnknownDependency { .. } => "UnknownDependency",
            GraphError::Cycle { .. } => "Cycle",
        }
    }
}

/// Errors surfaced by the workload runtime
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("rejected by runtime: {0}")]
    Rejected(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("temporarily unavailable: {0}")]
    Transient(String),
}

impl RuntimeError {
    /// Classify a kube client error by its API status code
    pub fn from_kube(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(resp) => match resp.code {
                409 => RuntimeError::Conflict(resp.message),
                400 | 403 | 404 | 422 => RuntimeError::Rejected(resp.message),
                _ => RuntimeError::Transient(resp.message),
            },
            other => RuntimeError::Transient(other.to_string()),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, RuntimeError::Transient(_))
    }
}

/// Failure to launch a single star. Local to that star.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    #[error("star type '{0}' is not supported")]
    UnsupportedVariant(String),

    #[error("invalid star configuration: {0}")]
    InvalidStar(String),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl LaunchError {
    /// Transient runtime failures are retried on a later pass instead of failing the star
    pub fn is_transient(&self) -> bool {
        matches!(self, LaunchError::Runtime(e) if e.is_transient())
    }

    pub fn reason(&self) -> &'static str {
        match self {
            LaunchError::UnsupportedVariant(_) => "UnsupportedVariant",
            LaunchError::InvalidStar(_) => "InvalidStar",
            LaunchError::Runtime(RuntimeError::Rejected(_)) => "Rejected",
            LaunchError::Runtime(RuntimeError::Conflict(_)) => "Conflict",
            LaunchError::Runtime(RuntimeError::Transient(_)) => "Transient",
        }
    }
}

/// Main error type for the operator
#[derive(Error, Debug)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Invalid star graph: {0}")]
    Graph(#[from] GraphError),

    #[error("Workload runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Telemetry error: {0}")]
    TelemetryError(String),
}

impl Error {
    /// Whether a requeue with a short delay is likely to succeed
    pub fn is_retriable(&self) -> bool {
        match self {
            Error::KubeError(kube::Error::Api(resp)) => resp.code == 429 || resp.code >= 500,
            Error::KubeError(_) => true,
            Error::Runtime(e) => e.is_transient(),
            _ => false,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
