//! Engine error types
//!
//! Every variant is terminal for the current call. Nothing is retried
//! internally; callers decide on retry and backoff.

use thiserror::Error;

/// Errors raised by the analysis engine
#[derive(Debug, Error)]
pub enum K8sError {
    /// Any failed list/get/delete/apply against the cluster API
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// Kind string could not be mapped to a served resource
    #[error("Resource kind not found: {0}")]
    ResourceKindNotFound(String),

    /// Discovery service unreachable
    #[error("Discovery unavailable: {0}")]
    DiscoveryUnavailable(String),

    /// metrics.k8s.io is not advertised by the cluster
    #[error("metrics API is not available")]
    MetricsApiUnavailable,

    /// Owner chain longer than the configured bound
    #[error("Ownership cycle detected at {object} after {depth} owner hops")]
    OwnershipCycleDetected { object: String, depth: usize },

    /// Workload kind not supported by the usage aggregator
    #[error("unknown workload type: {0}")]
    UnsupportedWorkload(String),

    /// Named object does not exist
    #[error("Resource not found: {kind}/{name} in namespace {namespace}")]
    ResourceNotFound {
        kind: String,
        name: String,
        namespace: String,
    },

    /// Invalid kubeconfig
    #[error("Invalid kubeconfig: {0}")]
    InvalidKubeconfig(String),

    /// Manifest could not be decoded into an object
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    /// Report or object (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal system error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for K8sError {
    fn from(err: serde_json::Error) -> Self {
        K8sError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for K8sError {
    fn from(err: serde_yaml::Error) -> Self {
        K8sError::Serialization(err.to_string())
    }
}

impl From<kubeeye_common::Error> for K8sError {
    fn from(err: kubeeye_common::Error) -> Self {
        match err {
            kubeeye_common::Error::UnknownKind(kind) => K8sError::ResourceKindNotFound(kind),
            kubeeye_common::Error::UnknownWorkload(kind) => K8sError::UnsupportedWorkload(kind),
        }
    }
}

impl K8sError {
    /// True for API responses carrying HTTP 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, K8sError::KubeError(kube::Error::Api(resp)) if resp.code == 404)
    }
}

/// Result type alias for engine operations
pub type K8sResult<T> = std::result::Result<T, K8sError>;
