//! Common types shared between kubeeye-engine and kubeeye-cli
//!
//! These are the report shapes produced by the analysis engine. Their JSON
//! form is the stable contract consumed by callers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single finding about an object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub text: String,
    /// Pointer to the offending field, e.g. `apps/v1/Deployment.spec.replicas`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation_ref: Option<String>,
}

impl Failure {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            documentation_ref: None,
        }
    }

    pub fn with_doc(text: impl Into<String>, documentation_ref: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            documentation_ref: Some(documentation_ref.into()),
        }
    }
}

/// Findings for one object, attributed to its top-level controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub kind: String,
    /// `namespace/name` for namespaced kinds, the bare name otherwise
    pub name: String,
    pub failures: Vec<Failure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_object: Option<String>,
}

/// Point-in-time resource consumption of one workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadMetrics {
    pub name: String,
    pub namespace: String,
    pub cpu_millicores: i64,
    pub memory_mebibytes: i64,
}

/// Kinds that have a health analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalyzerKind {
    Pod,
    Node,
    Deployment,
    StatefulSet,
    Service,
    Ingress,
    NetworkPolicy,
    CronJob,
    ValidatingWebhookConfiguration,
    MutatingWebhookConfiguration,
}

impl AnalyzerKind {
    pub const ALL: [AnalyzerKind; 10] = [
        AnalyzerKind::Pod,
        AnalyzerKind::Node,
        AnalyzerKind::Deployment,
        AnalyzerKind::StatefulSet,
        AnalyzerKind::Service,
        AnalyzerKind::Ingress,
        AnalyzerKind::NetworkPolicy,
        AnalyzerKind::CronJob,
        AnalyzerKind::ValidatingWebhookConfiguration,
        AnalyzerKind::MutatingWebhookConfiguration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyzerKind::Pod => "Pod",
            AnalyzerKind::Node => "Node",
            AnalyzerKind::Deployment => "Deployment",
            AnalyzerKind::StatefulSet => "StatefulSet",
            AnalyzerKind::Service => "Service",
            AnalyzerKind::Ingress => "Ingress",
            AnalyzerKind::NetworkPolicy => "NetworkPolicy",
            AnalyzerKind::CronJob => "CronJob",
            AnalyzerKind::ValidatingWebhookConfiguration => "ValidatingWebhookConfiguration",
            AnalyzerKind::MutatingWebhookConfiguration => "MutatingWebhookConfiguration",
        }
    }
}

impl fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalyzerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        let found = match wanted.as_str() {
            "po" | "pods" => Some(AnalyzerKind::Pod),
            "no" | "nodes" => Some(AnalyzerKind::Node),
            "deploy" | "deployments" => Some(AnalyzerKind::Deployment),
            "sts" | "statefulsets" => Some(AnalyzerKind::StatefulSet),
            "svc" | "services" => Some(AnalyzerKind::Service),
            "ing" | "ingresses" => Some(AnalyzerKind::Ingress),
            "netpol" | "networkpolicies" => Some(AnalyzerKind::NetworkPolicy),
            "cj" | "cronjobs" => Some(AnalyzerKind::CronJob),
            "validatingwebhookconfigurations" => {
                Some(AnalyzerKind::ValidatingWebhookConfiguration)
            }
            "mutatingwebhookconfigurations" => Some(AnalyzerKind::MutatingWebhookConfiguration),
            _ => None,
        };

        found
            .or_else(|| {
                Self::ALL
                    .into_iter()
                    .find(|k| k.as_str().eq_ignore_ascii_case(&wanted))
            })
            .ok_or_else(|| Error::UnknownKind(s.to_string()))
    }
}

/// Workload kinds accepted by the resource-usage aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
    DaemonSet,
    ReplicaSet,
    Pod,
}

impl WorkloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::StatefulSet => "StatefulSet",
            WorkloadKind::DaemonSet => "DaemonSet",
            WorkloadKind::ReplicaSet => "ReplicaSet",
            WorkloadKind::Pod => "Pod",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkloadKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deployment" | "deployments" | "deploy" => Ok(WorkloadKind::Deployment),
            "statefulset" | "statefulsets" | "sts" => Ok(WorkloadKind::StatefulSet),
            "daemonset" | "daemonsets" | "ds" => Ok(WorkloadKind::DaemonSet),
            "replicaset" | "replicasets" | "rs" => Ok(WorkloadKind::ReplicaSet),
            "pod" | "pods" | "po" => Ok(WorkloadKind::Pod),
            _ => Err(Error::UnknownWorkload(s.to_string())),
        }
    }
}

/// Errors raised while interpreting caller input
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown analyzer kind: {0}")]
    UnknownKind(String),

    #[error("unknown workload type: {0}")]
    UnknownWorkload(String),
}

pub type Result<T> = std::result::Result<T, Error>;
