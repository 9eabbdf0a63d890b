//! Pod analysis
//!
//! Classifies pending scheduling failures and per-container lifecycle
//! problems. Container states that need more context (still creating, or
//! running but unready) are resolved against the pod's latest event.

use k8s_openapi::api::core::v1::{ContainerStatus, Pod};
use kube::ResourceExt;
use kubeeye_common::{AnalysisResult, Failure};

use crate::api::ClusterClient;
use crate::config::AnalysisSettings;
use crate::error::K8sResult;
use crate::observability::events::latest_event;
use crate::reasons::{ContainerErrorReason, EventErrorReason};
use crate::report::{aggregate, check_all};
use crate::types::AnalysisScope;

/// What a single container status says about the pod
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerVerdict {
    Healthy,
    Failure(String),
    /// Still creating while pending; the latest event decides
    CreatingEvent,
    /// Running but not ready; the latest event decides
    UnhealthyEvent,
}

/// Analyze pods in scope
pub async fn analyze_pods<C: ClusterClient>(
    client: &C,
    scope: &AnalysisScope,
    settings: &AnalysisSettings,
) -> K8sResult<Vec<AnalysisResult>> {
    let pods: Vec<Pod> = client
        .list(scope.namespace_ref(), &scope.list_query())
        .await?;

    let analysis = check_all(pods, settings.concurrency, |pod| async move {
        let failures = pod_failures(client, &pod).await?;
        Ok((pod, failures))
    })
    .await?;

    aggregate(client, "Pod", analysis, settings.max_owner_depth).await
}

/// Every finding for one pod, in check order
pub async fn pod_failures<C: ClusterClient>(client: &C, pod: &Pod) -> K8sResult<Vec<Failure>> {
    let name = pod.name_any();
    let namespace = pod.namespace().unwrap_or_default();
    let status = pod.status.clone().unwrap_or_default();
    let phase = status.phase.clone().unwrap_or_default();

    let mut failures = unschedulable_failures(pod);

    let statuses = status
        .init_container_statuses
        .iter()
        .flatten()
        .chain(status.container_statuses.iter().flatten());

    for container in statuses {
        match classify_container(container, &name, &phase) {
            ContainerVerdict::Healthy => {}
            ContainerVerdict::Failure(text) => failures.push(Failure::new(text)),
            ContainerVerdict::CreatingEvent => {
                if let Some(event) = latest_event(client, &namespace, &name).await? {
                    let reason = event.reason.unwrap_or_default();
                    match event.message {
                        Some(msg) if EventErrorReason::is_error(&reason) && !msg.is_empty() => {
                            failures.push(Failure::new(msg))
                        }
                        _ => {}
                    }
                }
            }
            ContainerVerdict::UnhealthyEvent => {
                if let Some(event) = latest_event(client, &namespace, &name).await? {
                    match (event.reason.as_deref(), event.message) {
                        (Some("Unhealthy"), Some(msg)) if !msg.is_empty() => {
                            failures.push(Failure::new(msg))
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    Ok(failures)
}

/// Scheduler messages for a pending pod that cannot be placed
fn unschedulable_failures(pod: &Pod) -> Vec<Failure> {
    let Some(status) = pod.status.as_ref() else {
        return vec![];
    };
    if status.phase.as_deref() != Some("Pending") {
        return vec![];
    }

    status
        .conditions
        .iter()
        .flatten()
        .filter(|c| c.type_ == "PodScheduled" && c.reason.as_deref() == Some("Unschedulable"))
        .filter_map(|c| c.message.clone())
        .filter(|msg| !msg.is_empty())
        .map(Failure::new)
        .collect()
}

/// Classify one container status without touching the cluster
pub fn classify_container(status: &ContainerStatus, pod_name: &str, phase: &str) -> ContainerVerdict {
    let waiting = status.state.as_ref().and_then(|s| s.waiting.as_ref());

    let Some(waiting) = waiting else {
        if !status.ready && phase == "Running" {
            return ContainerVerdict::UnhealthyEvent;
        }
        return ContainerVerdict::Healthy;
    };

    let reason = waiting.reason.as_deref().unwrap_or_default();
    let last_terminated = status
        .last_state
        .as_ref()
        .and_then(|s| s.terminated.as_ref());

    if reason == "ContainerCreating" && phase == "Pending" {
        return ContainerVerdict::CreatingEvent;
    }

    if reason == ContainerErrorReason::CrashLoopBackOff.as_str() {
        if let Some(terminated) = last_terminated {
            return ContainerVerdict::Failure(format!(
                "the last termination reason is {} container={} pod={}",
                terminated.reason.as_deref().unwrap_or_default(),
                status.name,
                pod_name
            ));
        }
    }

    match waiting.message.as_deref() {
        Some(msg) if ContainerErrorReason::is_error(reason) && !msg.is_empty() => {
            ContainerVerdict::Failure(msg.to_string())
        }
        _ => ContainerVerdict::Healthy,
    }
}
