//! Service analysis
//!
//! A service is judged through its Endpoints object, which shares its name.
//! Findings are reported under the `Service` kind.

use k8s_openapi::api::core::v1::{Endpoints, Service};
use kube::ResourceExt;
use kubeeye_common::{AnalysisResult, Failure};

use crate::api::ClusterClient;
use crate::config::AnalysisSettings;
use crate::error::K8sResult;
use crate::observability::events::events_for_object;
use crate::report::{aggregate, check_all, doc_ref};
use crate::types::AnalysisScope;

/// Annotation carried by endpoints used as leader-election locks
pub const LEADER_ANNOTATION: &str = "control-plane.alpha.kubernetes.io/leader";

/// Analyze services in scope
pub async fn analyze_services<C: ClusterClient>(
    client: &C,
    scope: &AnalysisScope,
    settings: &AnalysisSettings,
) -> K8sResult<Vec<AnalysisResult>> {
    let endpoints: Vec<Endpoints> = client
        .list(scope.namespace_ref(), &scope.list_query())
        .await?;

    let endpoints = endpoints
        .into_iter()
        .filter(|ep| !ep.annotations().contains_key(LEADER_ANNOTATION))
        .collect();

    let analysis = check_all(endpoints, settings.concurrency, |ep| async move {
        let failures = service_failures(client, &ep).await?;
        Ok((ep, failures))
    })
    .await?;

    aggregate(client, "Service", analysis, settings.max_owner_depth).await
}

/// Every finding for the service behind one Endpoints object
pub async fn service_failures<C: ClusterClient>(client: &C, ep: &Endpoints) -> K8sResult<Vec<Failure>> {
    let name = ep.name_any();
    let namespace = ep.namespace().unwrap_or_default();
    let subsets = ep.subsets.clone().unwrap_or_default();

    let mut failures: Vec<Failure> = if subsets.is_empty() {
        match client.get::<Service>(Some(&namespace), &name).await? {
            Some(service) => service
                .spec
                .and_then(|spec| spec.selector)
                .unwrap_or_default()
                .into_iter()
                .map(|(k, v)| {
                    Failure::with_doc(
                        format!("Service has no endpoints, unexpected label: {}={}", k, v),
                        doc_ref("v1", "Service", "spec.selector"),
                    )
                })
                .collect(),
            // Orphaned Endpoints object
            None => vec![Failure::new(format!(
                "Endpoints reference the service {}/{} which does not exist",
                namespace, name
            ))],
        }
    } else {
        not_ready_failures(ep).into_iter().collect()
    };

    for event in events_for_object(client, &namespace, &name).await? {
        if event.type_.as_deref() != Some("Normal") {
            failures.push(Failure::new(format!(
                "Service {}/{} has event: {}",
                namespace,
                name,
                event.message.unwrap_or_default()
            )));
        }
    }

    Ok(failures)
}

/// One aggregate finding naming every not-ready target
fn not_ready_failures(ep: &Endpoints) -> Option<Failure> {
    let targets: Vec<String> = ep
        .subsets
        .iter()
        .flatten()
        .flat_map(|subset| subset.not_ready_addresses.iter().flatten())
        .map(|addr| match &addr.target_ref {
            Some(target) => format!(
                "{}/{}",
                target.kind.as_deref().unwrap_or_default(),
                target.name.as_deref().unwrap_or_default()
            ),
            None => addr.ip.clone(),
        })
        .collect();

    if targets.is_empty() {
        return None;
    }

    Some(Failure::with_doc(
        format!(
            "Service has not ready endpoints, pods: [{}], unexpected: {}",
            targets.join(" "),
            targets.len()
        ),
        doc_ref("v1", "Endpoints", "subsets.notReadyAddresses"),
    ))
}
