//! StatefulSet analysis
//!
//! Checks the governing service and claim templates, then walks ordinal
//! pods when the set is short of available replicas.

use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod, Service};
use kube::ResourceExt;
use kubeeye_common::{AnalysisResult, Failure};

use crate::api::ClusterClient;
use crate::config::AnalysisSettings;
use crate::error::K8sResult;
use crate::observability::events::latest_event;
use crate::report::{aggregate, check_all, doc_ref};
use crate::types::AnalysisScope;

/// Analyze statefulsets in scope
pub async fn analyze_statefulsets<C: ClusterClient>(
    client: &C,
    scope: &AnalysisScope,
    settings: &AnalysisSettings,
) -> K8sResult<Vec<AnalysisResult>> {
    let sets: Vec<StatefulSet> = client
        .list(scope.namespace_ref(), &scope.list_query())
        .await?;

    let analysis = check_all(sets, settings.concurrency, |sts| async move {
        let failures = statefulset_failures(client, &sts).await?;
        Ok((sts, failures))
    })
    .await?;

    aggregate(client, "StatefulSet", analysis, settings.max_owner_depth).await
}

/// Every finding for one statefulset, in check order
pub async fn statefulset_failures<C: ClusterClient>(
    client: &C,
    sts: &StatefulSet,
) -> K8sResult<Vec<Failure>> {
    let name = sts.name_any();
    let namespace = sts.namespace().unwrap_or_default();
    let spec = sts.spec.clone().unwrap_or_default();
    let mut failures = Vec::new();

    let service = spec.service_name.as_str();
    if !service.is_empty() && client.get::<Service>(Some(&namespace), service).await?.is_none() {
        failures.push(Failure::with_doc(
            format!("StatefulSet uses the service {}/{} which does not exist", namespace, service),
            doc_ref("apps/v1", "StatefulSet", "spec.serviceName"),
        ));
    }

    for template in spec.volume_claim_templates.iter().flatten() {
        let claim = template.metadata.name.clone().unwrap_or_default();
        if client
            .get::<PersistentVolumeClaim>(Some(&namespace), &claim)
            .await?
            .is_none()
        {
            failures.push(Failure::with_doc(
                format!("StatefulSet uses the pvc {}/{} which does not exist", namespace, claim),
                doc_ref("apps/v1", "StatefulSet", "spec.volumeClaimTemplates"),
            ));
        }
    }

    let available = sts
        .status
        .as_ref()
        .and_then(|s| s.available_replicas)
        .unwrap_or(0);

    if let Some(replicas) = spec.replicas.filter(|r| *r != available) {
        if let Some(failure) = first_broken_ordinal(client, &namespace, &name, replicas).await? {
            failures.push(failure);
        }
    }

    Ok(failures)
}

/// Walk `<sts>-0 .. <sts>-N-1` and report the first missing or non-running pod
async fn first_broken_ordinal<C: ClusterClient>(
    client: &C,
    namespace: &str,
    name: &str,
    replicas: i32,
) -> K8sResult<Option<Failure>> {
    for ordinal in 0..replicas {
        let pod_name = format!("{}-{}", name, ordinal);

        let Some(pod) = client.get::<Pod>(Some(namespace), &pod_name).await? else {
            if ordinal > 0 {
                return Ok(None);
            }
            let failure = match latest_event(client, namespace, name).await? {
                Some(event) if event.type_.as_deref() != Some("Normal") => {
                    Failure::new(event.message.unwrap_or_default())
                }
                _ => Failure::new(format!(
                    "StatefulSet has {} replicas, but only 0 pods are running",
                    replicas
                )),
            };
            return Ok(Some(failure));
        };

        let phase = pod.status.as_ref().and_then(|s| s.phase.as_deref());
        if phase != Some("Running") {
            return Ok(Some(Failure::new(format!(
                "StatefulSet pod {}/{} is not in Running state",
                namespace, pod_name
            ))));
        }
    }

    Ok(None)
}
