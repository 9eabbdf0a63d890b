//! NetworkPolicy analysis

use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::api::networking::v1::NetworkPolicy;
use kube::ResourceExt;
use kubeeye_common::{AnalysisResult, Failure};

use crate::api::ClusterClient;
use crate::config::AnalysisSettings;
use crate::error::K8sResult;
use crate::report::{aggregate, check_all, doc_ref};
use crate::selectors::{is_empty_selector, label_selector_to_string};
use crate::types::{AnalysisScope, ListQuery};

const API_VERSION: &str = "networking.k8s.io/v1";

/// Analyze network policies in scope
pub async fn analyze_network_policies<C: ClusterClient>(
    client: &C,
    scope: &AnalysisScope,
    settings: &AnalysisSettings,
) -> K8sResult<Vec<AnalysisResult>> {
    let policies: Vec<NetworkPolicy> = client
        .list(scope.namespace_ref(), &scope.list_query())
        .await?;

    let analysis = check_all(policies, settings.concurrency, |policy| async move {
        let failures = policy_failures(client, &policy).await?;
        Ok((policy, failures))
    })
    .await?;

    aggregate(client, "NetworkPolicy", analysis, settings.max_owner_depth).await
}

/// Every finding for one policy
pub async fn policy_failures<C: ClusterClient>(client: &C, policy: &NetworkPolicy) -> K8sResult<Vec<Failure>> {
    let spec = policy.spec.clone().unwrap_or_default();
    let selector = &spec.pod_selector;

    if is_empty_selector(selector) {
        return Ok(open_selector_failures(policy));
    }

    let namespace = policy.namespace().unwrap_or_default();
    let query = ListQuery::new().labels(&label_selector_to_string(selector));
    let pods: Vec<Pod> = client.list(Some(&namespace), &query).await?;

    if pods.is_empty() {
        return Ok(vec![Failure::with_doc(
            "NetworkPolicy has no matching pods",
            doc_ref(API_VERSION, "NetworkPolicy", "spec.podSelector"),
        )]);
    }

    Ok(vec![])
}

/// Findings for a policy that selects every pod in its namespace
fn open_selector_failures(policy: &NetworkPolicy) -> Vec<Failure> {
    let spec = policy.spec.clone().unwrap_or_default();
    let mut failures = vec![Failure::with_doc(
        "NetworkPolicy has empty pod selector, will select all pods",
        doc_ref(API_VERSION, "NetworkPolicy", "spec.podSelector"),
    )];

    for policy_type in spec.policy_types.iter().flatten() {
        let (direction, field, rules) = match policy_type.as_str() {
            "Ingress" => ("ingress", "spec.ingress", spec.ingress.as_ref().map_or(0, Vec::len)),
            "Egress" => ("egress", "spec.egress", spec.egress.as_ref().map_or(0, Vec::len)),
            _ => continue,
        };
        if rules == 0 {
            failures.push(Failure::with_doc(
                format!("NetworkPolicy will deny all {} traffic", direction),
                doc_ref(API_VERSION, "NetworkPolicy", field),
            ));
        }
    }

    failures
}
