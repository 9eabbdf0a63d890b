//! Deployment analysis
//!
//! Flags deployments with fewer available replicas than desired.

use k8s_openapi::api::apps::v1::Deployment;
use kubeeye_common::{AnalysisResult, Failure};

use crate::api::ClusterClient;
use crate::config::AnalysisSettings;
use crate::error::K8sResult;
use crate::report::{aggregate, check_all, doc_ref};
use crate::types::AnalysisScope;

/// Analyze deployments in scope
pub async fn analyze_deployments<C: ClusterClient>(
    client: &C,
    scope: &AnalysisScope,
    settings: &AnalysisSettings,
) -> K8sResult<Vec<AnalysisResult>> {
    let deployments: Vec<Deployment> = client
        .list(scope.namespace_ref(), &scope.list_query())
        .await?;

    let analysis = check_all(deployments, settings.concurrency, |deploy| async move {
        let failures = deployment_failures(&deploy);
        Ok((deploy, failures))
    })
    .await?;

    aggregate(client, "Deployment", analysis, settings.max_owner_depth).await
}

/// Replica shortfall; an unset `spec.replicas` means 1
pub fn deployment_failures(deploy: &Deployment) -> Vec<Failure> {
    let desired = deploy
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(1);
    let available = deploy
        .status
        .as_ref()
        .and_then(|s| s.available_replicas)
        .unwrap_or(0);

    if available < desired {
        vec![Failure::with_doc(
            format!("Only {}/{} replicas available", available, desired),
            doc_ref("apps/v1", "Deployment", "spec.replicas"),
        )]
    } else {
        vec![]
    }
}
