//! Node analysis
//!
//! `Ready` must be `True`; every other condition (pressure, network) must
//! be `False`. Anything else, including `Unknown`, is a failure.

use k8s_openapi::api::core::v1::{Node, NodeCondition};
use kube::ResourceExt;
use kubeeye_common::{AnalysisResult, Failure};

use crate::api::ClusterClient;
use crate::config::AnalysisSettings;
use crate::error::K8sResult;
use crate::report::{aggregate, check_all};
use crate::types::AnalysisScope;

/// Analyze nodes; the scope namespace is ignored
pub async fn analyze_nodes<C: ClusterClient>(
    client: &C,
    scope: &AnalysisScope,
    settings: &AnalysisSettings,
) -> K8sResult<Vec<AnalysisResult>> {
    let nodes: Vec<Node> = client.list(None, &scope.list_query()).await?;

    let analysis = check_all(nodes, settings.concurrency, |node| async move {
        let failures = node_failures(&node);
        Ok((node, failures))
    })
    .await?;

    aggregate(client, "Node", analysis, settings.max_owner_depth).await
}

fn is_abnormal(condition: &NodeCondition) -> bool {
    match condition.type_.as_str() {
        "Ready" => condition.status != "True",
        _ => condition.status != "False",
    }
}

/// One failure per abnormal condition
pub fn node_failures(node: &Node) -> Vec<Failure> {
    let name = node.name_any();

    node.status
        .iter()
        .flat_map(|s| s.conditions.iter().flatten())
        .filter(|c| is_abnormal(c))
        .map(|c| {
            Failure::new(format!(
                "{} condition type {} is {}, reason {}: {}",
                name,
                c.type_,
                c.status,
                c.reason.as_deref().unwrap_or_default(),
                c.message.as_deref().unwrap_or_default()
            ))
        })
        .collect()
}
