//! Container logs
//!
//! Read-only log tail for the pod behind a finding.

use k8s_openapi::api::core::v1::Pod;

use crate::api::{ClusterClient, LogClient};
use crate::error::{K8sError, K8sResult};
use crate::resources::namespace_or_default;
use crate::types::PodLogQuery;

/// Fetch the log tail of a pod, `default` namespace when none is given.
///
/// A pod that does not exist is reported as [`K8sError::ResourceNotFound`]
/// rather than as a raw 404 from the log endpoint.
pub async fn pod_logs<C: ClusterClient + LogClient>(
    client: &C,
    namespace: Option<&str>,
    name: &str,
    query: &PodLogQuery,
) -> K8sResult<String> {
    let namespace = namespace_or_default(namespace);

    if client.get::<Pod>(Some(&namespace), name).await?.is_none() {
        return Err(K8sError::ResourceNotFound {
            kind: "Pod".to_string(),
            name: name.to_string(),
            namespace,
        });
    }

    tracing::debug!(
        namespace = %namespace,
        pod = %name,
        container = query.container.as_deref().unwrap_or("-"),
        tail_lines = ?query.tail_lines,
        "fetching pod logs"
    );

    client.pod_logs(&namespace, name, query).await
}
