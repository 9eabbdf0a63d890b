//! Ownership chain resolution
//!
//! Walks owner references up to the top-most controller so failures on a
//! pod can be attributed to e.g. `Deployment/web`.

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use std::collections::HashSet;

use crate::api::ClusterClient;
use crate::error::{K8sError, K8sResult};

/// Controller kinds that are followed
const OWNER_KINDS: [&str; 4] = ["ReplicaSet", "Deployment", "StatefulSet", "DaemonSet"];

/// Default bound on owner hops
pub const DEFAULT_MAX_OWNER_DEPTH: usize = 16;

/// Owner reference reduced to what the walk needs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerLink {
    pub kind: String,
    pub name: String,
}

impl OwnerLink {
    /// First owner reference with a followed kind, in list order
    pub fn first_known(references: &[OwnerReference]) -> Option<Self> {
        references
            .iter()
            .find(|r| OWNER_KINDS.contains(&r.kind.as_str()))
            .map(|r| OwnerLink {
                kind: r.kind.clone(),
                name: r.name.clone(),
            })
    }

    pub fn label(&self) -> String {
        format!("{}/{}", self.kind, self.name)
    }
}

async fn fetch_owner_meta<C: ClusterClient>(
    client: &C,
    namespace: Option<&str>,
    link: &OwnerLink,
) -> K8sResult<Option<ObjectMeta>> {
    let meta = match link.kind.as_str() {
        "ReplicaSet" => client
            .get::<ReplicaSet>(namespace, &link.name)
            .await?
            .map(|o| o.metadata),
        "Deployment" => client
            .get::<Deployment>(namespace, &link.name)
            .await?
            .map(|o| o.metadata),
        "StatefulSet" => client
            .get::<StatefulSet>(namespace, &link.name)
            .await?
            .map(|o| o.metadata),
        "DaemonSet" => client
            .get::<DaemonSet>(namespace, &link.name)
            .await?
            .map(|o| o.metadata),
        _ => None,
    };
    Ok(meta)
}

/// Resolve the top-most owning controller as `Kind/Name`.
///
/// Returns `Ok(None)` when the object has no followed owner or any owner
/// along the chain cannot be fetched. Chains longer than `max_depth`, or
/// chains that revisit an owner, fail with `OwnershipCycleDetected`.
pub async fn resolve_parent<C: ClusterClient>(
    client: &C,
    meta: &ObjectMeta,
    max_depth: usize,
) -> K8sResult<Option<String>> {
    let origin = meta.name.clone().unwrap_or_default();
    let mut namespace = meta.namespace.clone();
    let mut references = meta.owner_references.clone().unwrap_or_default();
    let mut visited = HashSet::new();

    loop {
        let Some(link) = OwnerLink::first_known(&references) else {
            return Ok(None);
        };

        if visited.len() >= max_depth || !visited.insert(link.clone()) {
            return Err(K8sError::OwnershipCycleDetected {
                object: origin,
                depth: visited.len(),
            });
        }

        let owner = match fetch_owner_meta(client, namespace.as_deref(), &link).await {
            Ok(Some(owner)) => owner,
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::debug!(owner = %link.label(), error = %e, "owner lookup failed");
                return Ok(None);
            }
        };

        match owner.owner_references {
            Some(next) if !next.is_empty() => {
                references = next;
                namespace = owner.namespace.or(namespace);
            }
            _ => return Ok(Some(link.label())),
        }
    }
}
