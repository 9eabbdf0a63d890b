//! Result aggregation
//!
//! Analyzers run their check battery per object through [`check_all`], which
//! keeps only objects with findings, keyed by identity. [`aggregate`] then
//! attaches the owning controller and produces the identity-sorted report.

use futures::{stream, StreamExt, TryStreamExt};
use kube::ResourceExt;
use kubeeye_common::{AnalysisResult, Failure};
use std::collections::BTreeMap;
use std::future::Future;

use crate::api::{ClusterClient, ClusterObject};
use crate::error::K8sResult;
use crate::ownership::resolve_parent;

/// Working accumulator for one failing object
#[derive(Debug, Clone)]
pub struct PreAnalysis<K> {
    pub object: K,
    pub failures: Vec<Failure>,
}

/// Stable pointer to a schema field, e.g. `apps/v1/Deployment.spec.replicas`
pub fn doc_ref(api_version: &str, kind: &str, field: &str) -> String {
    format!("{}/{}.{}", api_version, kind, field)
}

/// `namespace/name` for namespaced kinds, the bare name otherwise
pub fn identity<K: ClusterObject>(object: &K) -> String {
    let name = object.name_any();
    match object.namespace() {
        Some(ns) if K::NAMESPACED => format!("{}/{}", ns, name),
        _ => name,
    }
}

/// Run `check` over every object, at most `concurrency` at a time.
///
/// The first error aborts the whole run. Objects whose check returns no
/// failures are dropped.
pub async fn check_all<K, F, Fut>(
    objects: Vec<K>,
    concurrency: usize,
    check: F,
) -> K8sResult<BTreeMap<String, PreAnalysis<K>>>
where
    K: ClusterObject,
    F: Fn(K) -> Fut,
    Fut: Future<Output = K8sResult<(K, Vec<Failure>)>>,
{
    let checked: Vec<(K, Vec<Failure>)> = stream::iter(objects.into_iter().map(check))
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    Ok(checked
        .into_iter()
        .filter(|(_, failures)| !failures.is_empty())
        .map(|(object, failures)| (identity(&object), PreAnalysis { object, failures }))
        .collect())
}

/// Turn the working map into the final report, sorted by identity
pub async fn aggregate<C, K>(
    client: &C,
    kind: &str,
    analysis: BTreeMap<String, PreAnalysis<K>>,
    max_owner_depth: usize,
) -> K8sResult<Vec<AnalysisResult>>
where
    C: ClusterClient,
    K: ClusterObject,
{
    let mut results = Vec::with_capacity(analysis.len());

    for (name, entry) in analysis {
        if entry.failures.is_empty() {
            continue;
        }

        let parent_object = resolve_parent(client, entry.object.meta(), max_owner_depth).await?;

        results.push(AnalysisResult {
            kind: kind.to_string(),
            name,
            failures: entry.failures,
            parent_object,
        });
    }

    tracing::info!(kind, failing = results.len(), "analysis complete");

    Ok(results)
}

/// Compact JSON; an empty report is `[]`
pub fn to_json(results: &[AnalysisResult]) -> K8sResult<String> {
    Ok(serde_json::to_string(results)?)
}
