//! Metrics from metrics-server
//!
//! Parses metrics.k8s.io pod samples and sums them into per-workload
//! point-in-time CPU and memory usage.

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::ResourceExt;
use kubeeye_common::{WorkloadKind, WorkloadMetrics};

use crate::api::{ClusterClient, ClusterObject, DiscoveryClient, MetricsClient};
use crate::error::{K8sError, K8sResult};
use crate::selectors::label_selector_to_string;
use crate::types::{ContainerMetrics, ListQuery, PodMetrics};

const METRICS_GROUP: &str = "metrics.k8s.io";
const SUPPORTED_METRICS_VERSIONS: &[&str] = &["v1beta1"];

/// Parse one PodMetrics object from the raw API response
pub fn pod_metrics_from_value(item: &serde_json::Value) -> Option<PodMetrics> {
    let name = item["metadata"]["name"].as_str()?.to_string();
    let namespace = item["metadata"]["namespace"].as_str().unwrap_or("").to_string();
    let timestamp = item["timestamp"].as_str().unwrap_or("").to_string();

    let containers = item["containers"]
        .as_array()
        .map(|containers| {
            containers
                .iter()
                .filter_map(|c| {
                    let usage = &c["usage"];
                    Some(ContainerMetrics {
                        name: c["name"].as_str()?.to_string(),
                        cpu_usage: usage["cpu"].as_str().unwrap_or("0").to_string(),
                        memory_usage: usage["memory"].as_str().unwrap_or("0").to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Some(PodMetrics {
        name,
        namespace,
        containers,
        timestamp,
    })
}

const SUFFIXES: &[&str] = &[
    "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "n", "u", "m", "k", "K", "M", "G", "T", "P", "E",
];

fn split_quantity(quantity: &str) -> (f64, &str) {
    let quantity = quantity.trim();
    if let Ok(value) = quantity.parse::<f64>() {
        return (value, "");
    }
    for suffix in SUFFIXES {
        if let Some(number) = quantity.strip_suffix(suffix) {
            if let Ok(value) = number.parse::<f64>() {
                return (value, *suffix);
            }
        }
    }
    (0.0, "")
}

fn suffix_multiplier(suffix: &str) -> Option<f64> {
    let multiplier = match suffix {
        "" => 1.0,
        "n" => 1e-9,
        "u" => 1e-6,
        "m" => 1e-3,
        "k" | "K" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "P" => 1e15,
        "E" => 1e18,
        "Ki" => 1024.0,
        "Mi" => 1024.0 * 1024.0,
        "Gi" => 1024.0 * 1024.0 * 1024.0,
        "Ti" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        "Pi" => 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0,
        "Ei" => 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };
    Some(multiplier)
}

/// Round up, ignoring float noise around whole numbers
fn ceil_scaled(value: f64) -> i64 {
    let nearest = value.round();
    if (value - nearest).abs() < 1e-6 {
        nearest as i64
    } else {
        value.ceil() as i64
    }
}

/// CPU quantity (`250m`, `1`, `1500000n`) in millicores, rounded up
pub fn parse_cpu_millicores(quantity: &str) -> i64 {
    let (value, suffix) = split_quantity(quantity);
    suffix_multiplier(suffix)
        .map(|m| ceil_scaled(value * m * 1000.0))
        .unwrap_or(0)
}

/// Memory quantity (`128Mi`, `1Gi`, `256000Ki`) in bytes, rounded up
pub fn parse_memory_bytes(quantity: &str) -> i64 {
    let (value, suffix) = split_quantity(quantity);
    suffix_multiplier(suffix)
        .map(|m| ceil_scaled(value * m))
        .unwrap_or(0)
}

/// Sum samples: CPU in millicores, memory in MiB floored per container
pub fn sum_usage(samples: &[PodMetrics]) -> (i64, i64) {
    samples
        .iter()
        .flat_map(|sample| sample.containers.iter())
        .fold((0, 0), |(cpu, memory), c| {
            (
                cpu + parse_cpu_millicores(&c.cpu_usage),
                memory + parse_memory_bytes(&c.memory_usage) / 1024 / 1024,
            )
        })
}

/// Whether discovery advertises a supported metrics.k8s.io version
pub async fn metrics_api_available<D: DiscoveryClient>(discovery: &D) -> K8sResult<bool> {
    let groups = discovery.server_groups().await.map_err(|e| match e {
        K8sError::DiscoveryUnavailable(_) => e,
        other => K8sError::DiscoveryUnavailable(other.to_string()),
    })?;

    Ok(groups
        .iter()
        .filter(|g| g.name == METRICS_GROUP)
        .flat_map(|g| g.versions.iter())
        .any(|v| SUPPORTED_METRICS_VERSIONS.contains(&v.as_str())))
}

/// A workload whose pods are summed together
struct Target {
    name: String,
    namespace: String,
    pod_selector: String,
}

async fn select_workloads<K, C>(
    client: &C,
    namespace: Option<&str>,
    name: Option<&str>,
    label_selector: Option<&str>,
    pod_selector: fn(&K) -> Option<&LabelSelector>,
) -> K8sResult<Vec<Target>>
where
    K: ClusterObject,
    C: ClusterClient,
{
    let workloads: Vec<K> = match name {
        Some(name) => {
            let ns = namespace.unwrap_or("default");
            let found: Option<K> = client.get(Some(ns), name).await?;
            let workload = found.ok_or_else(|| K8sError::ResourceNotFound {
                kind: <K as kube::Resource>::kind(&()).to_string(),
                name: name.to_string(),
                namespace: ns.to_string(),
            })?;
            vec![workload]
        }
        None => {
            let query = ListQuery::new().labels(label_selector.unwrap_or(""));
            client.list(namespace, &query).await?
        }
    };

    Ok(workloads
        .iter()
        .map(|w| Target {
            name: w.name_any(),
            namespace: w.namespace().unwrap_or_default(),
            pod_selector: pod_selector(w)
                .map(label_selector_to_string)
                .unwrap_or_default(),
        })
        .collect())
}

/// Point-in-time CPU and memory usage per workload.
///
/// `label_selector` only scopes which workloads are considered; each
/// workload's own selector picks its pods. For `Pod` one entry is emitted
/// per pod.
pub async fn workload_usage<C>(
    client: &C,
    kind: WorkloadKind,
    namespace: Option<&str>,
    name: Option<&str>,
    label_selector: Option<&str>,
) -> K8sResult<Vec<WorkloadMetrics>>
where
    C: ClusterClient + DiscoveryClient + MetricsClient,
{
    if !metrics_api_available(client).await? {
        return Err(K8sError::MetricsApiUnavailable);
    }

    let name = name.filter(|n| !n.is_empty());
    let label_selector = label_selector.filter(|s| !s.is_empty());

    let targets = match kind {
        WorkloadKind::Deployment => {
            select_workloads::<Deployment, _>(client, namespace, name, label_selector, |d| {
                d.spec.as_ref().map(|s| &s.selector)
            })
            .await?
        }
        WorkloadKind::StatefulSet => {
            select_workloads::<StatefulSet, _>(client, namespace, name, label_selector, |s| {
                s.spec.as_ref().map(|s| &s.selector)
            })
            .await?
        }
        WorkloadKind::DaemonSet => {
            select_workloads::<DaemonSet, _>(client, namespace, name, label_selector, |d| {
                d.spec.as_ref().map(|s| &s.selector)
            })
            .await?
        }
        WorkloadKind::ReplicaSet => {
            select_workloads::<ReplicaSet, _>(client, namespace, name, label_selector, |r| {
                r.spec.as_ref().map(|s| &s.selector)
            })
            .await?
        }
        WorkloadKind::Pod => return pod_usage(client, namespace, name, label_selector).await,
    };

    let mut results = Vec::with_capacity(targets.len());
    for target in targets {
        let samples = client
            .list_pod_metrics(Some(&target.namespace), Some(&target.pod_selector))
            .await?;
        let (cpu, memory) = sum_usage(&samples);

        tracing::debug!(
            workload = %target.name,
            namespace = %target.namespace,
            pods = samples.len(),
            "summed workload usage"
        );

        results.push(WorkloadMetrics {
            name: target.name,
            namespace: target.namespace,
            cpu_millicores: cpu,
            memory_mebibytes: memory,
        });
    }

    sort_metrics(&mut results);
    Ok(results)
}

async fn pod_usage<C: MetricsClient>(
    client: &C,
    namespace: Option<&str>,
    name: Option<&str>,
    label_selector: Option<&str>,
) -> K8sResult<Vec<WorkloadMetrics>> {
    let samples = match name {
        Some(name) => {
            let ns = namespace.unwrap_or("default");
            let sample = client.get_pod_metrics(ns, name).await?.ok_or_else(|| {
                K8sError::ResourceNotFound {
                    kind: "PodMetrics".to_string(),
                    name: name.to_string(),
                    namespace: ns.to_string(),
                }
            })?;
            vec![sample]
        }
        None => client.list_pod_metrics(namespace, label_selector).await?,
    };

    let mut results: Vec<WorkloadMetrics> = samples
        .into_iter()
        .map(|sample| {
            let (cpu, memory) = sum_usage(std::slice::from_ref(&sample));
            WorkloadMetrics {
                name: sample.name,
                namespace: sample.namespace,
                cpu_millicores: cpu,
                memory_mebibytes: memory,
            }
        })
        .collect();

    sort_metrics(&mut results);
    Ok(results)
}

fn sort_metrics(results: &mut [WorkloadMetrics]) {
    results.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.namespace.cmp(&b.namespace)));
}
