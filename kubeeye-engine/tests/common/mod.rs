//! Common test utilities and helpers
//!
//! `FakeCluster` is an in-memory cluster implementing every engine seam.
//! Objects are stored as JSON keyed by kind, so typed and dynamic access
//! see the same data.

#![allow(dead_code)]

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::api::DynamicObject;
use kube::core::ErrorResponse;
use kubeeye_engine::api::{
    ClusterClient, ClusterObject, DiscoveryClient, DynamicClient, LogClient, MetricsClient,
};
use kubeeye_engine::config::AnalysisSettings;
use kubeeye_engine::discovery::GvrMapping;
use kubeeye_engine::types::{
    ApiGroupInfo, ApiResourceInfo, ContainerMetrics, ListQuery, PodLogQuery, PodMetrics,
};
use kubeeye_engine::{HealthEngine, K8sError, K8sResult};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory cluster
#[derive(Default)]
pub struct FakeCluster {
    objects: Mutex<BTreeMap<String, Vec<Value>>>,
    groups: Mutex<Vec<ApiGroupInfo>>,
    resources: Mutex<BTreeMap<String, Vec<ApiResourceInfo>>>,
    pod_metrics: Mutex<Vec<PodMetrics>>,
    /// Log lines keyed by (namespace, pod, container)
    logs: Mutex<BTreeMap<(String, String, String), Vec<String>>>,
    failing_kinds: Mutex<HashSet<String>>,
    discovery_down: Mutex<bool>,
    flaky_group_versions: Mutex<BTreeMap<String, usize>>,
    pub group_calls: AtomicUsize,
}

fn api_error(code: u16, message: &str) -> K8sError {
    K8sError::KubeError(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: message.to_string(),
        reason: if code == 404 { "NotFound" } else { "InternalError" }.to_string(),
        code,
    }))
}

fn resource(name: &str, kind: &str, namespaced: bool, short_names: &[&str]) -> ApiResourceInfo {
    ApiResourceInfo {
        name: name.to_string(),
        singular_name: kind.to_ascii_lowercase(),
        kind: kind.to_string(),
        namespaced,
        short_names: short_names.iter().map(|s| s.to_string()).collect(),
    }
}

fn group(name: &str, versions: &[&str]) -> ApiGroupInfo {
    ApiGroupInfo {
        name: name.to_string(),
        versions: versions.iter().map(|v| v.to_string()).collect(),
        preferred_version: versions.first().map(|v| v.to_string()),
    }
}

impl FakeCluster {
    /// A cluster serving the built-in kinds, with no objects
    pub fn new() -> Self {
        let cluster = Self::default();

        cluster.serve(
            group("", &["v1"]),
            "v1",
            vec![
                resource("pods", "Pod", true, &["po"]),
                resource("pods/log", "Pod", true, &[]),
                resource("services", "Service", true, &["svc"]),
                resource("endpoints", "Endpoints", true, &["ep"]),
                resource("events", "Event", true, &["ev"]),
                resource("nodes", "Node", false, &["no"]),
                resource("secrets", "Secret", true, &[]),
                resource("configmaps", "ConfigMap", true, &["cm"]),
                resource("namespaces", "Namespace", false, &["ns"]),
                resource("persistentvolumeclaims", "PersistentVolumeClaim", true, &["pvc"]),
            ],
        );
        cluster.serve(
            group("apps", &["v1"]),
            "v1",
            vec![
                resource("deployments", "Deployment", true, &["deploy"]),
                resource("statefulsets", "StatefulSet", true, &["sts"]),
                resource("daemonsets", "DaemonSet", true, &["ds"]),
                resource("replicasets", "ReplicaSet", true, &["rs"]),
            ],
        );
        cluster.serve(
            group("batch", &["v1"]),
            "v1",
            vec![
                resource("jobs", "Job", true, &[]),
                resource("cronjobs", "CronJob", true, &["cj"]),
            ],
        );
        cluster.serve(
            group("networking.k8s.io", &["v1"]),
            "v1",
            vec![
                resource("ingresses", "Ingress", true, &["ing"]),
                resource("ingressclasses", "IngressClass", false, &[]),
                resource("networkpolicies", "NetworkPolicy", true, &["netpol"]),
            ],
        );
        cluster.serve(
            group("admissionregistration.k8s.io", &["v1"]),
            "v1",
            vec![
                resource("validatingwebhookconfigurations", "ValidatingWebhookConfiguration", false, &[]),
                resource("mutatingwebhookconfigurations", "MutatingWebhookConfiguration", false, &[]),
            ],
        );
        cluster.serve(
            group("apiextensions.k8s.io", &["v1"]),
            "v1",
            vec![resource("customresourcedefinitions", "CustomResourceDefinition", false, &["crd"])],
        );

        cluster
    }

    /// Advertise a group/version and the resources under it
    pub fn serve(&self, info: ApiGroupInfo, version: &str, list: Vec<ApiResourceInfo>) {
        let gv = info.group_version(version);
        let mut groups = self.groups.lock().unwrap();
        match groups.iter_mut().find(|g| g.name == info.name) {
            Some(existing) => {
                if !existing.versions.iter().any(|v| v == version) {
                    existing.versions.push(version.to_string());
                }
            }
            None => groups.push(info),
        }
        self.resources.lock().unwrap().entry(gv).or_default().extend(list);
    }

    /// Advertise metrics.k8s.io/v1beta1
    pub fn with_metrics_api(self) -> Self {
        self.serve(
            group("metrics.k8s.io", &["v1beta1"]),
            "v1beta1",
            vec![resource("pods", "PodMetrics", true, &[])],
        );
        self
    }

    /// Make every list/get of `kind` fail with a server error
    pub fn fail_on(&self, kind: &str) {
        self.failing_kinds.lock().unwrap().insert(kind.to_string());
    }

    /// Make the next `times` resource listings of `group_version` fail
    pub fn flake_group_version(&self, group_version: &str, times: usize) {
        self.flaky_group_versions
            .lock()
            .unwrap()
            .insert(group_version.to_string(), times);
    }

    pub fn break_discovery(&self) {
        *self.discovery_down.lock().unwrap() = true;
    }

    /// Store a typed object
    pub fn add<K: ClusterObject>(&self, object: K) {
        let kind = K::kind(&()).to_string();
        let value = serde_json::to_value(&object).unwrap();
        self.insert(&kind, value);
    }

    pub fn add_pod_metrics(&self, namespace: &str, name: &str, containers: &[(&str, &str, &str)]) {
        self.pod_metrics.lock().unwrap().push(PodMetrics {
            name: name.to_string(),
            namespace: namespace.to_string(),
            containers: containers
                .iter()
                .map(|(c, cpu, mem)| ContainerMetrics {
                    name: c.to_string(),
                    cpu_usage: cpu.to_string(),
                    memory_usage: mem.to_string(),
                })
                .collect(),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
        });
    }

    /// Store `lines` as the log of one container
    pub fn add_logs(&self, namespace: &str, pod: &str, container: &str, lines: &[&str]) {
        self.logs.lock().unwrap().insert(
            (namespace.to_string(), pod.to_string(), container.to_string()),
            lines.iter().map(|l| l.to_string()).collect(),
        );
    }

    pub fn count(&self, kind: &str) -> usize {
        self.objects.lock().unwrap().get(kind).map_or(0, Vec::len)
    }

    fn insert(&self, kind: &str, value: Value) {
        let mut objects = self.objects.lock().unwrap();
        let list = objects.entry(kind.to_string()).or_default();
        let key = identity(&value);
        list.retain(|existing| identity(existing) != key);
        list.push(value);
    }

    fn check_failure(&self, kind: &str) -> K8sResult<()> {
        if self.failing_kinds.lock().unwrap().contains(kind) {
            return Err(api_error(500, &format!("injected failure for {}", kind)));
        }
        Ok(())
    }

    fn select(&self, kind: &str, namespace: Option<&str>, query: &ListQuery) -> Vec<Value> {
        let objects = self.objects.lock().unwrap();
        objects
            .get(kind)
            .into_iter()
            .flatten()
            .filter(|v| namespace.map_or(true, |ns| v["metadata"]["namespace"] == ns))
            .filter(|v| {
                query
                    .label_selector
                    .as_deref()
                    .map_or(true, |s| labels_match(&v["metadata"]["labels"], s))
            })
            .filter(|v| {
                query
                    .field_selector
                    .as_deref()
                    .map_or(true, |s| fields_match(v, s))
            })
            .cloned()
            .collect()
    }

    fn find(&self, kind: &str, namespace: Option<&str>, name: &str) -> Option<Value> {
        let query = ListQuery::new().fields(&format!("metadata.name={}", name));
        self.select(kind, namespace, &query).into_iter().next()
    }

    /// Register the kind a CustomResourceDefinition declares
    fn register_crd(&self, crd: &Value) {
        let spec = &crd["spec"];
        let (Some(group_name), Some(kind), Some(plural)) = (
            spec["group"].as_str(),
            spec["names"]["kind"].as_str(),
            spec["names"]["plural"].as_str(),
        ) else {
            return;
        };
        let version = spec["versions"][0]["name"].as_str().unwrap_or("v1");
        let namespaced = spec["scope"].as_str() != Some("Cluster");
        self.serve(
            group(group_name, &[version]),
            version,
            vec![resource(plural, kind, namespaced, &[])],
        );
    }
}

fn identity(value: &Value) -> (String, String) {
    (
        value["metadata"]["namespace"].as_str().unwrap_or_default().to_string(),
        value["metadata"]["name"].as_str().unwrap_or_default().to_string(),
    )
}

/// Split on commas outside parentheses
fn split_terms(selector: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut depth = 0;
    let mut current = String::new();
    for c in selector.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                terms.push(current.trim().to_string());
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    if !current.trim().is_empty() {
        terms.push(current.trim().to_string());
    }
    terms
}

fn set_values(list: &str) -> Vec<String> {
    list.trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .map(|v| v.trim().to_string())
        .collect()
}

/// Evaluate a label selector the way the API server does
pub fn labels_match(labels: &Value, selector: &str) -> bool {
    let label = |key: &str| labels.get(key).and_then(Value::as_str).map(String::from);

    split_terms(selector).iter().all(|term| {
        if let Some((key, values)) = term.split_once(" notin ") {
            return label(key.trim()).map_or(true, |v| !set_values(values).contains(&v));
        }
        if let Some((key, values)) = term.split_once(" in ") {
            return label(key.trim()).map_or(false, |v| set_values(values).contains(&v));
        }
        if let Some((key, value)) = term.split_once("!=") {
            return label(key.trim()).as_deref() != Some(value.trim());
        }
        if let Some((key, value)) = term.split_once('=') {
            let value = value.trim_start_matches('=').trim();
            return label(key.trim()).as_deref() == Some(value);
        }
        if let Some(key) = term.strip_prefix('!') {
            return label(key.trim()).is_none();
        }
        label(term).is_some()
    })
}

/// Evaluate `a.b=c` field selectors against the object's JSON
pub fn fields_match(object: &Value, selector: &str) -> bool {
    selector.split(',').all(|term| {
        let Some((path, expected)) = term.split_once('=') else {
            return false;
        };
        let actual = path
            .split('.')
            .try_fold(object, |v, segment| v.get(segment))
            .and_then(Value::as_str);
        actual == Some(expected)
    })
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn list<K: ClusterObject>(&self, namespace: Option<&str>, query: &ListQuery) -> K8sResult<Vec<K>> {
        let kind = K::kind(&()).to_string();
        self.check_failure(&kind)?;
        let namespace = if K::NAMESPACED { namespace } else { None };
        self.select(&kind, namespace, query)
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(K8sError::from))
            .collect()
    }

    async fn get<K: ClusterObject>(&self, namespace: Option<&str>, name: &str) -> K8sResult<Option<K>> {
        let kind = K::kind(&()).to_string();
        self.check_failure(&kind)?;
        let namespace = if K::NAMESPACED { namespace } else { None };
        self.find(&kind, namespace, name)
            .map(|v| serde_json::from_value(v).map_err(K8sError::from))
            .transpose()
    }
}

#[async_trait]
impl DynamicClient for FakeCluster {
    async fn list_dynamic(
        &self,
        mapping: &GvrMapping,
        namespace: Option<&str>,
        query: &ListQuery,
    ) -> K8sResult<Vec<DynamicObject>> {
        self.check_failure(&mapping.kind)?;
        self.select(&mapping.kind, namespace, query)
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(K8sError::from))
            .collect()
    }

    async fn get_dynamic(
        &self,
        mapping: &GvrMapping,
        namespace: Option<&str>,
        name: &str,
    ) -> K8sResult<Option<DynamicObject>> {
        self.check_failure(&mapping.kind)?;
        self.find(&mapping.kind, namespace, name)
            .map(|v| serde_json::from_value(v).map_err(K8sError::from))
            .transpose()
    }

    async fn delete_dynamic(&self, mapping: &GvrMapping, namespace: Option<&str>, name: &str) -> K8sResult<()> {
        self.check_failure(&mapping.kind)?;
        let mut objects = self.objects.lock().unwrap();
        let list = objects.entry(mapping.kind.clone()).or_default();
        let before = list.len();
        let key = (namespace.unwrap_or_default().to_string(), name.to_string());
        list.retain(|v| identity(v) != key);
        if list.len() == before {
            return Err(api_error(404, &format!("{} \"{}\" not found", mapping.resource, name)));
        }
        Ok(())
    }

    async fn apply_dynamic(
        &self,
        mapping: &GvrMapping,
        namespace: Option<&str>,
        object: &DynamicObject,
        _field_manager: &str,
    ) -> K8sResult<DynamicObject> {
        self.check_failure(&mapping.kind)?;
        let mut stored = object.clone();
        stored.metadata.namespace = namespace.map(String::from);
        let value = serde_json::to_value(&stored)?;
        if mapping.kind == "CustomResourceDefinition" {
            self.register_crd(&value);
        }
        self.insert(&mapping.kind, value);
        Ok(stored)
    }
}

#[async_trait]
impl DiscoveryClient for FakeCluster {
    async fn server_groups(&self) -> K8sResult<Vec<ApiGroupInfo>> {
        self.group_calls.fetch_add(1, Ordering::SeqCst);
        if *self.discovery_down.lock().unwrap() {
            return Err(K8sError::DiscoveryUnavailable("connection refused".to_string()));
        }
        Ok(self.groups.lock().unwrap().clone())
    }

    async fn server_resources(&self, group_version: &str) -> K8sResult<Vec<ApiResourceInfo>> {
        if *self.discovery_down.lock().unwrap() {
            return Err(K8sError::DiscoveryUnavailable("connection refused".to_string()));
        }
        if let Some(remaining) = self.flaky_group_versions.lock().unwrap().get_mut(group_version) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(api_error(503, "the server is currently unable to handle the request"));
            }
        }
        self.resources
            .lock()
            .unwrap()
            .get(group_version)
            .cloned()
            .ok_or_else(|| api_error(404, &format!("group version {} not found", group_version)))
    }
}

#[async_trait]
impl MetricsClient for FakeCluster {
    async fn list_pod_metrics(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> K8sResult<Vec<PodMetrics>> {
        let query = ListQuery::new().labels(label_selector.unwrap_or(""));
        let selected: HashSet<(String, String)> = self
            .select("Pod", namespace, &query)
            .iter()
            .map(identity)
            .collect();

        Ok(self
            .pod_metrics
            .lock()
            .unwrap()
            .iter()
            .filter(|m| namespace.map_or(true, |ns| m.namespace == ns))
            .filter(|m| {
                label_selector.is_none() || selected.contains(&(m.namespace.clone(), m.name.clone()))
            })
            .cloned()
            .collect())
    }

    async fn get_pod_metrics(&self, namespace: &str, name: &str) -> K8sResult<Option<PodMetrics>> {
        Ok(self
            .pod_metrics
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.namespace == namespace && m.name == name)
            .cloned())
    }
}

#[async_trait]
impl LogClient for FakeCluster {
    async fn pod_logs(&self, namespace: &str, name: &str, query: &PodLogQuery) -> K8sResult<String> {
        self.check_failure("Pod")?;
        let logs = self.logs.lock().unwrap();
        let mut containers = logs
            .iter()
            .filter(|((ns, pod, _), _)| ns == namespace && pod == name);

        let lines = match query.container.as_deref() {
            Some(container) => containers
                .find(|((_, _, c), _)| c == container)
                .map(|(_, lines)| lines),
            None => {
                let first = containers.next();
                if containers.next().is_some() {
                    return Err(api_error(400, "a container name must be specified"));
                }
                first.map(|(_, lines)| lines)
            }
        };
        let Some(lines) = lines else {
            return Ok(String::new());
        };

        let skip = match query.tail_lines {
            Some(tail) => lines.len().saturating_sub(tail.max(0) as usize),
            None => 0,
        };
        Ok(lines[skip..].iter().map(|l| format!("{}\n", l)).collect())
    }
}

/// Engine over a fake cluster with default settings
pub fn engine(cluster: FakeCluster) -> HealthEngine<FakeCluster> {
    HealthEngine::new(cluster, AnalysisSettings::default())
}

pub fn meta(namespace: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        ..Default::default()
    }
}

pub fn cluster_meta(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        ..Default::default()
    }
}

pub fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

pub fn owned_by(kind: &str, name: &str) -> Vec<OwnerReference> {
    vec![OwnerReference {
        api_version: "apps/v1".to_string(),
        kind: kind.to_string(),
        name: name.to_string(),
        uid: format!("{}-uid", name),
        controller: Some(true),
        ..Default::default()
    }]
}

/// A pod in the given phase carrying `labels`
pub fn pod(namespace: &str, name: &str, phase: &str, pod_labels: &[(&str, &str)]) -> Pod {
    Pod {
        metadata: ObjectMeta {
            labels: Some(labels(pod_labels)),
            ..meta(namespace, name)
        },
        status: Some(k8s_openapi::api::core::v1::PodStatus {
            phase: Some(phase.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}
