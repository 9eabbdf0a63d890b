//! Resource type resolution
//!
//! Maps a human-supplied kind (`deploy`, `Ingress`, `certificates`) to the
//! group/version/resource served by the cluster. Discovery data is fetched
//! lazily on first use and cached until [`ResourceMapper::invalidate`] is
//! called, which happens after a CustomResourceDefinition is applied.

use kube::api::{ApiResource, GroupVersionKind};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::api::DiscoveryClient;
use crate::error::{K8sError, K8sResult};
use crate::types::{ApiGroupInfo, ApiResourceInfo};

/// Best-guess group/version for well-known kinds
const BUILTIN_KINDS: &[(&str, &str, &str)] = &[
    ("Pod", "", "v1"),
    ("Service", "", "v1"),
    ("Endpoints", "", "v1"),
    ("Event", "", "v1"),
    ("Node", "", "v1"),
    ("Namespace", "", "v1"),
    ("ConfigMap", "", "v1"),
    ("Secret", "", "v1"),
    ("ServiceAccount", "", "v1"),
    ("PersistentVolume", "", "v1"),
    ("PersistentVolumeClaim", "", "v1"),
    ("ResourceQuota", "", "v1"),
    ("LimitRange", "", "v1"),
    ("ReplicationController", "", "v1"),
    ("Deployment", "apps", "v1"),
    ("StatefulSet", "apps", "v1"),
    ("DaemonSet", "apps", "v1"),
    ("ReplicaSet", "apps", "v1"),
    ("ControllerRevision", "apps", "v1"),
    ("Job", "batch", "v1"),
    ("CronJob", "batch", "v1"),
    ("Ingress", "networking.k8s.io", "v1"),
    ("IngressClass", "networking.k8s.io", "v1"),
    ("NetworkPolicy", "networking.k8s.io", "v1"),
    ("StorageClass", "storage.k8s.io", "v1"),
    ("Role", "rbac.authorization.k8s.io", "v1"),
    ("RoleBinding", "rbac.authorization.k8s.io", "v1"),
    ("ClusterRole", "rbac.authorization.k8s.io", "v1"),
    ("ClusterRoleBinding", "rbac.authorization.k8s.io", "v1"),
    ("HorizontalPodAutoscaler", "autoscaling", "v2"),
    ("PodDisruptionBudget", "policy", "v1"),
    ("ValidatingWebhookConfiguration", "admissionregistration.k8s.io", "v1"),
    ("MutatingWebhookConfiguration", "admissionregistration.k8s.io", "v1"),
    ("CustomResourceDefinition", "apiextensions.k8s.io", "v1"),
];

/// Group tie-break when several groups serve the same kind
pub fn group_priority(group: &str) -> i32 {
    match group {
        "apps" => 20,
        "networking.k8s.io" => 15,
        "extensions" => 10,
        _ => 0,
    }
}

/// Built-in group/version guess for a capitalized kind
pub fn guess_group_version(kind: &str) -> Option<(&'static str, &'static str)> {
    BUILTIN_KINDS
        .iter()
        .find(|(k, _, _)| *k == kind)
        .map(|(_, group, version)| (*group, *version))
}

/// Upper-case the first character, leaving the rest untouched
pub fn capitalize(kind: &str) -> String {
    let mut chars = kind.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Order API versions: higher major first, then stable > beta > alpha,
/// then higher pre-release number.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    fn split(version: &str) -> (u32, u8, u32) {
        let rest = version.strip_prefix('v').unwrap_or(version);
        let (major, stage, pre) = if let Some((major, pre)) = rest.split_once("alpha") {
            (major, 0, pre)
        } else if let Some((major, pre)) = rest.split_once("beta") {
            (major, 1, pre)
        } else {
            (rest, 2, "")
        };
        (
            leading_number(major),
            stage,
            leading_number(pre),
        )
    }

    fn leading_number(s: &str) -> u32 {
        let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().unwrap_or(0)
    }

    split(a).cmp(&split(b))
}

/// Concrete resource for a kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GvrMapping {
    pub kind: String,
    pub group: String,
    pub version: String,
    /// Plural resource name
    pub resource: String,
    pub namespaced: bool,
}

impl GvrMapping {
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    pub fn group_version_kind(&self) -> GroupVersionKind {
        GroupVersionKind::gvk(&self.group, &self.version, &self.kind)
    }

    pub fn api_resource(&self) -> ApiResource {
        ApiResource::from_gvk_with_plural(&self.group_version_kind(), &self.resource)
    }
}

#[derive(Debug, Default)]
struct DiscoverySnapshot {
    groups: Vec<ApiGroupInfo>,
    /// Resources keyed by group/version string
    resources: BTreeMap<String, Vec<ApiResourceInfo>>,
    /// Group/versions whose resource listing failed, with the error
    failed: BTreeMap<String, String>,
}

struct Candidate<'a> {
    group: &'a ApiGroupInfo,
    version: &'a str,
    resource: &'a ApiResourceInfo,
    exact: bool,
}

impl Candidate<'_> {
    fn to_mapping(&self) -> GvrMapping {
        GvrMapping {
            kind: self.resource.kind.clone(),
            group: self.group.name.clone(),
            version: self.version.to_string(),
            resource: self.resource.name.clone(),
            namespaced: self.resource.namespaced,
        }
    }

    fn is_preferred(&self) -> bool {
        self.group.preferred_version.as_deref() == Some(self.version)
    }
}

fn matches_kind(resource: &ApiResourceInfo, kind: &str) -> bool {
    resource.kind.eq_ignore_ascii_case(kind)
        || resource.name.eq_ignore_ascii_case(kind)
        || resource.singular_name.eq_ignore_ascii_case(kind)
        || resource.short_names.iter().any(|s| s.eq_ignore_ascii_case(kind))
}

impl DiscoverySnapshot {
    fn candidates<'a>(&'a self, kind: &str) -> Vec<Candidate<'a>> {
        let mut found = Vec::new();
        for group in &self.groups {
            for version in &group.versions {
                let gv = group.group_version(version);
                let Some(resources) = self.resources.get(&gv) else {
                    continue;
                };
                for resource in resources.iter().filter(|r| !r.is_subresource()) {
                    if matches_kind(resource, kind) {
                        found.push(Candidate {
                            group,
                            version: version.as_str(),
                            resource,
                            exact: resource.kind == kind,
                        });
                    }
                }
            }
        }
        found
    }

    fn find(&self, kind: &str) -> Option<GvrMapping> {
        let candidates = self.candidates(kind);

        if let Some((group, version)) = guess_group_version(kind) {
            let in_group: Vec<&Candidate> = candidates
                .iter()
                .filter(|c| c.group.name == group && c.resource.kind == kind)
                .collect();
            if let Some(c) = in_group.iter().find(|c| c.version == version) {
                return Some(c.to_mapping());
            }
            if let Some(c) = in_group.iter().find(|c| c.is_preferred()) {
                return Some(c.to_mapping());
            }
        }

        candidates
            .iter()
            .max_by(|a, b| {
                a.exact
                    .cmp(&b.exact)
                    .then_with(|| group_priority(&a.group.name).cmp(&group_priority(&b.group.name)))
                    .then_with(|| a.is_preferred().cmp(&b.is_preferred()))
                    .then_with(|| compare_versions(a.version, b.version))
                    .then_with(|| b.group.name.cmp(&a.group.name))
            })
            .map(Candidate::to_mapping)
    }

    fn find_exact(&self, api_version: &str, kind: &str) -> Option<GvrMapping> {
        let (group, version) = api_version.rsplit_once('/').unwrap_or(("", api_version));
        self.resources
            .get(api_version)?
            .iter()
            .filter(|r| !r.is_subresource())
            .find(|r| r.kind == kind)
            .map(|r| GvrMapping {
                kind: r.kind.clone(),
                group: group.to_string(),
                version: version.to_string(),
                resource: r.name.clone(),
                namespaced: r.namespaced,
            })
    }

    fn preferred_version(&self, group: &str) -> Option<String> {
        let info = self.groups.iter().find(|g| g.name == group)?;
        info.preferred_version.clone().or_else(|| {
            info.versions
                .iter()
                .max_by(|a, b| compare_versions(a, b))
                .cloned()
        })
    }
}

/// Discovery-backed kind resolver with an invalidatable cache
pub struct ResourceMapper<D> {
    discovery: Arc<D>,
    cache: Arc<RwLock<Option<Arc<DiscoverySnapshot>>>>,
}

impl<D> Clone for ResourceMapper<D> {
    fn clone(&self) -> Self {
        Self {
            discovery: self.discovery.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl<D: DiscoveryClient> ResourceMapper<D> {
    pub fn new(discovery: Arc<D>) -> Self {
        Self {
            discovery,
            cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Drop cached discovery data; the next lookup refetches it
    pub async fn invalidate(&self) {
        let mut cache = self.cache.write().await;
        if cache.take().is_some() {
            tracing::debug!("discovery cache invalidated");
        }
    }

    pub async fn is_populated(&self) -> bool {
        self.cache.read().await.is_some()
    }

    async fn snapshot(&self) -> K8sResult<Arc<DiscoverySnapshot>> {
        if let Some(snapshot) = self.cache.read().await.as_ref() {
            return Ok(snapshot.clone());
        }

        let mut cache = self.cache.write().await;
        // Another task may have populated it while we waited for the lock
        if let Some(snapshot) = cache.as_ref() {
            return Ok(snapshot.clone());
        }

        let snapshot = Arc::new(self.populate().await?);
        *cache = Some(snapshot.clone());
        Ok(snapshot)
    }

    async fn populate(&self) -> K8sResult<DiscoverySnapshot> {
        let groups = self
            .discovery
            .server_groups()
            .await
            .map_err(as_discovery_error)?;

        let mut resources = BTreeMap::new();
        let mut failed = BTreeMap::new();
        for group in &groups {
            for version in &group.versions {
                let gv = group.group_version(version);
                match self.discovery.server_resources(&gv).await {
                    Ok(list) => {
                        resources.insert(gv, list);
                    }
                    Err(e) => {
                        tracing::warn!(group_version = %gv, error = %e, "group version unavailable");
                        failed.insert(gv, e.to_string());
                    }
                }
            }
        }

        tracing::debug!(
            groups = groups.len(),
            group_versions = resources.len(),
            failed = failed.len(),
            "discovery cache populated"
        );

        Ok(DiscoverySnapshot {
            groups,
            resources,
            failed,
        })
    }

    /// Error for a snapshot built while some group/versions failed to list.
    ///
    /// A miss against an incomplete snapshot cannot tell an unknown kind
    /// from one served by a group that failed to list, so the snapshot is
    /// dropped and the next lookup refetches it.
    async fn incomplete(&self, snapshot: &DiscoverySnapshot) -> Option<K8sError> {
        let (gv, error) = snapshot.failed.iter().next()?;
        let err = K8sError::DiscoveryUnavailable(format!(
            "{} group version(s) failed to list, first {}: {}",
            snapshot.failed.len(),
            gv,
            error
        ));
        self.invalidate().await;
        Some(err)
    }

    /// Resolve a kind, plural, singular or short name to its served resource
    pub async fn resolve(&self, kind: &str) -> K8sResult<GvrMapping> {
        let kind = capitalize(kind.trim());
        if kind.is_empty() {
            return Err(K8sError::ResourceKindNotFound(kind));
        }

        let snapshot = self.snapshot().await?;
        match snapshot.find(&kind) {
            Some(mapping) => Ok(mapping),
            None => Err(self
                .incomplete(&snapshot)
                .await
                .unwrap_or(K8sError::ResourceKindNotFound(kind))),
        }
    }

    /// Resolve a kind at an exact `apiVersion`, as written in a manifest
    pub async fn resolve_exact(&self, api_version: &str, kind: &str) -> K8sResult<GvrMapping> {
        let snapshot = self.snapshot().await?;
        match snapshot.find_exact(api_version, kind) {
            Some(mapping) => Ok(mapping),
            None => Err(self.incomplete(&snapshot).await.unwrap_or_else(|| {
                K8sError::ResourceKindNotFound(format!("{}, Kind={}", api_version, kind))
            })),
        }
    }

    /// Whether a kind is namespace-scoped.
    ///
    /// Asks discovery for the group/version and returns `false` when no
    /// entry names the kind.
    pub async fn is_namespaced(&self, gvk: &GroupVersionKind) -> K8sResult<bool> {
        let gv = if gvk.group.is_empty() {
            gvk.version.clone()
        } else {
            format!("{}/{}", gvk.group, gvk.version)
        };

        let resources = self
            .discovery
            .server_resources(&gv)
            .await
            .map_err(as_discovery_error)?;

        Ok(resources
            .iter()
            .filter(|r| !r.is_subresource())
            .find(|r| r.name == gvk.kind || r.kind == gvk.kind)
            .map(|r| r.namespaced)
            .unwrap_or(false))
    }

    /// Preferred version of an API group, if the group is served
    pub async fn preferred_version(&self, group: &str) -> K8sResult<Option<String>> {
        Ok(self.snapshot().await?.preferred_version(group))
    }

    /// Every top-level resource at its group's preferred version
    pub async fn served_kinds(&self) -> K8sResult<Vec<GvrMapping>> {
        let snapshot = self.snapshot().await?;
        if let Some(err) = self.incomplete(&snapshot).await {
            return Err(err);
        }
        let mut kinds = Vec::new();
        for group in &snapshot.groups {
            let Some(version) = snapshot.preferred_version(&group.name) else {
                continue;
            };
            let Some(resources) = snapshot.resources.get(&group.group_version(&version)) else {
                continue;
            };
            kinds.extend(resources.iter().filter(|r| !r.is_subresource()).map(|r| GvrMapping {
                kind: r.kind.clone(),
                group: group.name.clone(),
                version: version.clone(),
                resource: r.name.clone(),
                namespaced: r.namespaced,
            }));
        }
        kinds.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.group.cmp(&b.group)));
        Ok(kinds)
    }
}

fn as_discovery_error(err: K8sError) -> K8sError {
    match err {
        K8sError::DiscoveryUnavailable(_) => err,
        other => K8sError::DiscoveryUnavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("deployment"), "Deployment");
        assert_eq!(capitalize("statefulSet"), "StatefulSet");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("v1", "v1beta1"), Ordering::Greater);
        assert_eq!(compare_versions("v1beta1", "v1alpha1"), Ordering::Greater);
        assert_eq!(compare_versions("v1beta2", "v1beta1"), Ordering::Greater);
        assert_eq!(compare_versions("v2", "v1"), Ordering::Greater);
        assert_eq!(compare_versions("v2beta1", "v1"), Ordering::Greater);
        assert_eq!(compare_versions("v1", "v1"), Ordering::Equal);
    }

    #[test]
    fn test_group_priority() {
        assert!(group_priority("apps") > group_priority("networking.k8s.io"));
        assert!(group_priority("networking.k8s.io") > group_priority("extensions"));
        assert_eq!(group_priority("example.com"), 0);
    }

    #[test]
    fn test_builtin_guess() {
        assert_eq!(guess_group_version("Deployment"), Some(("apps", "v1")));
        assert_eq!(guess_group_version("Pod"), Some(("", "v1")));
        assert_eq!(guess_group_version("Widget"), None);
    }

    #[test]
    fn test_mapping_api_resource() {
        let mapping = GvrMapping {
            kind: "Ingress".into(),
            group: "networking.k8s.io".into(),
            version: "v1".into(),
            resource: "ingresses".into(),
            namespaced: true,
        };
        let ar = mapping.api_resource();
        assert_eq!(ar.api_version, "networking.k8s.io/v1");
        assert_eq!(ar.plural, "ingresses");
        assert_eq!(mapping.api_version(), "networking.k8s.io/v1");
    }

    fn resource(name: &str, kind: &str, namespaced: bool) -> ApiResourceInfo {
        ApiResourceInfo {
            name: name.into(),
            singular_name: String::new(),
            kind: kind.into(),
            namespaced,
            short_names: vec![],
        }
    }

    #[test]
    fn test_snapshot_prefers_group_priority() {
        let groups = vec![
            ApiGroupInfo {
                name: "extensions".into(),
                versions: vec!["v1beta1".into()],
                preferred_version: Some("v1beta1".into()),
            },
            ApiGroupInfo {
                name: "example.com".into(),
                versions: vec!["v1".into()],
                preferred_version: Some("v1".into()),
            },
        ];
        let mut resources = BTreeMap::new();
        resources.insert("extensions/v1beta1".into(), vec![resource("gadgets", "Gadget", true)]);
        resources.insert("example.com/v1".into(), vec![resource("gadgets", "Gadget", false)]);
        let snapshot = DiscoverySnapshot {
            groups,
            resources,
            failed: BTreeMap::new(),
        };

        let mapping = snapshot.find("Gadget").unwrap();
        assert_eq!(mapping.group, "extensions");
        assert!(mapping.namespaced);

        let exact = snapshot.find_exact("example.com/v1", "Gadget").unwrap();
        assert_eq!(exact.group, "example.com");
        assert!(!exact.namespaced);
        assert!(snapshot.find_exact("example.com/v2", "Gadget").is_none());
    }
}
