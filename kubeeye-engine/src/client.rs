//! Kubernetes client wrapper
//!
//! Wraps the kube-rs Client and implements the cluster seams from
//! [`crate::api`] on top of it.

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::Path;

use crate::api::{
    ClusterClient, ClusterObject, DiscoveryClient, DynamicClient, LogClient, MetricsClient,
};
use crate::config::ClusterSettings;
use crate::discovery::GvrMapping;
use crate::error::{K8sError, K8sResult};
use crate::observability::metrics::pod_metrics_from_value;
use crate::types::{ApiGroupInfo, ApiResourceInfo, ListQuery, PodLogQuery, PodMetrics};

const METRICS_API_PREFIX: &str = "/apis/metrics.k8s.io/v1beta1";

/// Wrapper around kube-rs Client with cluster context
#[derive(Clone)]
pub struct K8sClient {
    inner: Client,
    api_server: String,
}

impl K8sClient {
    /// Create client from kubeconfig YAML with optional context
    pub async fn from_kubeconfig(kubeconfig_yaml: &str, context: Option<&str>) -> K8sResult<Self> {
        let kubeconfig = Kubeconfig::from_yaml(kubeconfig_yaml).map_err(|e| {
            K8sError::InvalidKubeconfig(format!("Failed to parse kubeconfig: {}", e))
        })?;

        let api_server = Self::extract_api_server(&kubeconfig, context)?;

        let config = Config::from_custom_kubeconfig(
            kubeconfig,
            &KubeConfigOptions {
                context: context.map(String::from),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| K8sError::InvalidKubeconfig(format!("Failed to create config: {}", e)))?;

        let client = Client::try_from(config)
            .map_err(|e| K8sError::InvalidKubeconfig(format!("Failed to create client: {}", e)))?;

        Ok(Self {
            inner: client,
            api_server,
        })
    }

    /// Create client from a kubeconfig file on disk
    pub async fn from_kubeconfig_file(path: &Path, context: Option<&str>) -> K8sResult<Self> {
        let yaml = tokio::fs::read_to_string(path).await.map_err(|e| {
            K8sError::InvalidKubeconfig(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_kubeconfig(&yaml, context).await
    }

    /// Create client from in-cluster configuration (for running inside K8s)
    pub async fn from_incluster() -> K8sResult<Self> {
        let config = Config::incluster().map_err(|e| {
            K8sError::InvalidKubeconfig(format!("Failed to get in-cluster config: {}", e))
        })?;
        Self::from_config(config)
    }

    /// Infer configuration the way kubectl does (KUBECONFIG, ~/.kube/config, in-cluster)
    pub async fn infer() -> K8sResult<Self> {
        let config = Config::infer()
            .await
            .map_err(|e| K8sError::InvalidKubeconfig(format!("Failed to infer config: {}", e)))?;
        Self::from_config(config)
    }

    /// Create client according to the cluster settings
    pub async fn from_settings(settings: &ClusterSettings) -> K8sResult<Self> {
        if settings.in_cluster {
            return Self::from_incluster().await;
        }
        match &settings.kubeconfig {
            Some(path) => Self::from_kubeconfig_file(path, settings.context.as_deref()).await,
            None if settings.context.is_some() => {
                let kubeconfig = Kubeconfig::read().map_err(|e| {
                    K8sError::InvalidKubeconfig(format!("Failed to read kubeconfig: {}", e))
                })?;
                let config = Config::from_custom_kubeconfig(
                    kubeconfig,
                    &KubeConfigOptions {
                        context: settings.context.clone(),
                        ..Default::default()
                    },
                )
                .await
                .map_err(|e| {
                    K8sError::InvalidKubeconfig(format!("Failed to create config: {}", e))
                })?;
                Self::from_config(config)
            }
            None => Self::infer().await,
        }
    }

    fn from_config(config: Config) -> K8sResult<Self> {
        let api_server = config.cluster_url.to_string();

        let client = Client::try_from(config)
            .map_err(|e| K8sError::InvalidKubeconfig(format!("Failed to create client: {}", e)))?;

        Ok(Self {
            inner: client,
            api_server,
        })
    }

    /// Extract API server URL from kubeconfig
    fn extract_api_server(kubeconfig: &Kubeconfig, context_name: Option<&str>) -> K8sResult<String> {
        let context_name = context_name
            .map(String::from)
            .or_else(|| kubeconfig.current_context.clone())
            .ok_or_else(|| {
                K8sError::InvalidKubeconfig("No context specified and no current-context".into())
            })?;

        let context = kubeconfig
            .contexts
            .iter()
            .find(|c| c.name == context_name)
            .ok_or_else(|| {
                K8sError::InvalidKubeconfig(format!("Context '{}' not found", context_name))
            })?;

        let cluster_name = context
            .context
            .as_ref()
            .map(|c| c.cluster.as_str())
            .ok_or_else(|| {
                K8sError::InvalidKubeconfig("Context has no cluster reference".into())
            })?;

        let cluster = kubeconfig
            .clusters
            .iter()
            .find(|c| c.name == cluster_name)
            .ok_or_else(|| {
                K8sError::InvalidKubeconfig(format!("Cluster '{}' not found", cluster_name))
            })?;

        cluster
            .cluster
            .as_ref()
            .and_then(|c| c.server.clone())
            .ok_or_else(|| K8sError::InvalidKubeconfig("Cluster has no server URL".into()))
    }

    /// Get the inner kube-rs Client
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// Get API server URL
    pub fn api_server(&self) -> &str {
        &self.api_server
    }

    fn dynamic_api(&self, mapping: &GvrMapping, namespace: Option<&str>) -> Api<DynamicObject> {
        let resource = mapping.api_resource();
        match namespace.filter(|_| mapping.namespaced) {
            Some(ns) => Api::namespaced_with(self.inner.clone(), ns, &resource),
            None => Api::all_with(self.inner.clone(), &resource),
        }
    }

    async fn metrics_request(&self, uri: String) -> K8sResult<serde_json::Value> {
        let request = http::Request::builder()
            .method(http::Method::GET)
            .uri(uri)
            .body(vec![])
            .map_err(|e| K8sError::Internal(e.to_string()))?;

        Ok(self.inner.request(request).await?)
    }
}

impl std::fmt::Debug for K8sClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("K8sClient")
            .field("api_server", &self.api_server)
            .finish()
    }
}

#[async_trait]
impl ClusterClient for K8sClient {
    async fn list<K: ClusterObject>(
        &self,
        namespace: Option<&str>,
        query: &ListQuery,
    ) -> K8sResult<Vec<K>> {
        let api = K::api(self.inner.clone(), namespace);
        let list = api.list(&query.to_list_params()).await?;
        Ok(list.items)
    }

    async fn get<K: ClusterObject>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> K8sResult<Option<K>> {
        let api = K::api(self.inner.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }
}

#[async_trait]
impl DynamicClient for K8sClient {
    async fn list_dynamic(
        &self,
        mapping: &GvrMapping,
        namespace: Option<&str>,
        query: &ListQuery,
    ) -> K8sResult<Vec<DynamicObject>> {
        let list = self
            .dynamic_api(mapping, namespace)
            .list(&query.to_list_params())
            .await?;
        Ok(list.items)
    }

    async fn get_dynamic(
        &self,
        mapping: &GvrMapping,
        namespace: Option<&str>,
        name: &str,
    ) -> K8sResult<Option<DynamicObject>> {
        Ok(self.dynamic_api(mapping, namespace).get_opt(name).await?)
    }

    async fn delete_dynamic(
        &self,
        mapping: &GvrMapping,
        namespace: Option<&str>,
        name: &str,
    ) -> K8sResult<()> {
        self.dynamic_api(mapping, namespace)
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }

    async fn apply_dynamic(
        &self,
        mapping: &GvrMapping,
        namespace: Option<&str>,
        object: &DynamicObject,
        field_manager: &str,
    ) -> K8sResult<DynamicObject> {
        let name = object
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| K8sError::InvalidManifest("object has no metadata.name".into()))?;

        let applied = self
            .dynamic_api(mapping, namespace)
            .patch(
                name,
                &PatchParams::apply(field_manager).force(),
                &Patch::Apply(object),
            )
            .await?;
        Ok(applied)
    }
}

#[async_trait]
impl DiscoveryClient for K8sClient {
    async fn server_groups(&self) -> K8sResult<Vec<ApiGroupInfo>> {
        let core = self
            .inner
            .list_core_api_versions()
            .await
            .map_err(|e| K8sError::DiscoveryUnavailable(e.to_string()))?;

        let mut groups = vec![ApiGroupInfo {
            name: String::new(),
            preferred_version: core.versions.first().cloned(),
            versions: core.versions,
        }];

        let list = self
            .inner
            .list_api_groups()
            .await
            .map_err(|e| K8sError::DiscoveryUnavailable(e.to_string()))?;

        groups.extend(list.groups.into_iter().map(|group| ApiGroupInfo {
            name: group.name,
            versions: group.versions.into_iter().map(|v| v.version).collect(),
            preferred_version: group.preferred_version.map(|v| v.version),
        }));

        Ok(groups)
    }

    async fn server_resources(&self, group_version: &str) -> K8sResult<Vec<ApiResourceInfo>> {
        let list = if group_version.contains('/') {
            self.inner.list_api_group_resources(group_version).await
        } else {
            self.inner.list_core_api_resources(group_version).await
        }
        .map_err(|e| K8sError::DiscoveryUnavailable(format!("{}: {}", group_version, e)))?;

        Ok(list
            .resources
            .into_iter()
            .map(|r| ApiResourceInfo {
                name: r.name,
                singular_name: r.singular_name,
                kind: r.kind,
                namespaced: r.namespaced,
                short_names: r.short_names.unwrap_or_default(),
            })
            .collect())
    }
}

#[async_trait]
impl MetricsClient for K8sClient {
    async fn list_pod_metrics(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> K8sResult<Vec<PodMetrics>> {
        let mut uri = match namespace {
            Some(ns) => format!("{}/namespaces/{}/pods", METRICS_API_PREFIX, ns),
            None => format!("{}/pods", METRICS_API_PREFIX),
        };
        if let Some(selector) = label_selector.filter(|s| !s.is_empty()) {
            uri.push_str("?labelSelector=");
            uri.push_str(&urlencoding::encode(selector));
        }

        let response = self.metrics_request(uri).await?;
        let items = response["items"].as_array().cloned().unwrap_or_default();

        Ok(items.iter().filter_map(pod_metrics_from_value).collect())
    }

    async fn get_pod_metrics(&self, namespace: &str, name: &str) -> K8sResult<Option<PodMetrics>> {
        let uri = format!("{}/namespaces/{}/pods/{}", METRICS_API_PREFIX, namespace, name);

        match self.metrics_request(uri).await {
            Ok(response) => Ok(pod_metrics_from_value(&response)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl LogClient for K8sClient {
    async fn pod_logs(&self, namespace: &str, name: &str, query: &PodLogQuery) -> K8sResult<String> {
        use k8s_openapi::api::core::v1::Pod;

        let pods: Api<Pod> = Api::namespaced(self.inner.clone(), namespace);
        Ok(pods.logs(name, &query.to_log_params()).await?)
    }
}
