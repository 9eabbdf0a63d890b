//! Cluster seams
//!
//! The engine talks to the cluster only through these traits. [`K8sClient`]
//! implements them over kube-rs; tests substitute an in-memory cluster.
//!
//! [`K8sClient`]: crate::client::K8sClient

use async_trait::async_trait;
use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhookConfiguration, ValidatingWebhookConfiguration,
};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::{
    Endpoints, Event, Node, PersistentVolumeClaim, Pod, Secret, Service,
};
use k8s_openapi::api::networking::v1::{Ingress, IngressClass, NetworkPolicy};
use kube::api::{Api, DynamicObject};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

use crate::discovery::GvrMapping;
use crate::error::K8sResult;
use crate::types::{ApiGroupInfo, ApiResourceInfo, ListQuery, PodLogQuery, PodMetrics};

/// A typed object the engine can list and fetch
pub trait ClusterObject:
    Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned + Serialize + Send + Sync + 'static
{
    const NAMESPACED: bool;

    /// Typed API handle; `None` spans all namespaces
    fn api(client: Client, namespace: Option<&str>) -> Api<Self>;
}

macro_rules! namespaced_objects {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ClusterObject for $ty {
                const NAMESPACED: bool = true;

                fn api(client: Client, namespace: Option<&str>) -> Api<Self> {
                    match namespace {
                        Some(ns) => Api::namespaced(client, ns),
                        None => Api::all(client),
                    }
                }
            }
        )*
    };
}

macro_rules! cluster_objects {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ClusterObject for $ty {
                const NAMESPACED: bool = false;

                fn api(client: Client, _namespace: Option<&str>) -> Api<Self> {
                    Api::all(client)
                }
            }
        )*
    };
}

namespaced_objects!(
    Pod,
    Deployment,
    StatefulSet,
    DaemonSet,
    ReplicaSet,
    Service,
    Endpoints,
    Event,
    Secret,
    PersistentVolumeClaim,
    Ingress,
    NetworkPolicy,
    CronJob,
);

cluster_objects!(
    Node,
    IngressClass,
    ValidatingWebhookConfiguration,
    MutatingWebhookConfiguration,
);

/// Typed object client
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// List objects; `namespace = None` lists across all namespaces
    async fn list<K: ClusterObject>(
        &self,
        namespace: Option<&str>,
        query: &ListQuery,
    ) -> K8sResult<Vec<K>>;

    /// Fetch one object; a missing object is `Ok(None)`
    async fn get<K: ClusterObject>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> K8sResult<Option<K>>;
}

/// Untyped object client addressed by a resolved mapping
#[async_trait]
pub trait DynamicClient: Send + Sync {
    async fn list_dynamic(
        &self,
        mapping: &GvrMapping,
        namespace: Option<&str>,
        query: &ListQuery,
    ) -> K8sResult<Vec<DynamicObject>>;

    async fn get_dynamic(
        &self,
        mapping: &GvrMapping,
        namespace: Option<&str>,
        name: &str,
    ) -> K8sResult<Option<DynamicObject>>;

    async fn delete_dynamic(
        &self,
        mapping: &GvrMapping,
        namespace: Option<&str>,
        name: &str,
    ) -> K8sResult<()>;

    /// Server-side apply under the given field manager
    async fn apply_dynamic(
        &self,
        mapping: &GvrMapping,
        namespace: Option<&str>,
        object: &DynamicObject,
        field_manager: &str,
    ) -> K8sResult<DynamicObject>;
}

/// API discovery
#[async_trait]
pub trait DiscoveryClient: Send + Sync {
    /// All served groups, the core group included under the empty name
    async fn server_groups(&self) -> K8sResult<Vec<ApiGroupInfo>>;

    /// Resources served under `group_version` (`v1`, `apps/v1`, ...)
    async fn server_resources(&self, group_version: &str) -> K8sResult<Vec<ApiResourceInfo>>;
}

/// metrics.k8s.io pod samples
#[async_trait]
pub trait MetricsClient: Send + Sync {
    async fn list_pod_metrics(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> K8sResult<Vec<PodMetrics>>;

    async fn get_pod_metrics(&self, namespace: &str, name: &str) -> K8sResult<Option<PodMetrics>>;
}

/// Container log access
#[async_trait]
pub trait LogClient: Send + Sync {
    /// Log text of one container of a pod
    async fn pod_logs(&self, namespace: &str, name: &str, query: &PodLogQuery) -> K8sResult<String>;
}

/// Everything the engine needs from a cluster
pub trait ClusterApi:
    ClusterClient + DynamicClient + DiscoveryClient + MetricsClient + LogClient
{
}

impl<T> ClusterApi for T where
    T: ClusterClient + DynamicClient + DiscoveryClient + MetricsClient + LogClient
{
}
