//! Generic resource passthroughs
//!
//! List, get, delete and server-side apply for any kind the cluster serves.
//! The [`ResourceMapper`] is the only authority on which resource a kind
//! string names and whether it is namespaced. Objects of kinds the engine
//! models natively come back typed; everything else stays a
//! [`DynamicObject`].

use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhookConfiguration, ValidatingWebhookConfiguration,
};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::{Endpoints, Node, Pod, Service};
use k8s_openapi::api::networking::v1::{Ingress, NetworkPolicy};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::DynamicObject;
use kube::core::TypeMeta;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::api::{DiscoveryClient, DynamicClient};
use crate::discovery::{GvrMapping, ResourceMapper};
use crate::error::{K8sError, K8sResult};
use crate::types::ListQuery;

/// Namespace used when a namespaced kind is addressed without one
pub const DEFAULT_NAMESPACE: &str = "default";

const CRD_KIND: &str = "CustomResourceDefinition";

static MANIFEST_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n---\r?\n").expect("valid manifest separator"));

macro_rules! known_resources {
    ($($variant:ident),* $(,)?) => {
        /// An object of a kind the engine has a typed model for
        #[derive(Debug, Clone, Serialize)]
        #[serde(untagged)]
        pub enum KnownResource {
            $($variant($variant),)*
        }

        impl KnownResource {
            fn from_value(
                api_version: &str,
                kind: &str,
                value: serde_json::Value,
            ) -> K8sResult<Option<Self>> {
                $(
                    if api_version == <$variant as k8s_openapi::Resource>::API_VERSION
                        && kind == <$variant as k8s_openapi::Resource>::KIND
                    {
                        return Ok(Some(KnownResource::$variant(serde_json::from_value(value)?)));
                    }
                )*
                Ok(None)
            }

            pub fn kind(&self) -> &str {
                match self {
                    $(KnownResource::$variant(_) => <$variant as k8s_openapi::Resource>::KIND,)*
                }
            }

            pub fn metadata(&self) -> &ObjectMeta {
                match self {
                    $(KnownResource::$variant(o) => &o.metadata,)*
                }
            }
        }
    };
}

known_resources!(
    Pod,
    Deployment,
    StatefulSet,
    DaemonSet,
    ReplicaSet,
    Service,
    Endpoints,
    Ingress,
    NetworkPolicy,
    CronJob,
    Node,
    ValidatingWebhookConfiguration,
    MutatingWebhookConfiguration,
);

/// An object returned by the passthroughs
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ClusterResource {
    Known(KnownResource),
    Generic(DynamicObject),
}

impl ClusterResource {
    /// Shape a raw object according to its resolved mapping.
    ///
    /// `managedFields` is dropped and `apiVersion`/`kind` are filled in from
    /// the mapping, since list responses omit them per item.
    pub fn from_dynamic(mapping: &GvrMapping, mut object: DynamicObject) -> K8sResult<Self> {
        let api_version = mapping.api_version();
        object.metadata.managed_fields = None;
        object.types = Some(TypeMeta {
            api_version: api_version.clone(),
            kind: mapping.kind.clone(),
        });

        let value = serde_json::to_value(&object)?;
        Ok(match KnownResource::from_value(&api_version, &mapping.kind, value)? {
            Some(known) => ClusterResource::Known(known),
            None => ClusterResource::Generic(object),
        })
    }

    pub fn kind(&self) -> &str {
        match self {
            ClusterResource::Known(known) => known.kind(),
            ClusterResource::Generic(object) => object
                .types
                .as_ref()
                .map(|t| t.kind.as_str())
                .unwrap_or_default(),
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            ClusterResource::Known(known) => known.metadata(),
            ClusterResource::Generic(object) => &object.metadata,
        }
    }

    pub fn name(&self) -> String {
        self.metadata().name.clone().unwrap_or_default()
    }

    pub fn namespace(&self) -> Option<String> {
        self.metadata().namespace.clone()
    }

    pub fn is_known(&self) -> bool {
        matches!(self, ClusterResource::Known(_))
    }
}

/// Resolved resource plus the namespace to address it in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTarget {
    pub mapping: GvrMapping,
    /// `None` for cluster-scoped kinds
    pub namespace: Option<String>,
}

impl ResourceTarget {
    /// `ns/name`, or the bare name for cluster-scoped kinds
    pub fn qualify(&self, name: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{}/{}", ns, name),
            None => name.to_string(),
        }
    }
}

pub fn namespace_or_default(namespace: Option<&str>) -> String {
    namespace
        .filter(|ns| !ns.is_empty())
        .unwrap_or(DEFAULT_NAMESPACE)
        .to_string()
}

/// Resolve a kind and decide its namespace.
///
/// Scope is answered by discovery before the namespace is defaulted.
pub async fn resolve_target<D: DiscoveryClient>(
    mapper: &ResourceMapper<D>,
    kind: &str,
    namespace: Option<&str>,
) -> K8sResult<ResourceTarget> {
    let mapping = mapper.resolve(kind).await?;
    scoped_target(mapper, mapping, namespace).await
}

async fn scoped_target<D: DiscoveryClient>(
    mapper: &ResourceMapper<D>,
    mapping: GvrMapping,
    namespace: Option<&str>,
) -> K8sResult<ResourceTarget> {
    let namespaced = mapper.is_namespaced(&mapping.group_version_kind()).await?;
    let namespace = namespaced.then(|| namespace_or_default(namespace));
    Ok(ResourceTarget { mapping, namespace })
}

/// List objects of any served kind
pub async fn list_resources<C>(
    client: &C,
    mapper: &ResourceMapper<C>,
    kind: &str,
    namespace: Option<&str>,
    query: &ListQuery,
) -> K8sResult<Vec<ClusterResource>>
where
    C: DynamicClient + DiscoveryClient,
{
    let target = resolve_target(mapper, kind, namespace).await?;
    let objects = client
        .list_dynamic(&target.mapping, target.namespace.as_deref(), query)
        .await?;

    tracing::debug!(kind = %target.mapping.kind, count = objects.len(), "listed resources");

    objects
        .into_iter()
        .map(|o| ClusterResource::from_dynamic(&target.mapping, o))
        .collect()
}

/// Fetch one object of any served kind
pub async fn get_resource<C>(
    client: &C,
    mapper: &ResourceMapper<C>,
    kind: &str,
    namespace: Option<&str>,
    name: &str,
) -> K8sResult<ClusterResource>
where
    C: DynamicClient + DiscoveryClient,
{
    let target = resolve_target(mapper, kind, namespace).await?;
    let object = client
        .get_dynamic(&target.mapping, target.namespace.as_deref(), name)
        .await?
        .ok_or_else(|| K8sError::ResourceNotFound {
            kind: target.mapping.kind.clone(),
            name: name.to_string(),
            namespace: target.namespace.clone().unwrap_or_default(),
        })?;

    ClusterResource::from_dynamic(&target.mapping, object)
}

/// Delete one object and return a confirmation line
pub async fn delete_resource<C>(
    client: &C,
    mapper: &ResourceMapper<C>,
    kind: &str,
    namespace: Option<&str>,
    name: &str,
) -> K8sResult<String>
where
    C: DynamicClient + DiscoveryClient,
{
    let target = resolve_target(mapper, kind, namespace).await?;
    client
        .delete_dynamic(&target.mapping, target.namespace.as_deref(), name)
        .await?;

    tracing::info!(kind = %target.mapping.kind, object = %target.qualify(name), "resource deleted");

    Ok(format!("Resource {} deleted successfully", target.qualify(name)))
}

/// Split a multi-document YAML stream into objects.
///
/// Empty documents are skipped; every remaining document must carry
/// `apiVersion`, `kind` and `metadata.name`.
pub fn parse_manifests(text: &str) -> K8sResult<Vec<DynamicObject>> {
    let mut objects = Vec::new();

    for (index, document) in MANIFEST_SEPARATOR.split(text).enumerate() {
        if document.trim().is_empty() {
            continue;
        }
        let value: serde_yaml::Value = serde_yaml::from_str(document)
            .map_err(|e| K8sError::InvalidManifest(format!("document {}: {}", index, e)))?;
        if value.is_null() {
            continue;
        }

        let object: DynamicObject = serde_yaml::from_value(value)
            .map_err(|e| K8sError::InvalidManifest(format!("document {}: {}", index, e)))?;

        match &object.types {
            Some(types) if !types.api_version.is_empty() && !types.kind.is_empty() => {}
            _ => {
                return Err(K8sError::InvalidManifest(format!(
                    "document {}: apiVersion and kind are required",
                    index
                )))
            }
        }
        if object.metadata.name.as_deref().map_or(true, str::is_empty) {
            return Err(K8sError::InvalidManifest(format!(
                "document {}: metadata.name is required",
                index
            )));
        }

        objects.push(object);
    }

    Ok(objects)
}

/// Server-side apply every document in a manifest, in order.
///
/// Stops at the first failure. Applying a CustomResourceDefinition drops the
/// discovery cache so later documents can use the new kind.
pub async fn apply_manifests<C>(
    client: &C,
    mapper: &ResourceMapper<C>,
    text: &str,
    field_manager: &str,
) -> K8sResult<Vec<ClusterResource>>
where
    C: DynamicClient + DiscoveryClient,
{
    let objects = parse_manifests(text)?;
    let mut applied = Vec::with_capacity(objects.len());

    for object in objects {
        let (api_version, kind) = match &object.types {
            Some(t) => (t.api_version.clone(), t.kind.clone()),
            None => continue,
        };

        let mapping = mapper.resolve_exact(&api_version, &kind).await?;
        let target =
            scoped_target(mapper, mapping, object.metadata.namespace.as_deref()).await?;

        let result = client
            .apply_dynamic(&target.mapping, target.namespace.as_deref(), &object, field_manager)
            .await?;

        tracing::info!(
            kind = %kind,
            object = %target.qualify(object.metadata.name.as_deref().unwrap_or_default()),
            "resource applied"
        );

        if kind == CRD_KIND {
            mapper.invalidate().await;
        }

        applied.push(ClusterResource::from_dynamic(&target.mapping, result)?);
    }

    Ok(applied)
}
