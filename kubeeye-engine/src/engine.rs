//! Health engine
//!
//! Single entry point over the analyzers, the usage aggregator and the
//! generic resource passthroughs. Holds the cluster handle, the shared
//! discovery cache and the analysis settings.

use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhookConfiguration, ValidatingWebhookConfiguration,
};
use kubeeye_common::{AnalysisResult, AnalyzerKind, WorkloadKind, WorkloadMetrics};
use std::sync::Arc;

use crate::api::ClusterApi;
use crate::cluster_resources::nodes::analyze_nodes;
use crate::cluster_resources::webhooks::analyze_webhooks;
use crate::config::AnalysisSettings;
use crate::discovery::{GvrMapping, ResourceMapper};
use crate::error::K8sResult;
use crate::networking::ingress::analyze_ingresses;
use crate::networking::network_policies::analyze_network_policies;
use crate::networking::services::analyze_services;
use crate::observability::{logs, metrics};
use crate::report::to_json;
use crate::resources::{self, ClusterResource};
use crate::types::{AnalysisScope, ListQuery, PodLogQuery};
use crate::workloads::cronjobs::analyze_cronjobs;
use crate::workloads::deployments::analyze_deployments;
use crate::workloads::pods::analyze_pods;
use crate::workloads::statefulsets::analyze_statefulsets;

/// Cluster health analysis engine
pub struct HealthEngine<C> {
    client: Arc<C>,
    mapper: ResourceMapper<C>,
    settings: AnalysisSettings,
}

impl<C> Clone for HealthEngine<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            mapper: self.mapper.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<C: ClusterApi> HealthEngine<C> {
    pub fn new(client: C, settings: AnalysisSettings) -> Self {
        let client = Arc::new(client);
        Self {
            mapper: ResourceMapper::new(client.clone()),
            client,
            settings,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn mapper(&self) -> &ResourceMapper<C> {
        &self.mapper
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// Run one analyzer over `scope`.
    ///
    /// Results contain only failing objects, sorted by identity.
    pub async fn analyze(&self, kind: AnalyzerKind, scope: &AnalysisScope) -> K8sResult<Vec<AnalysisResult>> {
        let client = self.client.as_ref();
        let settings = &self.settings;

        tracing::debug!(
            kind = %kind,
            namespace = scope.namespace_ref().unwrap_or("*"),
            "running analyzer"
        );

        match kind {
            AnalyzerKind::Pod => analyze_pods(client, scope, settings).await,
            AnalyzerKind::Node => analyze_nodes(client, scope, settings).await,
            AnalyzerKind::Deployment => analyze_deployments(client, scope, settings).await,
            AnalyzerKind::StatefulSet => analyze_statefulsets(client, scope, settings).await,
            AnalyzerKind::Service => analyze_services(client, scope, settings).await,
            AnalyzerKind::Ingress => analyze_ingresses(client, scope, settings).await,
            AnalyzerKind::NetworkPolicy => analyze_network_policies(client, scope, settings).await,
            AnalyzerKind::CronJob => analyze_cronjobs(client, scope, settings).await,
            AnalyzerKind::ValidatingWebhookConfiguration => {
                analyze_webhooks::<ValidatingWebhookConfiguration, _>(client, scope, settings).await
            }
            AnalyzerKind::MutatingWebhookConfiguration => {
                analyze_webhooks::<MutatingWebhookConfiguration, _>(client, scope, settings).await
            }
        }
    }

    /// [`analyze`](Self::analyze) rendered as compact JSON (`[]` when healthy)
    pub async fn analyze_json(&self, kind: AnalyzerKind, scope: &AnalysisScope) -> K8sResult<String> {
        to_json(&self.analyze(kind, scope).await?)
    }

    /// Point-in-time CPU and memory per workload
    pub async fn workload_usage(
        &self,
        kind: WorkloadKind,
        namespace: Option<&str>,
        name: Option<&str>,
        label_selector: Option<&str>,
    ) -> K8sResult<Vec<WorkloadMetrics>> {
        metrics::workload_usage(self.client.as_ref(), kind, namespace, name, label_selector).await
    }

    /// Log tail of a pod (200 lines unless the query says otherwise)
    pub async fn pod_logs(
        &self,
        namespace: Option<&str>,
        name: &str,
        query: &PodLogQuery,
    ) -> K8sResult<String> {
        logs::pod_logs(self.client.as_ref(), namespace, name, query).await
    }

    pub async fn list_resources(
        &self,
        kind: &str,
        namespace: Option<&str>,
        query: &ListQuery,
    ) -> K8sResult<Vec<ClusterResource>> {
        resources::list_resources(self.client.as_ref(), &self.mapper, kind, namespace, query).await
    }

    pub async fn get_resource(
        &self,
        kind: &str,
        namespace: Option<&str>,
        name: &str,
    ) -> K8sResult<ClusterResource> {
        resources::get_resource(self.client.as_ref(), &self.mapper, kind, namespace, name).await
    }

    pub async fn delete_resource(&self, kind: &str, namespace: Option<&str>, name: &str) -> K8sResult<String> {
        resources::delete_resource(self.client.as_ref(), &self.mapper, kind, namespace, name).await
    }

    /// Server-side apply a multi-document YAML manifest
    pub async fn apply_manifests(&self, manifest: &str) -> K8sResult<Vec<ClusterResource>> {
        resources::apply_manifests(
            self.client.as_ref(),
            &self.mapper,
            manifest,
            &self.settings.field_manager,
        )
        .await
    }

    /// Every top-level kind the cluster serves
    pub async fn served_kinds(&self) -> K8sResult<Vec<GvrMapping>> {
        self.mapper.served_kinds().await
    }

    /// Preferred version of an API group, if served
    pub async fn preferred_version(&self, group: &str) -> K8sResult<Option<String>> {
        self.mapper.preferred_version(group).await
    }
}
