//! Admission webhook analysis
//!
//! Validating and mutating configurations share one check battery. Each
//! webhook entry is checked independently and every violated rule is its
//! own finding, labelled `Webhook #<index> (<name>)`.

use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhookConfiguration, ServiceReference, ValidatingWebhookConfiguration,
    WebhookClientConfig,
};
use k8s_openapi::api::core::v1::{Pod, Service};
use kubeeye_common::{AnalysisResult, Failure};

use crate::api::{ClusterClient, ClusterObject};
use crate::config::AnalysisSettings;
use crate::error::K8sResult;
use crate::report::{aggregate, check_all, doc_ref};
use crate::selectors::match_labels_to_selector;
use crate::types::{AnalysisScope, ListQuery};

const API_VERSION: &str = "admissionregistration.k8s.io/v1";

/// The parts of a webhook entry the checks look at
#[derive(Debug, Clone)]
pub struct WebhookEntry {
    pub name: String,
    pub client_config: WebhookClientConfig,
    pub rule_count: usize,
}

/// A webhook configuration kind
pub trait WebhookConfiguration: ClusterObject {
    const KIND: &'static str;

    /// Mutating findings name the referenced service in full
    const QUALIFY_SERVICE: bool;

    fn entries(&self) -> Vec<WebhookEntry>;
}

impl WebhookConfiguration for ValidatingWebhookConfiguration {
    const KIND: &'static str = "ValidatingWebhookConfiguration";
    const QUALIFY_SERVICE: bool = false;

    fn entries(&self) -> Vec<WebhookEntry> {
        self.webhooks
            .iter()
            .flatten()
            .map(|wh| WebhookEntry {
                name: wh.name.clone(),
                client_config: wh.client_config.clone(),
                rule_count: wh.rules.as_ref().map_or(0, Vec::len),
            })
            .collect()
    }
}

impl WebhookConfiguration for MutatingWebhookConfiguration {
    const KIND: &'static str = "MutatingWebhookConfiguration";
    const QUALIFY_SERVICE: bool = true;

    fn entries(&self) -> Vec<WebhookEntry> {
        self.webhooks
            .iter()
            .flatten()
            .map(|wh| WebhookEntry {
                name: wh.name.clone(),
                client_config: wh.client_config.clone(),
                rule_count: wh.rules.as_ref().map_or(0, Vec::len),
            })
            .collect()
    }
}

/// Analyze every configuration of kind `W`; the scope namespace is ignored
pub async fn analyze_webhooks<W, C>(
    client: &C,
    scope: &AnalysisScope,
    settings: &AnalysisSettings,
) -> K8sResult<Vec<AnalysisResult>>
where
    W: WebhookConfiguration,
    C: ClusterClient,
{
    let configs: Vec<W> = client.list(None, &scope.list_query()).await?;

    let analysis = check_all(configs, settings.concurrency, |config| async move {
        let mut failures = Vec::new();
        for (index, entry) in config.entries().iter().enumerate() {
            failures.extend(webhook_failures::<W, C>(client, index, entry).await?);
        }
        Ok((config, failures))
    })
    .await?;

    aggregate(client, W::KIND, analysis, settings.max_owner_depth).await
}

/// Findings for one webhook entry
pub async fn webhook_failures<W, C>(
    client: &C,
    index: usize,
    entry: &WebhookEntry,
) -> K8sResult<Vec<Failure>>
where
    W: WebhookConfiguration,
    C: ClusterClient,
{
    let label = format!("Webhook #{} ({})", index, entry.name);
    let doc = |field: &str| doc_ref(API_VERSION, W::KIND, field);
    let mut failures = Vec::new();

    match &entry.client_config.service {
        Some(reference) => {
            failures.extend(service_failures::<W, C>(client, &label, reference).await?);
        }
        None if entry.client_config.url.is_none() => failures.push(Failure::with_doc(
            format!("{} has neither service reference nor URL", label),
            doc("webhooks.clientConfig"),
        )),
        None => {}
    }

    let ca_empty = entry
        .client_config
        .ca_bundle
        .as_ref()
        .map_or(true, |bundle| bundle.0.is_empty());
    if ca_empty {
        failures.push(Failure::with_doc(
            format!("{} has empty CA bundle", label),
            doc("webhooks.clientConfig.caBundle"),
        ));
    }

    if entry.rule_count == 0 {
        failures.push(Failure::with_doc(
            format!("{} has no rules", label),
            doc("webhooks.rules"),
        ));
    }

    Ok(failures)
}

/// Checks on the service a webhook is served from.
///
/// A failed pod listing aborts the run rather than becoming a finding.
async fn service_failures<W, C>(
    client: &C,
    label: &str,
    reference: &ServiceReference,
) -> K8sResult<Vec<Failure>>
where
    W: WebhookConfiguration,
    C: ClusterClient,
{
    let service_doc = doc_ref(API_VERSION, W::KIND, "webhooks.clientConfig.service");
    let qualified = format!("{}/{}", reference.namespace, reference.name);

    let Some(service) = client
        .get::<Service>(Some(&reference.namespace), &reference.name)
        .await?
    else {
        let text = if W::QUALIFY_SERVICE {
            format!("{} references service {} which does not exist", label, qualified)
        } else {
            format!("{} references service which does not exist", label)
        };
        return Ok(vec![Failure::with_doc(text, service_doc)]);
    };

    let spec = service.spec.unwrap_or_default();
    let mut failures = Vec::new();

    if let Some(port) = reference.port {
        let exposed = spec.ports.iter().flatten().any(|p| p.port == port);
        if !exposed {
            let text = if W::QUALIFY_SERVICE {
                format!(
                    "{} references service port {} which does not exist in service {}",
                    label, port, qualified
                )
            } else {
                format!("{} references service port {} which does not exist in service", label, port)
            };
            failures.push(Failure::with_doc(
                text,
                doc_ref(API_VERSION, W::KIND, "webhooks.clientConfig.service.port"),
            ));
        }
    }

    let selector = spec.selector.unwrap_or_default();
    if selector.is_empty() {
        failures.push(Failure::with_doc(
            format!("{} references service which does not have a selector", label),
            service_doc,
        ));
        return Ok(failures);
    }

    let query = ListQuery::new().labels(&match_labels_to_selector(&selector));
    let pods: Vec<Pod> = client.list(Some(&reference.namespace), &query).await?;

    if pods.is_empty() {
        failures.push(Failure::with_doc(
            format!("{} references service which does not have pods", label),
            service_doc.clone(),
        ));
    }

    let inactive = pods
        .iter()
        .any(|pod| pod.status.as_ref().and_then(|s| s.phase.as_deref()) != Some("Running"));
    if inactive {
        failures.push(Failure::with_doc(
            format!("{} references service which have inactive pods", label),
            service_doc,
        ));
    }

    Ok(failures)
}
