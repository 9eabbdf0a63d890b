//! Ingress analysis
//!
//! Verifies that the ingress class, every HTTP backend service and every
//! TLS secret an ingress refers to actually exist.

use k8s_openapi::api::core::v1::{Secret, Service};
use k8s_openapi::api::networking::v1::{Ingress, IngressClass};
use kube::ResourceExt;
use kubeeye_common::{AnalysisResult, Failure};

use crate::api::ClusterClient;
use crate::config::AnalysisSettings;
use crate::error::K8sResult;
use crate::report::{aggregate, check_all, doc_ref};
use crate::types::AnalysisScope;

/// Pre-`ingressClassName` way of choosing a class
pub const INGRESS_CLASS_ANNOTATION: &str = "kubernetes.io/ingress.class";

const API_VERSION: &str = "networking.k8s.io/v1";

/// Analyze ingresses in scope
pub async fn analyze_ingresses<C: ClusterClient>(
    client: &C,
    scope: &AnalysisScope,
    settings: &AnalysisSettings,
) -> K8sResult<Vec<AnalysisResult>> {
    let ingresses: Vec<Ingress> = client
        .list(scope.namespace_ref(), &scope.list_query())
        .await?;

    let analysis = check_all(ingresses, settings.concurrency, |ingress| async move {
        let failures = ingress_failures(client, &ingress).await?;
        Ok((ingress, failures))
    })
    .await?;

    aggregate(client, "Ingress", analysis, settings.max_owner_depth).await
}

/// `spec.ingressClassName`, else the legacy annotation
pub fn ingress_class(ingress: &Ingress) -> Option<String> {
    ingress
        .spec
        .as_ref()
        .and_then(|s| s.ingress_class_name.clone())
        .or_else(|| {
            ingress
                .annotations()
                .get(INGRESS_CLASS_ANNOTATION)
                .filter(|c| !c.is_empty())
                .cloned()
        })
}

/// Every finding for one ingress, in check order
pub async fn ingress_failures<C: ClusterClient>(client: &C, ingress: &Ingress) -> K8sResult<Vec<Failure>> {
    let namespace = ingress.namespace().unwrap_or_default();
    let spec = ingress.spec.clone().unwrap_or_default();
    let mut failures = Vec::new();

    match ingress_class(ingress) {
        None => failures.push(Failure::with_doc(
            "Ingress does not specify an ingress class",
            doc_ref(API_VERSION, "Ingress", "spec.ingressClassName"),
        )),
        Some(class) => {
            if client.get::<IngressClass>(None, &class).await?.is_none() {
                failures.push(Failure::with_doc(
                    format!("Ingress uses the ingress class {} which does not exist", class),
                    doc_ref(API_VERSION, "Ingress", "spec.ingressClassName"),
                ));
            }
        }
    }

    let backends = spec
        .rules
        .iter()
        .flatten()
        .filter_map(|rule| rule.http.as_ref())
        .flat_map(|http| http.paths.iter())
        .filter_map(|path| path.backend.service.as_ref());

    for backend in backends {
        if client.get::<Service>(Some(&namespace), &backend.name).await?.is_none() {
            failures.push(Failure::with_doc(
                format!("Ingress uses the service {}/{} which does not exist", namespace, backend.name),
                doc_ref(API_VERSION, "Ingress", "spec.rules.http.paths.backend.service"),
            ));
        }
    }

    let secrets = spec
        .tls
        .iter()
        .flatten()
        .filter_map(|tls| tls.secret_name.as_deref());

    for secret in secrets {
        if client.get::<Secret>(Some(&namespace), secret).await?.is_none() {
            failures.push(Failure::with_doc(
                format!("Ingress uses the secret {}/{} which does not exist", namespace, secret),
                doc_ref(API_VERSION, "Ingress", "spec.tls.secretName"),
            ));
        }
    }

    Ok(failures)
}
