//! Label selector helpers

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use std::collections::BTreeMap;

/// Render `matchLabels` as `k1=v1,k2=v2`
pub fn match_labels_to_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Render a full selector, including `matchExpressions`, in list-query syntax
pub fn label_selector_to_string(selector: &LabelSelector) -> String {
    let mut terms = Vec::new();

    if let Some(labels) = &selector.match_labels {
        if !labels.is_empty() {
            terms.push(match_labels_to_selector(labels));
        }
    }

    for expr in selector.match_expressions.iter().flatten() {
        let values = expr.values.clone().unwrap_or_default().join(",");
        let term = match expr.operator.as_str() {
            "In" => format!("{} in ({})", expr.key, values),
            "NotIn" => format!("{} notin ({})", expr.key, values),
            "Exists" => expr.key.clone(),
            "DoesNotExist" => format!("!{}", expr.key),
            other => {
                tracing::debug!(operator = other, key = %expr.key, "ignoring unknown selector operator");
                continue;
            }
        };
        terms.push(term);
    }

    terms.join(",")
}

/// True when the selector has neither labels nor expressions
pub fn is_empty_selector(selector: &LabelSelector) -> bool {
    selector
        .match_labels
        .as_ref()
        .map_or(true, |labels| labels.is_empty())
        && selector
            .match_expressions
            .as_ref()
            .map_or(true, |exprs| exprs.is_empty())
}
