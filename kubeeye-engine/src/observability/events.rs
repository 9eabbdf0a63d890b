//! Kubernetes events
//!
//! Event lookups keyed by the involved object's name.

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Event;

use crate::api::ClusterClient;
use crate::error::K8sResult;
use crate::types::ListQuery;

fn last_seen(event: &Event) -> Option<DateTime<Utc>> {
    event.last_timestamp.as_ref().map(|t| t.0)
}

/// List events for an object, most recent first
pub async fn events_for_object<C: ClusterClient>(
    client: &C,
    namespace: &str,
    name: &str,
) -> K8sResult<Vec<Event>> {
    let query = ListQuery::new().fields(&format!("involvedObject.name={}", name));
    let mut events: Vec<Event> = client.list(Some(namespace), &query).await?;

    events.sort_by(|a, b| last_seen(b).cmp(&last_seen(a)));

    Ok(events)
}

/// Most recent event for an object.
///
/// Ties keep the event listed first.
pub async fn latest_event<C: ClusterClient>(
    client: &C,
    namespace: &str,
    name: &str,
) -> K8sResult<Option<Event>> {
    let query = ListQuery::new().fields(&format!("involvedObject.name={}", name));
    let events: Vec<Event> = client.list(Some(namespace), &query).await?;

    Ok(pick_latest(events))
}

fn pick_latest(events: Vec<Event>) -> Option<Event> {
    events.into_iter().fold(None, |latest, event| match latest {
        Some(current) if last_seen(&event) <= last_seen(&current) => Some(current),
        _ => Some(event),
    })
}
