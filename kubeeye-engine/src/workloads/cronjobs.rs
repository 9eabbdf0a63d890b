//! CronJob analysis

use k8s_openapi::api::batch::v1::CronJob;
use kube::ResourceExt;
use kubeeye_common::{AnalysisResult, Failure};

use crate::api::ClusterClient;
use crate::config::AnalysisSettings;
use crate::error::K8sResult;
use crate::report::{aggregate, check_all, doc_ref};
use crate::schedule::validate_standard;
use crate::types::AnalysisScope;

/// Analyze cronjobs in scope
pub async fn analyze_cronjobs<C: ClusterClient>(
    client: &C,
    scope: &AnalysisScope,
    settings: &AnalysisSettings,
) -> K8sResult<Vec<AnalysisResult>> {
    let cronjobs: Vec<CronJob> = client
        .list(scope.namespace_ref(), &scope.list_query())
        .await?;

    let analysis = check_all(cronjobs, settings.concurrency, |cronjob| async move {
        let failures = cronjob_failures(&cronjob);
        Ok((cronjob, failures))
    })
    .await?;

    aggregate(client, "CronJob", analysis, settings.max_owner_depth).await
}

/// A suspended cronjob reports only the suspension
pub fn cronjob_failures(cronjob: &CronJob) -> Vec<Failure> {
    let spec = cronjob.spec.clone().unwrap_or_default();

    if spec.suspend == Some(true) {
        return vec![Failure::with_doc(
            format!(
                "CronJob {}/{} is suspended",
                cronjob.namespace().unwrap_or_default(),
                cronjob.name_any()
            ),
            doc_ref("batch/v1", "CronJob", "spec.suspend"),
        )];
    }

    let mut failures = Vec::new();

    if let Err(e) = validate_standard(&spec.schedule) {
        failures.push(Failure::with_doc(
            format!("CronJob has an invalid schedule: {}", e),
            doc_ref("batch/v1", "CronJob", "spec.schedule"),
        ));
    }

    let last_scheduled = cronjob
        .status
        .as_ref()
        .and_then(|s| s.last_schedule_time.as_ref());
    if last_scheduled.is_none() {
        failures.push(Failure::new("CronJob has never been scheduled"));
    }

    if spec.starting_deadline_seconds.is_some_and(|d| d < 0) {
        failures.push(Failure::with_doc(
            "CronJob has a negative starting deadline",
            doc_ref("batch/v1", "CronJob", "spec.startingDeadlineSeconds"),
        ));
    }

    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use k8s_openapi::api::batch::v1::{CronJobSpec, CronJobStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use kube::api::ObjectMeta;

    fn cronjob(schedule: &str, suspend: Option<bool>, scheduled: bool) -> CronJob {
        CronJob {
            metadata: ObjectMeta {
                name: Some("nightly".into()),
                namespace: Some("batch".into()),
                ..Default::default()
            },
            spec: Some(CronJobSpec {
                schedule: schedule.into(),
                suspend,
                ..Default::default()
            }),
            status: Some(CronJobStatus {
                last_schedule_time: scheduled.then(|| Time(Utc::now())),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_suspended_short_circuits() {
        let failures = cronjob_failures(&cronjob("not a schedule", Some(true), false));
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].text, "CronJob batch/nightly is suspended");
        assert_eq!(
            failures[0].documentation_ref.as_deref(),
            Some("batch/v1/CronJob.spec.suspend")
        );
    }

    #[test]
    fn test_healthy() {
        assert!(cronjob_failures(&cronjob("0 3 * * *", Some(false), true)).is_empty());
    }

    #[test]
    fn test_invalid_and_never_scheduled() {
        let failures = cronjob_failures(&cronjob("61 * * * *", None, false));
        let texts: Vec<&str> = failures.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "CronJob has an invalid schedule: end of range (61) above maximum (59): 61",
                "CronJob has never been scheduled",
            ]
        );
        assert!(failures[1].documentation_ref.is_none());
    }

    #[test]
    fn test_negative_deadline() {
        let mut job = cronjob("*/5 * * * *", None, true);
        if let Some(spec) = job.spec.as_mut() {
            spec.starting_deadline_seconds = Some(-10);
        }
        let failures = cronjob_failures(&job);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].text, "CronJob has a negative starting deadline");
    }
}
