//! Log Tests
//! Pod log tails through the engine

mod common;

use common::*;
use kubeeye_engine::types::PodLogQuery;
use kubeeye_engine::K8sError;

fn numbered(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("line {}", i)).collect()
}

#[tokio::test]
async fn test_logs_default_to_last_200_lines() {
    let cluster = FakeCluster::new();
    cluster.add(pod("shop", "web-1", "Running", &[("app", "web")]));
    let lines = numbered(250);
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    cluster.add_logs("shop", "web-1", "app", &refs);
    let engine = engine(cluster);

    let logs = engine
        .pod_logs(Some("shop"), "web-1", &PodLogQuery::default())
        .await
        .unwrap();

    let returned: Vec<&str> = logs.lines().collect();
    assert_eq!(returned.len(), 200);
    assert_eq!(returned[0], "line 51");
    assert_eq!(returned[199], "line 250");
}

#[tokio::test]
async fn test_logs_for_named_container() {
    let cluster = FakeCluster::new();
    cluster.add(pod("default", "web-1", "Running", &[]));
    cluster.add_logs("default", "web-1", "app", &["serving"]);
    cluster.add_logs("default", "web-1", "proxy", &["upstream reset", "retrying"]);
    let engine = engine(cluster);

    let query = PodLogQuery {
        container: Some("proxy".to_string()),
        tail_lines: Some(1),
        ..Default::default()
    };
    let logs = engine.pod_logs(None, "web-1", &query).await.unwrap();
    assert_eq!(logs, "retrying\n");

    let err = engine
        .pod_logs(None, "web-1", &PodLogQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(err, K8sError::KubeError(_)));
}

#[tokio::test]
async fn test_logs_for_missing_pod() {
    let engine = engine(FakeCluster::new());

    let err = engine
        .pod_logs(Some("shop"), "ghost", &PodLogQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        K8sError::ResourceNotFound { ref kind, ref name, ref namespace }
            if kind == "Pod" && name == "ghost" && namespace == "shop"
    ));
}
