///! Pod log commands

use crate::output::{self, OutputFormat};
use anyhow::Result;
use kubeeye_engine::api::ClusterApi;
use kubeeye_engine::types::PodLogQuery;
use kubeeye_engine::HealthEngine;
use serde::Serialize;

#[derive(Serialize)]
struct PodLogs<'a> {
    namespace: &'a str,
    pod: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    container: Option<&'a str>,
    logs: String,
}

pub async fn handle_logs_command<C: ClusterApi + 'static>(
    engine: &HealthEngine<C>,
    namespace: Option<&str>,
    pod: &str,
    query: &PodLogQuery,
    output_format: OutputFormat,
) -> Result<()> {
    let logs = engine.pod_logs(namespace, pod, query).await?;

    match output_format {
        OutputFormat::Table => print!("{}", logs),
        _ => output::print_single(
            &PodLogs {
                namespace: namespace.unwrap_or("default"),
                pod,
                container: query.container.as_deref(),
                logs,
            },
            output_format,
        )?,
    }

    Ok(())
}
