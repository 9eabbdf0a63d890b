///! Workload resource usage commands

use crate::output::{self, OutputFormat};
use crate::ScopeArgs;
use anyhow::Result;
use kubeeye_common::{WorkloadKind, WorkloadMetrics};
use kubeeye_engine::api::ClusterApi;
use kubeeye_engine::HealthEngine;
use tabled::Tabled;

#[derive(Tabled)]
struct UsageRow {
    namespace: String,
    name: String,
    #[tabled(rename = "cpu (m)")]
    cpu_millicores: i64,
    #[tabled(rename = "memory (Mi)")]
    memory_mebibytes: i64,
}

impl From<&WorkloadMetrics> for UsageRow {
    fn from(m: &WorkloadMetrics) -> Self {
        Self {
            namespace: m.namespace.clone(),
            name: m.name.clone(),
            cpu_millicores: m.cpu_millicores,
            memory_mebibytes: m.memory_mebibytes,
        }
    }
}

pub async fn handle_usage_command<C: ClusterApi + 'static>(
    engine: &HealthEngine<C>,
    kind: &str,
    scope: &ScopeArgs,
    output_format: OutputFormat,
) -> Result<()> {
    let kind: WorkloadKind = kind.parse()?;

    let usage = engine
        .workload_usage(
            kind,
            scope.namespace.as_deref(),
            scope.name.as_deref(),
            scope.selector.as_deref(),
        )
        .await?;

    output::print_output(&usage, output_format, |m| UsageRow::from(m))
}
