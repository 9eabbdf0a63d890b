///! Health analysis commands

use crate::output::{self, OutputFormat};
use anyhow::Result;
use kubeeye_common::{AnalysisResult, AnalyzerKind};
use kubeeye_engine::api::ClusterApi;
use kubeeye_engine::{AnalysisScope, HealthEngine};
use tabled::Tabled;

#[derive(Tabled)]
struct FailureRow {
    kind: String,
    name: String,
    parent: String,
    failure: String,
}

/// One row per failure, so multi-failure objects stay readable
fn rows(result: &AnalysisResult) -> Vec<FailureRow> {
    result
        .failures
        .iter()
        .map(|failure| FailureRow {
            kind: result.kind.clone(),
            name: result.name.clone(),
            parent: result.parent_object.clone().unwrap_or_else(|| "-".to_string()),
            failure: output::truncate(&failure.text, 120),
        })
        .collect()
}

fn selected_kinds(kind: Option<&str>) -> Result<Vec<AnalyzerKind>> {
    match kind {
        Some(kind) => Ok(vec![kind.parse()?]),
        None => Ok(AnalyzerKind::ALL.to_vec()),
    }
}

pub async fn handle_analyze_command<C: ClusterApi + 'static>(
    engine: &HealthEngine<C>,
    kind: Option<&str>,
    scope: &AnalysisScope,
    output_format: OutputFormat,
) -> Result<()> {
    let kinds = selected_kinds(kind)?;

    let mut results = Vec::new();
    for kind in &kinds {
        results.extend(engine.analyze(*kind, scope).await?);
    }

    match output_format {
        OutputFormat::Json => println!("{}", kubeeye_engine::report::to_json(&results)?),
        OutputFormat::Yaml => output::print_yaml(&results)?,
        OutputFormat::Table if results.is_empty() => {
            let label = match kinds.as_slice() {
                [single] => single.as_str(),
                _ => "objects",
            };
            output::print_healthy(label);
        }
        OutputFormat::Table => output::print_table(results.iter().flat_map(rows).collect()),
    }

    Ok(())
}
