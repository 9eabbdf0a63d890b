///! Served kind listing

use crate::output::{self, OutputFormat};
use anyhow::Result;
use kubeeye_engine::api::ClusterApi;
use kubeeye_engine::discovery::GvrMapping;
use kubeeye_engine::HealthEngine;
use tabled::Tabled;

#[derive(Tabled)]
struct KindRow {
    kind: String,
    #[tabled(rename = "api version")]
    api_version: String,
    resource: String,
    namespaced: bool,
}

impl From<&GvrMapping> for KindRow {
    fn from(m: &GvrMapping) -> Self {
        Self {
            kind: m.kind.clone(),
            api_version: m.api_version(),
            resource: m.resource.clone(),
            namespaced: m.namespaced,
        }
    }
}

pub async fn handle_kinds_command<C: ClusterApi + 'static>(
    engine: &HealthEngine<C>,
    output_format: OutputFormat,
) -> Result<()> {
    let kinds = engine.served_kinds().await?;
    output::print_output(&kinds, output_format, |m| KindRow::from(m))
}
