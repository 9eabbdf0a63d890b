///! Generic resource commands

use crate::output::{self, OutputFormat};
use crate::ResourceCommands;
use anyhow::{Context, Result};
use kubeeye_engine::api::ClusterApi;
use kubeeye_engine::resources::ClusterResource;
use kubeeye_engine::types::ListQuery;
use kubeeye_engine::HealthEngine;
use std::io::Read;
use std::path::Path;
use tabled::Tabled;

#[derive(Tabled)]
struct ResourceRow {
    kind: String,
    namespace: String,
    name: String,
    created: String,
}

impl From<&ClusterResource> for ResourceRow {
    fn from(r: &ClusterResource) -> Self {
        Self {
            kind: r.kind().to_string(),
            namespace: r.namespace().unwrap_or_else(|| "-".to_string()),
            name: r.name(),
            created: r
                .metadata()
                .creation_timestamp
                .as_ref()
                .map(|t| t.0.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

fn read_manifest(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read manifest from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

pub async fn handle_resource_command<C: ClusterApi + 'static>(
    command: ResourceCommands,
    engine: &HealthEngine<C>,
    output_format: OutputFormat,
) -> Result<()> {
    match command {
        ResourceCommands::List {
            kind,
            namespace,
            selector,
            field_selector,
        } => {
            let query = ListQuery::new()
                .labels(selector.as_deref().unwrap_or_default())
                .fields(field_selector.as_deref().unwrap_or_default());
            let objects = engine
                .list_resources(&kind, namespace.as_deref(), &query)
                .await?;
            output::print_output(&objects, output_format, |r| ResourceRow::from(r))?;
        }

        ResourceCommands::Get {
            kind,
            name,
            namespace,
        } => {
            let object = engine.get_resource(&kind, namespace.as_deref(), &name).await?;
            output::print_single(&object, output_format)?;
        }

        ResourceCommands::Delete {
            kind,
            name,
            namespace,
        } => {
            let message = engine
                .delete_resource(&kind, namespace.as_deref(), &name)
                .await?;
            output::print_success(&message);
        }

        ResourceCommands::Apply { file } => {
            let manifest = read_manifest(&file)?;
            let applied = engine.apply_manifests(&manifest).await?;

            match output_format {
                OutputFormat::Table => {
                    for object in &applied {
                        let target = match object.namespace() {
                            Some(ns) => format!("{}/{}", ns, object.name()),
                            None => object.name(),
                        };
                        output::print_success(&format!("{} {} applied", object.kind(), target));
                    }
                }
                _ => output::print_single(&applied, output_format)?,
            }
        }
    }

    Ok(())
}
