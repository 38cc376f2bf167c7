//! Templates command

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, TemplateList};
use crate::output::{print_warning, OutputFormat};

/// Row for the templates table
#[derive(Tabled)]
struct TemplateRow {
    #[tabled(rename = "Service")]
    id: String,
    #[tabled(rename = "Image")]
    image: String,
    #[tabled(rename = "GPU")]
    gpu: String,
    #[tabled(rename = "Parameters")]
    parameters: String,
}

/// List the services the engine can deploy
pub async fn list_templates(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let list: TemplateList = client.get("v1/templates").await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&list)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            if list.templates.is_empty() {
                print_warning("Catalog is empty");
                return Ok(());
            }

            let rows: Vec<TemplateRow> = list
                .templates
                .iter()
                .map(|t| TemplateRow {
                    id: t.id.clone(),
                    image: t.image.clone(),
                    gpu: if t.gpu_aware {
                        "✓".to_string()
                    } else {
                        "".to_string()
                    },
                    parameters: t.parameters.join(", "),
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
            println!("\nCatalog version: {}", list.catalog_version);
        }
    }

    Ok(())
}
