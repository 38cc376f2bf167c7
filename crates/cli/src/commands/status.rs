//! Status command

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, HealthReport};
use crate::output::{color_status, format_timestamp, OutputFormat};

/// Row for the component health table
#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    component: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Last Check")]
    last_check: String,
}

/// Show engine health
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health: HealthReport = client.get("healthz").await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&health)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            println!("Engine status: {}", color_status(&health.status));

            let mut components: Vec<_> = health.components.iter().collect();
            components.sort_by_key(|(name, _)| name.to_string());

            let rows: Vec<ComponentRow> = components
                .iter()
                .map(|(name, component)| ComponentRow {
                    component: name.to_string(),
                    status: color_status(&component.status),
                    message: component.message.clone().unwrap_or_default(),
                    last_check: format_timestamp(
                        &chrono::DateTime::from_timestamp(component.last_check_timestamp, 0)
                            .map(|dt| dt.to_rfc3339())
                            .unwrap_or_default(),
                    ),
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
        }
    }

    Ok(())
}
