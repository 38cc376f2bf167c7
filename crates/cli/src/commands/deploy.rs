//! Deploy command

use anyhow::Result;
use std::collections::HashMap;
use tabled::Tabled;

use crate::client::{ApiClient, DeployApiRequest, DeployResponse};
use crate::output::{format_bytes, print_error, print_success, OutputFormat};

/// Row for the violations table
#[derive(Tabled)]
struct ViolationRow {
    #[tabled(rename = "Rule")]
    rule: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

/// Deploy a service, optionally binding media directories and a port
pub async fn deploy_service(
    client: &ApiClient,
    service: &str,
    media_path: Option<String>,
    port: Option<u16>,
    format: OutputFormat,
) -> Result<()> {
    let mut parameters = HashMap::new();
    if let Some(path) = media_path {
        parameters.insert("media_path".to_string(), path);
    }
    if let Some(port) = port {
        parameters.insert("port".to_string(), port.to_string());
    }

    let request = DeployApiRequest {
        service_id: service.to_string(),
        parameters,
    };

    let response = client.deploy(&request).await?;

    if let OutputFormat::Json = format {
        let json = serde_json::to_string_pretty(&response)?;
        println!("{}", json);
        return finish(&response);
    }

    match &response {
        DeployResponse::Written {
            path,
            checksum,
            size_bytes,
            ..
        } => {
            print_success(&format!("Service '{}' deployed", service));
            println!("Artifact: {}", path);
            println!("Checksum: {}", checksum);
            println!("Size: {}", format_bytes(*size_bytes));
        }
        DeployResponse::Rejected { violations, .. } => {
            print_error(&format!(
                "Deployment of '{}' rejected ({} violations)",
                service,
                violations.len()
            ));

            let rows: Vec<ViolationRow> = violations
                .iter()
                .map(|v| ViolationRow {
                    rule: v.rule.clone(),
                    detail: v.detail.clone(),
                })
                .collect();
            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
        }
        DeployResponse::NotFound { service_id } => {
            print_error(&format!("Unknown service '{}'", service_id));
        }
    }

    finish(&response)
}

fn finish(response: &DeployResponse) -> Result<()> {
    match response {
        DeployResponse::Written { .. } => Ok(()),
        DeployResponse::Rejected { .. } => anyhow::bail!("deployment rejected"),
        DeployResponse::NotFound { .. } => anyhow::bail!("service not found"),
    }
}
