//! Hardware command

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, HardwareReport};
use crate::output::{color_vendor, print_info, print_warning, OutputFormat};

/// Row for the GPU table
#[derive(Tabled)]
struct GpuRow {
    #[tabled(rename = "Vendor")]
    vendor: String,
    #[tabled(rename = "Device Class")]
    device_class: String,
    #[tabled(rename = "Bus Address")]
    bus_address: String,
    #[tabled(rename = "Primary")]
    primary: String,
}

/// Show detected GPUs on the engine host
pub async fn show_hardware(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let report: HardwareReport = client.get("v1/hardware").await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            if report.gpus.is_empty() {
                print_warning("No GPUs detected; deployments fall back to software rendering");
                return Ok(());
            }

            let primary_bus = report.primary.as_ref().map(|gpu| gpu.bus_address.clone());
            let rows: Vec<GpuRow> = report
                .gpus
                .iter()
                .map(|gpu| GpuRow {
                    vendor: color_vendor(&gpu.vendor),
                    device_class: gpu.device_class.clone(),
                    bus_address: gpu.bus_address.clone(),
                    primary: if primary_bus.as_deref() == Some(gpu.bus_address.as_str()) {
                        "✓".to_string()
                    } else {
                        "".to_string()
                    },
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);

            if let Some(primary) = &report.primary {
                print_info(&format!(
                    "Primary GPU: {} ({})",
                    primary.device_class, primary.vendor
                ));
            }
        }
    }

    Ok(())
}
