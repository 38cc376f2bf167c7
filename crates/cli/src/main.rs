//! Homestack CLI
//!
//! A command-line tool for deploying services through the homestack
//! engine, inspecting the template catalog and detected hardware.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{deploy, hardware, status, templates};

/// Homestack CLI
#[derive(Parser)]
#[command(name = "homestack")]
#[command(author, version, about = "CLI for the Homestack deployment engine", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via HOMESTACK_API_URL env var)
    #[arg(long, env = "HOMESTACK_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Deploy a service from the catalog
    Deploy {
        /// Service to deploy (e.g. plex, jellyfin, ollama)
        service: String,

        /// Host media directories to mount, comma-separated
        #[arg(long, short)]
        media_path: Option<String>,

        /// Host port override for the service's published port
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Show detected GPU hardware on the engine host
    Hardware,

    /// List deployable service templates
    Templates,

    /// Show engine health
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize client
    let client = client::ApiClient::new(&cli.api_url)?;

    // Execute command
    match cli.command {
        Commands::Deploy {
            service,
            media_path,
            port,
        } => {
            deploy::deploy_service(&client, &service, media_path, port, cli.format).await?;
        }
        Commands::Hardware => {
            hardware::show_hardware(&client, cli.format).await?;
        }
        Commands::Templates => {
            templates::list_templates(&client, cli.format).await?;
        }
        Commands::Status => {
            status::show_status(&client, cli.format).await?;
        }
    }

    Ok(())
}
