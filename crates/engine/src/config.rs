//! Engine configuration

use anyhow::Result;
use engine_lib::SecurityPolicy;
use serde::Deserialize;
use std::path::PathBuf;

/// Engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Host name reported in structured log events
    #[serde(default = "default_host_name")]
    pub host_name: String,

    /// API server port for deploys, health and metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Base directory; services/ and config/ live under it
    #[serde(default = "default_base_root")]
    pub base_root: PathBuf,

    /// Comma-separated host roots user media mounts may come from
    #[serde(default = "default_media_roots")]
    pub media_roots: String,
}

fn default_host_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_base_root() -> PathBuf {
    PathBuf::from(engine_lib::policy::DEFAULT_BASE_ROOT)
}

fn default_media_roots() -> String {
    "/mnt".to_string()
}

impl EngineConfig {
    /// Load configuration from environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("HOMESTACK"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|_| EngineConfig {
            host_name: default_host_name(),
            api_port: default_api_port(),
            base_root: default_base_root(),
            media_roots: default_media_roots(),
        }))
    }

    /// Build the security policy this configuration describes
    pub fn policy(&self) -> SecurityPolicy {
        let mut policy = SecurityPolicy::with_base_root(&self.base_root);
        policy.allowed_mount_roots = self
            .media_roots
            .split(',')
            .map(str::trim)
            .filter(|root| !root.is_empty())
            .map(PathBuf::from)
            .collect();
        policy
    }
}
