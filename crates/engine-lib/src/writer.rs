//! Persistence of accepted descriptors as docker-compose files
//!
//! The writer serializes a descriptor to canonical YAML and performs
//! an atomic, confined write: content is fully staged in a temp file
//! and renamed into place, so a reader never observes a truncated
//! artifact. Confinement is re-checked on the final resolved path at
//! this boundary; upstream validation is never trusted alone.

use crate::models::{
    DeploymentDescriptor, NamedVolume, PersistedArtifact, PortMapping, VolumeMount,
};
use crate::validator::paths;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Compose schema version emitted in every artifact
const COMPOSE_VERSION: &str = "3.8";

/// File mode for written artifacts
const ARTIFACT_MODE: u32 = 0o644;

/// Errors at the persistence boundary
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("invalid service id '{0}': must be alphanumeric with dashes/underscores")]
    InvalidServiceId(String),

    #[error("target path '{0}' resolves outside the confinement root")]
    ConfinementBreach(PathBuf),

    #[error("failed to serialize descriptor: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("malformed compose artifact: {0}")]
    Malformed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// On-disk compose file shape
///
/// Field order is fixed by struct declaration and all maps are
/// BTreeMaps, so serialization is byte-deterministic.
#[derive(Debug, Serialize, Deserialize)]
struct ComposeFile {
    version: String,
    services: BTreeMap<String, ComposeService>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    volumes: BTreeMap<String, Option<()>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ComposeService {
    image: String,
    container_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    network_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    runtime: Option<String>,
    restart: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    ports: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    environment: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    devices: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    volumes: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    privileged: bool,
}

/// Serialize a descriptor to canonical compose YAML
///
/// Same descriptor always yields byte-identical output; required for
/// idempotent redeploys and meaningful diffs.
pub fn serialize_descriptor(descriptor: &DeploymentDescriptor) -> Result<String, WriteError> {
    let volume_lines = descriptor
        .volumes
        .iter()
        .map(|v| {
            if v.mode == "rw" {
                format!("{}:{}", v.host_path, v.container_path)
            } else {
                format!("{}:{}:{}", v.host_path, v.container_path, v.mode)
            }
        })
        .collect::<Vec<_>>();

    let named_volume_lines = descriptor
        .named_volumes
        .iter()
        .map(|v| format!("{}:{}", v.name, v.container_path))
        .collect::<Vec<_>>();

    let service = ComposeService {
        image: descriptor.image.clone(),
        container_name: descriptor.container_name.clone(),
        network_mode: descriptor.network_mode.clone(),
        runtime: descriptor.runtime.clone(),
        restart: descriptor.restart.clone(),
        ports: descriptor
            .ports
            .iter()
            .map(|p| format!("{}:{}", p.host, p.container))
            .collect(),
        // BTreeMap iteration keeps this sorted and stable
        environment: descriptor
            .environment
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect(),
        devices: descriptor
            .devices
            .iter()
            .map(|d| format!("{}:{}", d, d))
            .collect(),
        volumes: volume_lines.into_iter().chain(named_volume_lines).collect(),
        privileged: descriptor.privileged,
    };

    let mut services = BTreeMap::new();
    services.insert(descriptor.service_id.clone(), service);

    let compose = ComposeFile {
        version: COMPOSE_VERSION.to_string(),
        services,
        volumes: descriptor
            .named_volumes
            .iter()
            .map(|v| (v.name.clone(), None))
            .collect(),
    };

    Ok(serde_yaml::to_string(&compose)?)
}

/// Parse a written artifact back into an equivalent descriptor
///
/// Round-trips everything the compose format carries; mount-source
/// provenance is not persisted and comes back as template-owned.
pub fn parse_artifact(content: &str) -> Result<DeploymentDescriptor, WriteError> {
    let compose: ComposeFile = serde_yaml::from_str(content)?;

    let (service_id, service) = compose
        .services
        .into_iter()
        .next()
        .ok_or_else(|| WriteError::Malformed("no services section".to_string()))?;

    let mut volumes = Vec::new();
    let mut named_volumes = Vec::new();
    for line in &service.volumes {
        if line.starts_with('/') {
            volumes.push(parse_volume_line(line)?);
        } else {
            let (name, container_path) = line
                .split_once(':')
                .ok_or_else(|| WriteError::Malformed(format!("bad volume line '{}'", line)))?;
            named_volumes.push(NamedVolume {
                name: name.to_string(),
                container_path: container_path.to_string(),
            });
        }
    }

    let mut environment = BTreeMap::new();
    for line in &service.environment {
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| WriteError::Malformed(format!("bad environment line '{}'", line)))?;
        environment.insert(key.to_string(), value.to_string());
    }

    let mut ports = Vec::new();
    for line in &service.ports {
        ports.push(parse_port_line(line)?);
    }

    let devices = service
        .devices
        .iter()
        .map(|line| line.split(':').next().unwrap_or(line).to_string())
        .collect();

    Ok(DeploymentDescriptor {
        service_id,
        image: service.image,
        container_name: service.container_name,
        volumes,
        named_volumes,
        devices,
        environment,
        ports,
        runtime: service.runtime,
        network_mode: service.network_mode,
        restart: service.restart,
        privileged: service.privileged,
    })
}

fn parse_volume_line(line: &str) -> Result<VolumeMount, WriteError> {
    let parts: Vec<&str> = line.split(':').collect();
    match parts.as_slice() {
        [host, container] => Ok(VolumeMount::template(*host, *container)),
        [host, container, mode] => {
            let mut mount = VolumeMount::template(*host, *container);
            mount.mode = mode.to_string();
            Ok(mount)
        }
        _ => Err(WriteError::Malformed(format!("bad volume line '{}'", line))),
    }
}

fn parse_port_line(line: &str) -> Result<PortMapping, WriteError> {
    let (host, container) = line
        .split_once(':')
        .ok_or_else(|| WriteError::Malformed(format!("bad port line '{}'", line)))?;
    let host = host
        .parse()
        .map_err(|_| WriteError::Malformed(format!("bad host port '{}'", line)))?;
    let container = container
        .parse()
        .map_err(|_| WriteError::Malformed(format!("bad container port '{}'", line)))?;
    Ok(PortMapping { host, container })
}

fn stage_and_rename(temp_path: &Path, target: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(temp_path)?;
    file.write_all(content)?;
    file.sync_all()?;
    fs::set_permissions(temp_path, fs::Permissions::from_mode(ARTIFACT_MODE))?;
    fs::rename(temp_path, target)
}

/// Strip anything that is not a safe service-id character
///
/// Redundant with earlier validation by design; mandatory at the
/// write boundary.
pub fn sanitize_service_id(service_id: &str) -> Result<String, WriteError> {
    let valid = !service_id.is_empty()
        && service_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(service_id.to_string())
    } else {
        Err(WriteError::InvalidServiceId(service_id.to_string()))
    }
}

/// Writes accepted descriptors under the confinement root
pub struct ComposeWriter {
    confinement_root: PathBuf,
    /// Per-service write locks; concurrent writes to the same service
    /// serialize, different services proceed independently
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ComposeWriter {
    pub fn new(confinement_root: impl Into<PathBuf>) -> Self {
        Self {
            confinement_root: confinement_root.into(),
            locks: DashMap::new(),
        }
    }

    pub fn confinement_root(&self) -> &Path {
        &self.confinement_root
    }

    /// Deterministic artifact path for a service id
    pub fn artifact_path(&self, service_id: &str) -> Result<PathBuf, WriteError> {
        let sanitized = sanitize_service_id(service_id)?;
        let target = self.confinement_root.join(format!("{}.yml", sanitized));

        // Last-line confinement recheck on the resolved path
        let normalized = paths::normalize(&target.to_string_lossy())
            .ok_or_else(|| WriteError::ConfinementBreach(target.clone()))?;
        if !paths::is_strictly_within(&normalized, &self.confinement_root) {
            return Err(WriteError::ConfinementBreach(target));
        }

        Ok(normalized)
    }

    /// Atomically persist an accepted descriptor
    ///
    /// Overwriting an existing artifact for the same service is the
    /// normal redeploy path; no backup is taken.
    pub async fn write(
        &self,
        descriptor: &DeploymentDescriptor,
    ) -> Result<PersistedArtifact, WriteError> {
        let sanitized = sanitize_service_id(&descriptor.service_id)?;
        let target = self.artifact_path(&descriptor.service_id)?;

        let lock = self
            .locks
            .entry(sanitized.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let content = serialize_descriptor(descriptor)?;

        fs::create_dir_all(&self.confinement_root)?;

        // Stage fully, then rename into place
        let temp_path = self
            .confinement_root
            .join(format!(".{}.yml.tmp", sanitized));
        if let Err(e) = stage_and_rename(&temp_path, &target, content.as_bytes()) {
            // The final path is untouched; only the staging file needs
            // removing
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        let checksum = hex::encode(Sha256::digest(content.as_bytes()));
        debug!(service = %sanitized, path = %target.display(), checksum = %checksum, "Artifact staged and renamed");
        info!(service = %sanitized, path = %target.display(), "Compose artifact written");

        Ok(PersistedArtifact {
            service_id: sanitized,
            path: target,
            checksum,
            size_bytes: content.len() as u64,
            written_at: chrono::Utc::now().timestamp(),
        })
    }
}
