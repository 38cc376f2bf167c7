//! Core data models for the deployment engine

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// GPU vendor family detected on the PCI bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    /// No recognized GPU; services run software-only
    None,
}

impl GpuVendor {
    pub fn as_str(&self) -> &'static str {
        match self {
            GpuVendor::Nvidia => "nvidia",
            GpuVendor::Amd => "amd",
            GpuVendor::Intel => "intel",
            GpuVendor::None => "none",
        }
    }
}

/// A raw PCI bus enumeration record, as handed over by the host scanner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBusRecord {
    /// 4-hex-digit PCI vendor ID (e.g. "10de")
    pub vendor_id: String,
    /// 4-hex-digit PCI device ID
    pub device_id: String,
    /// Bus address (e.g. "0000:01:00.0")
    pub bus_address: String,
}

/// Normalized hardware profile produced by classification
///
/// Immutable once created; one profile per detected device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareProfile {
    pub vendor: GpuVendor,
    /// Capability tier, e.g. "RDNA3", "Arc", "CUDA-capable"
    pub device_class: String,
    pub bus_address: String,
}

/// Where a volume mount originated
///
/// User-supplied host paths are held to a stricter allow-list than
/// paths the catalog itself declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountSource {
    Template,
    UserParameter,
}

/// A single host-to-container bind mount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    pub host_path: String,
    pub container_path: String,
    /// "rw" or "ro"
    pub mode: String,
    #[serde(default = "MountSource::template", skip_serializing)]
    pub source: MountSource,
}

impl MountSource {
    fn template() -> Self {
        MountSource::Template
    }
}

impl VolumeMount {
    pub fn template(host_path: impl Into<String>, container_path: impl Into<String>) -> Self {
        Self {
            host_path: host_path.into(),
            container_path: container_path.into(),
            mode: "rw".to_string(),
            source: MountSource::Template,
        }
    }

    pub fn user(host_path: impl Into<String>, container_path: impl Into<String>) -> Self {
        Self {
            host_path: host_path.into(),
            container_path: container_path.into(),
            mode: "rw".to_string(),
            source: MountSource::UserParameter,
        }
    }
}

/// A docker named volume and where it mounts in the container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedVolume {
    pub name: String,
    pub container_path: String,
}

/// A published port mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub host: u16,
    pub container: u16,
}

/// The in-memory deployment descriptor built by the compositor
///
/// Mutable only during composition; the validator and writer treat it
/// as read-only. A descriptor that has not passed validation must
/// never reach the writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentDescriptor {
    pub service_id: String,
    pub image: String,
    pub container_name: String,
    pub volumes: Vec<VolumeMount>,
    /// Docker named volumes (declared in the top-level volumes section)
    pub named_volumes: Vec<NamedVolume>,
    pub devices: Vec<String>,
    pub environment: BTreeMap<String, String>,
    pub ports: Vec<PortMapping>,
    pub runtime: Option<String>,
    pub network_mode: Option<String>,
    pub restart: String,
    /// Always false out of composition; the validator rejects true
    pub privileged: bool,
}

/// A security rule checked by the validator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityRule {
    ForbiddenMountTarget,
    UnconfinedHostPath,
    PathTraversal,
    PrivilegedMode,
    RuntimeNotAllowed,
    DeviceNotAllowed,
    IdentityOverride,
}

impl SecurityRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityRule::ForbiddenMountTarget => "forbidden_mount_target",
            SecurityRule::UnconfinedHostPath => "unconfined_host_path",
            SecurityRule::PathTraversal => "path_traversal",
            SecurityRule::PrivilegedMode => "privileged_mode",
            SecurityRule::RuntimeNotAllowed => "runtime_not_allowed",
            SecurityRule::DeviceNotAllowed => "device_not_allowed",
            SecurityRule::IdentityOverride => "identity_override",
        }
    }
}

/// A single rule violation found during validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub rule: SecurityRule,
    pub detail: String,
}

/// The validator's verdict for one descriptor
///
/// Binary at the descriptor level; all violations are collected, not
/// just the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub accepted: bool,
    pub violations: Vec<Violation>,
}

impl ValidationVerdict {
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        Self {
            accepted: violations.is_empty(),
            violations,
        }
    }
}

/// The on-disk result of a successful write
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedArtifact {
    pub service_id: String,
    pub path: PathBuf,
    /// SHA256 of the written content
    pub checksum: String,
    pub size_bytes: u64,
    pub written_at: i64,
}

/// Outcome of a deploy request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeployOutcome {
    Written(PersistedArtifact),
    Rejected(ValidationVerdict),
    NotFound { service_id: String },
}
