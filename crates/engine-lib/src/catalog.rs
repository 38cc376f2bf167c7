//! Service template catalog
//!
//! The catalog is a fixed, versioned table of parameterized service
//! definitions, populated once at process start and read-only for the
//! life of the process. Each entry declares which hardware bindings it
//! can exploit and which user-parameter slots it accepts.

use crate::models::{GpuVendor, PortMapping};

/// Catalog table version, bumped whenever an entry changes
pub const CATALOG_VERSION: &str = "2025.08";

/// A user-parameter substitution slot a template declares
///
/// Parameters are only ever substituted into declared slots; arbitrary
/// keys are never interpolated into descriptor fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSlot {
    /// A host media directory, mounted read-write under the media root
    MediaPath,
    /// Override for the host side of the first published port
    Port,
}

/// Descriptor fragments activated for a specific GPU vendor
#[derive(Debug, Clone)]
pub struct HardwareBinding {
    /// Device paths to pass through (e.g. /dev/dri)
    pub devices: Vec<String>,
    /// Container runtime to select (e.g. "nvidia")
    pub runtime: Option<String>,
    /// Environment overrides; these win over template defaults
    pub environment: Vec<(String, String)>,
}

/// A single catalog entry
#[derive(Debug, Clone)]
pub struct ServiceTemplate {
    pub id: String,
    pub image: String,
    pub container_name: String,
    pub restart: String,
    pub network_mode: Option<String>,
    pub ports: Vec<PortMapping>,
    /// Container path for the per-service config mount, if any
    pub config_mount: Option<String>,
    /// Docker named volumes: (volume name, container path)
    pub named_volumes: Vec<(String, String)>,
    /// Default environment; hardware bindings override on collision
    pub environment: Vec<(String, String)>,
    /// Whether the service honors the PUID/PGID ownership pair
    pub uses_identity: bool,
    /// Container directory user media mounts land under
    pub media_root: String,
    pub param_slots: Vec<ParamSlot>,
    pub hardware_bindings: Vec<(GpuVendor, HardwareBinding)>,
}

impl ServiceTemplate {
    /// Look up the binding fragments for a vendor, if declared
    pub fn binding_for(&self, vendor: GpuVendor) -> Option<&HardwareBinding> {
        self.hardware_bindings
            .iter()
            .find(|(v, _)| *v == vendor)
            .map(|(_, binding)| binding)
    }

    pub fn accepts(&self, slot: ParamSlot) -> bool {
        self.param_slots.contains(&slot)
    }
}

/// The process-wide template registry
#[derive(Debug)]
pub struct Catalog {
    templates: Vec<ServiceTemplate>,
}

impl Catalog {
    /// Build the built-in catalog table
    pub fn builtin() -> Self {
        Self {
            templates: vec![
                ollama(),
                plex(),
                jellyfin(),
                sonarr(),
                radarr(),
                lidarr(),
                overseerr(),
            ],
        }
    }

    /// Look up a template by service id
    ///
    /// Absence means the caller asked for an unsupported service; this
    /// is a client-input error, not a security event.
    pub fn lookup(&self, service_id: &str) -> Option<&ServiceTemplate> {
        self.templates.iter().find(|t| t.id == service_id)
    }

    pub fn templates(&self) -> &[ServiceTemplate] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Full GPU binding set for transcoding/inference services
fn gpu_bindings() -> Vec<(GpuVendor, HardwareBinding)> {
    vec![
        (
            GpuVendor::Nvidia,
            HardwareBinding {
                devices: vec![],
                runtime: Some("nvidia".to_string()),
                environment: env(&[
                    ("NVIDIA_VISIBLE_DEVICES", "all"),
                    ("NVIDIA_DRIVER_CAPABILITIES", "all"),
                ]),
            },
        ),
        (
            GpuVendor::Amd,
            HardwareBinding {
                devices: vec!["/dev/kfd".to_string(), "/dev/dri".to_string()],
                runtime: None,
                environment: env(&[("HSA_OVERRIDE_GFX_VERSION", "12.0.0")]),
            },
        ),
        (
            GpuVendor::Intel,
            HardwareBinding {
                devices: vec!["/dev/dri".to_string()],
                runtime: None,
                environment: vec![],
            },
        ),
    ]
}

fn ollama() -> ServiceTemplate {
    ServiceTemplate {
        id: "ollama".to_string(),
        image: "ollama/ollama:latest".to_string(),
        container_name: "ollama".to_string(),
        restart: "always".to_string(),
        network_mode: None,
        ports: vec![PortMapping {
            host: 11434,
            container: 11434,
        }],
        config_mount: None,
        named_volumes: vec![("ollama_data".to_string(), "/root/.ollama".to_string())],
        environment: env(&[("OLLAMA_KEEP_ALIVE", "24h")]),
        uses_identity: true,
        media_root: "/data".to_string(),
        param_slots: vec![ParamSlot::Port],
        hardware_bindings: gpu_bindings(),
    }
}

fn plex() -> ServiceTemplate {
    ServiceTemplate {
        id: "plex".to_string(),
        image: "lscr.io/linuxserver/plex:latest".to_string(),
        container_name: "plex".to_string(),
        restart: "unless-stopped".to_string(),
        network_mode: Some("host".to_string()),
        ports: vec![],
        config_mount: Some("/config".to_string()),
        named_volumes: vec![],
        environment: env(&[("VERSION", "docker")]),
        uses_identity: true,
        media_root: "/data".to_string(),
        param_slots: vec![ParamSlot::MediaPath],
        hardware_bindings: gpu_bindings(),
    }
}

fn jellyfin() -> ServiceTemplate {
    ServiceTemplate {
        id: "jellyfin".to_string(),
        image: "lscr.io/linuxserver/jellyfin:latest".to_string(),
        container_name: "jellyfin".to_string(),
        restart: "unless-stopped".to_string(),
        network_mode: None,
        ports: vec![PortMapping {
            host: 8096,
            container: 8096,
        }],
        config_mount: Some("/config".to_string()),
        named_volumes: vec![],
        environment: env(&[("TZ", "Etc/UTC")]),
        uses_identity: true,
        media_root: "/data".to_string(),
        param_slots: vec![ParamSlot::MediaPath, ParamSlot::Port],
        hardware_bindings: gpu_bindings(),
    }
}

/// Shared shape for the *arr media managers (GPU-optional)
fn arr_service(id: &str, port: u16) -> ServiceTemplate {
    ServiceTemplate {
        id: id.to_string(),
        image: format!("lscr.io/linuxserver/{}:latest", id),
        container_name: id.to_string(),
        restart: "unless-stopped".to_string(),
        network_mode: None,
        ports: vec![PortMapping {
            host: port,
            container: port,
        }],
        config_mount: Some("/config".to_string()),
        named_volumes: vec![],
        environment: env(&[("TZ", "Etc/UTC")]),
        uses_identity: true,
        media_root: "/data".to_string(),
        param_slots: vec![ParamSlot::MediaPath, ParamSlot::Port],
        hardware_bindings: vec![],
    }
}

fn sonarr() -> ServiceTemplate {
    arr_service("sonarr", 8989)
}

fn radarr() -> ServiceTemplate {
    arr_service("radarr", 7878)
}

fn lidarr() -> ServiceTemplate {
    arr_service("lidarr", 8686)
}

fn overseerr() -> ServiceTemplate {
    ServiceTemplate {
        id: "overseerr".to_string(),
        image: "sctx/overseerr:latest".to_string(),
        container_name: "overseerr".to_string(),
        restart: "unless-stopped".to_string(),
        network_mode: None,
        ports: vec![PortMapping {
            host: 5055,
            container: 5055,
        }],
        config_mount: Some("/app/config".to_string()),
        named_volumes: vec![],
        environment: env(&[("LOG_LEVEL", "debug"), ("TZ", "Etc/UTC"), ("PORT", "5055")]),
        uses_identity: false,
        media_root: "/data".to_string(),
        param_slots: vec![ParamSlot::Port],
        hardware_bindings: vec![],
    }
}
