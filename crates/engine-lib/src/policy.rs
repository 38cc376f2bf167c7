//! Global security policy
//!
//! A small fixed set of constants consumed by the validator and the
//! writer: confinement root, mountable host-root allow-list, runtime
//! allow-list, device allow-list, and the operational identity pair.
//! Loaded once at startup and never mutated by request traffic.

use std::path::PathBuf;

/// Default engine base directory on the host
pub const DEFAULT_BASE_ROOT: &str = "/opt/homestack";

/// Operational default for the PUID/PGID ownership pair
pub const DEFAULT_UID: u32 = 1000;
pub const DEFAULT_GID: u32 = 1000;

/// Policy constants for validation and persistence
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    /// Directory all engine-owned host paths live under
    pub base_root: PathBuf,
    /// Directory compose artifacts are written to; the writer is
    /// forbidden to create or modify files outside it
    pub confinement_root: PathBuf,
    /// Directory per-service config mounts live under
    pub config_root: PathBuf,
    /// Host-root prefixes user-supplied mounts may come from
    /// (typically the Windows drive mounts under /mnt)
    pub allowed_mount_roots: Vec<PathBuf>,
    /// Container runtimes a descriptor may select
    pub allowed_runtimes: Vec<String>,
    /// Device paths catalog bindings may pass through
    pub allowed_device_paths: Vec<String>,
    pub default_uid: u32,
    pub default_gid: u32,
}

impl SecurityPolicy {
    /// Build a policy rooted at the given base directory
    pub fn with_base_root(base_root: impl Into<PathBuf>) -> Self {
        let base_root = base_root.into();
        Self {
            confinement_root: base_root.join("services"),
            config_root: base_root.join("config"),
            base_root,
            allowed_mount_roots: vec![PathBuf::from("/mnt")],
            allowed_runtimes: vec!["nvidia".to_string()],
            allowed_device_paths: vec![
                "/dev/dri".to_string(),
                "/dev/kfd".to_string(),
                "/dev/dxg".to_string(),
            ],
            default_uid: DEFAULT_UID,
            default_gid: DEFAULT_GID,
        }
    }
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self::with_base_root(DEFAULT_BASE_ROOT)
    }
}
