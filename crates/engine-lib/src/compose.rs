//! Template composition
//!
//! Combines a catalog entry, a hardware profile, and user parameters
//! into a concrete deployment descriptor. The template itself is
//! never mutated, so concurrent composition from the same entry is
//! safe. No filesystem or network access happens here; adversarial
//! input handling is concentrated in the validator.

use crate::catalog::{ParamSlot, ServiceTemplate};
use crate::models::{DeploymentDescriptor, HardwareProfile, NamedVolume, VolumeMount};
use crate::policy::SecurityPolicy;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Caller-supplied key/value parameters for one request
///
/// Transient; absorbed into a descriptor only through declared slots.
pub type UserParameters = HashMap<String, String>;

/// Parameter key for the media directory slot
pub const PARAM_MEDIA_PATH: &str = "media_path";
/// Parameter key for the published-port slot
pub const PARAM_PORT: &str = "port";

/// Build a candidate descriptor from a template, a hardware profile,
/// and user parameters
pub fn compose(
    template: &ServiceTemplate,
    profile: &HardwareProfile,
    params: &UserParameters,
    policy: &SecurityPolicy,
) -> DeploymentDescriptor {
    let mut environment: BTreeMap<String, String> = template
        .environment
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    // The ownership pair always comes from policy, never from params
    if template.uses_identity {
        environment.insert("PUID".to_string(), policy.default_uid.to_string());
        environment.insert("PGID".to_string(), policy.default_gid.to_string());
    }

    let mut devices: Vec<String> = Vec::new();
    let mut runtime = None;

    // Hardware tuning overrides generic defaults on key collision
    if let Some(binding) = template.binding_for(profile.vendor) {
        for device in &binding.devices {
            if !devices.contains(device) {
                devices.push(device.clone());
            }
        }
        if binding.runtime.is_some() {
            runtime = binding.runtime.clone();
        }
        for (key, value) in &binding.environment {
            environment.insert(key.clone(), value.clone());
        }
    }

    let mut volumes = Vec::new();
    if let Some(container_path) = &template.config_mount {
        let host = policy.config_root.join(&template.id);
        volumes.push(VolumeMount::template(
            host.to_string_lossy().to_string(),
            container_path.clone(),
        ));
    }

    let mut ports = template.ports.clone();

    apply_parameters(template, params, &mut volumes, &mut ports);

    DeploymentDescriptor {
        service_id: template.id.clone(),
        image: template.image.clone(),
        container_name: template.container_name.clone(),
        volumes,
        named_volumes: template
            .named_volumes
            .iter()
            .map(|(name, container_path)| NamedVolume {
                name: name.clone(),
                container_path: container_path.clone(),
            })
            .collect(),
        devices,
        environment,
        ports,
        runtime,
        network_mode: template.network_mode.clone(),
        restart: template.restart.clone(),
        // Never set from any input; the validator re-checks anyway
        privileged: false,
    }
}

/// Substitute user parameters into the template's declared slots only
fn apply_parameters(
    template: &ServiceTemplate,
    params: &UserParameters,
    volumes: &mut Vec<VolumeMount>,
    ports: &mut [crate::models::PortMapping],
) {
    for (key, value) in params {
        match key.as_str() {
            PARAM_MEDIA_PATH if template.accepts(ParamSlot::MediaPath) => {
                // Comma-separated list of host directories, each
                // mounted under the template's media root by basename
                for path in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                    let name = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");
                    let container = format!("{}/{}", template.media_root, name);
                    volumes.push(VolumeMount::user(path, container));
                }
            }
            PARAM_PORT if template.accepts(ParamSlot::Port) => {
                match value.parse::<u16>() {
                    Ok(host_port) if !ports.is_empty() => ports[0].host = host_port,
                    _ => debug!(service = %template.id, value = %value, "Ignoring unusable port parameter"),
                }
            }
            _ => {
                // Arbitrary keys are never interpolated anywhere
                debug!(service = %template.id, key = %key, "Ignoring undeclared parameter");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::hardware;
    use crate::models::{GpuVendor, MountSource};

    fn policy() -> SecurityPolicy {
        SecurityPolicy::default()
    }

    fn profile(vendor: GpuVendor, class: &str) -> HardwareProfile {
        HardwareProfile {
            vendor,
            device_class: class.to_string(),
            bus_address: "0000:01:00.0".to_string(),
        }
    }

    #[test]
    fn test_compose_plex_nvidia() {
        let catalog = Catalog::builtin();
        let template = catalog.lookup("plex").unwrap();
        let params = UserParameters::new();

        let descriptor = compose(
            template,
            &profile(GpuVendor::Nvidia, "Ada"),
            &params,
            &policy(),
        );

        assert_eq!(descriptor.service_id, "plex");
        assert_eq!(descriptor.runtime.as_deref(), Some("nvidia"));
        assert_eq!(
            descriptor.environment.get("NVIDIA_VISIBLE_DEVICES"),
            Some(&"all".to_string())
        );
        assert!(descriptor.devices.is_empty());
        assert!(!descriptor.privileged);
    }

    #[test]
    fn test_compose_plex_amd_devices_and_env() {
        let catalog = Catalog::builtin();
        let template = catalog.lookup("plex").unwrap();

        let descriptor = compose(
            template,
            &profile(GpuVendor::Amd, "RDNA3"),
            &UserParameters::new(),
            &policy(),
        );

        assert!(descriptor.devices.contains(&"/dev/kfd".to_string()));
        assert!(descriptor.devices.contains(&"/dev/dri".to_string()));
        assert_eq!(
            descriptor.environment.get("HSA_OVERRIDE_GFX_VERSION"),
            Some(&"12.0.0".to_string())
        );
        assert!(descriptor.runtime.is_none());
    }

    #[test]
    fn test_compose_no_gpu_leaves_no_bindings() {
        let catalog = Catalog::builtin();
        let template = catalog.lookup("jellyfin").unwrap();

        let descriptor = compose(
            template,
            &hardware::software_profile(),
            &UserParameters::new(),
            &policy(),
        );

        assert!(descriptor.devices.is_empty());
        assert!(descriptor.runtime.is_none());
        assert!(!descriptor.environment.contains_key("NVIDIA_VISIBLE_DEVICES"));
    }

    #[test]
    fn test_media_path_slot_substitution() {
        let catalog = Catalog::builtin();
        let template = catalog.lookup("plex").unwrap();
        let mut params = UserParameters::new();
        params.insert(
            PARAM_MEDIA_PATH.to_string(),
            "/mnt/d/Movies, /mnt/e/TV".to_string(),
        );

        let descriptor = compose(
            template,
            &hardware::software_profile(),
            &params,
            &policy(),
        );

        let user_mounts: Vec<&VolumeMount> = descriptor
            .volumes
            .iter()
            .filter(|v| v.source == MountSource::UserParameter)
            .collect();
        assert_eq!(user_mounts.len(), 2);
        assert_eq!(user_mounts[0].host_path, "/mnt/d/Movies");
        assert_eq!(user_mounts[0].container_path, "/data/Movies");
        assert_eq!(user_mounts[1].host_path, "/mnt/e/TV");
        assert_eq!(user_mounts[1].container_path, "/data/TV");
    }

    #[test]
    fn test_port_slot_overrides_host_side_only() {
        let catalog = Catalog::builtin();
        let template = catalog.lookup("jellyfin").unwrap();
        let mut params = UserParameters::new();
        params.insert(PARAM_PORT.to_string(), "9096".to_string());

        let descriptor = compose(
            template,
            &hardware::software_profile(),
            &params,
            &policy(),
        );

        assert_eq!(descriptor.ports[0].host, 9096);
        assert_eq!(descriptor.ports[0].container, 8096);
    }

    #[test]
    fn test_undeclared_parameters_are_ignored() {
        let catalog = Catalog::builtin();
        let template = catalog.lookup("plex").unwrap();
        let mut params = UserParameters::new();
        params.insert("image".to_string(), "evil/image:latest".to_string());
        params.insert("privileged".to_string(), "true".to_string());
        // plex does not declare a port slot
        params.insert(PARAM_PORT.to_string(), "80".to_string());

        let descriptor = compose(
            template,
            &hardware::software_profile(),
            &params,
            &policy(),
        );

        assert_eq!(descriptor.image, "lscr.io/linuxserver/plex:latest");
        assert!(!descriptor.privileged);
        assert!(descriptor.ports.is_empty());
    }

    #[test]
    fn test_identity_pair_comes_from_policy() {
        let catalog = Catalog::builtin();
        let template = catalog.lookup("sonarr").unwrap();

        let descriptor = compose(
            template,
            &hardware::software_profile(),
            &UserParameters::new(),
            &policy(),
        );

        assert_eq!(descriptor.environment.get("PUID"), Some(&"1000".to_string()));
        assert_eq!(descriptor.environment.get("PGID"), Some(&"1000".to_string()));
    }

    #[test]
    fn test_template_is_not_mutated_by_composition() {
        let catalog = Catalog::builtin();
        let template = catalog.lookup("plex").unwrap();
        let ports_before = template.ports.clone();
        let env_before = template.environment.clone();

        let mut params = UserParameters::new();
        params.insert(PARAM_MEDIA_PATH.to_string(), "/mnt/d/Media".to_string());
        let _ = compose(template, &profile(GpuVendor::Amd, "RDNA3"), &params, &policy());
        let _ = compose(template, &profile(GpuVendor::Nvidia, "Ada"), &params, &policy());

        let template_after = catalog.lookup("plex").unwrap();
        assert_eq!(template_after.ports, ports_before);
        assert_eq!(template_after.environment, env_before);
    }

    #[test]
    fn test_config_mount_rooted_under_policy_config_dir() {
        let catalog = Catalog::builtin();
        let template = catalog.lookup("radarr").unwrap();

        let descriptor = compose(
            template,
            &hardware::software_profile(),
            &UserParameters::new(),
            &policy(),
        );

        assert_eq!(
            descriptor.volumes[0].host_path,
            "/opt/homestack/config/radarr"
        );
        assert_eq!(descriptor.volumes[0].container_path, "/config");
        assert_eq!(descriptor.volumes[0].source, MountSource::Template);
    }
}
