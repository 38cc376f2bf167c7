//! Security validation of deployment descriptors
//!
//! The single gate every descriptor passes before persistence. The
//! validator is pure and total: no filesystem access, no clock, no
//! network; identical input always yields an identical verdict. All
//! rules run on every candidate and every violation is collected, so
//! callers can report the full problem list at once.

pub mod paths;

use crate::models::{
    DeploymentDescriptor, MountSource, SecurityRule, ValidationVerdict, Violation,
};
use crate::policy::SecurityPolicy;
use std::path::Path;

/// Host paths that must never be mounted into a container, nor any
/// of their ancestors or descendants
const FORBIDDEN_MOUNT_TARGETS: &[&str] = &[
    "/", "/boot", "/etc", "/proc", "/sys", "/dev", "/usr", "/var/run",
];

/// Validate a candidate descriptor against the policy
///
/// Acceptance requires zero violations; there is no partial accept.
pub fn validate(descriptor: &DeploymentDescriptor, policy: &SecurityPolicy) -> ValidationVerdict {
    let mut violations = Vec::new();

    check_privilege(descriptor, &mut violations);
    check_runtime(descriptor, policy, &mut violations);
    check_devices(descriptor, policy, &mut violations);
    check_volumes(descriptor, policy, &mut violations);
    check_identity(descriptor, policy, &mut violations);

    ValidationVerdict::from_violations(violations)
}

/// Defense in depth: composition can never set this, but a buggy or
/// bypassed compositor must still be caught here
fn check_privilege(descriptor: &DeploymentDescriptor, violations: &mut Vec<Violation>) {
    if descriptor.privileged {
        violations.push(Violation {
            rule: SecurityRule::PrivilegedMode,
            detail: "privileged mode is not permitted for generated services".to_string(),
        });
    }
}

fn check_runtime(
    descriptor: &DeploymentDescriptor,
    policy: &SecurityPolicy,
    violations: &mut Vec<Violation>,
) {
    if let Some(runtime) = &descriptor.runtime {
        if !policy.allowed_runtimes.iter().any(|r| r == runtime) {
            violations.push(Violation {
                rule: SecurityRule::RuntimeNotAllowed,
                detail: format!("runtime '{}' is not in the supported set", runtime),
            });
        }
    }
}

fn check_devices(
    descriptor: &DeploymentDescriptor,
    policy: &SecurityPolicy,
    violations: &mut Vec<Violation>,
) {
    for device in &descriptor.devices {
        let Some(normalized) = paths::normalize(device) else {
            violations.push(Violation {
                rule: SecurityRule::PathTraversal,
                detail: format!("device path '{}' does not normalize", device),
            });
            continue;
        };

        let allowed = policy
            .allowed_device_paths
            .iter()
            .any(|d| Path::new(d) == normalized);
        if !allowed {
            violations.push(Violation {
                rule: SecurityRule::DeviceNotAllowed,
                detail: format!("device '{}' is not a catalog-declared device path", device),
            });
        }
    }
}

fn check_volumes(
    descriptor: &DeploymentDescriptor,
    policy: &SecurityPolicy,
    violations: &mut Vec<Violation>,
) {
    for volume in &descriptor.volumes {
        // Caller-supplied paths must already be in canonical form; a
        // literal dot segment can re-resolve through a symlink planted
        // under the mountable roots, so the lexically-normalized form
        // is not trusted for user input.
        if volume.source == MountSource::UserParameter
            && paths::has_dot_segments(&volume.host_path)
        {
            violations.push(Violation {
                rule: SecurityRule::PathTraversal,
                detail: format!(
                    "user-supplied path '{}' must not contain '.' or '..' segments",
                    volume.host_path
                ),
            });
        }

        let host = match paths::normalize(&volume.host_path) {
            Some(host) => host,
            None => {
                violations.push(Violation {
                    rule: SecurityRule::PathTraversal,
                    detail: format!(
                        "host path '{}' is relative or escapes the root",
                        volume.host_path
                    ),
                });
                continue;
            }
        };

        if paths::normalize(&volume.container_path).is_none() {
            violations.push(Violation {
                rule: SecurityRule::PathTraversal,
                detail: format!(
                    "container path '{}' is relative or escapes the root",
                    volume.container_path
                ),
            });
        }

        if let Some(target) = forbidden_target(&host) {
            violations.push(Violation {
                rule: SecurityRule::ForbiddenMountTarget,
                detail: format!(
                    "host path '{}' maps into protected target '{}'",
                    volume.host_path, target
                ),
            });
        }

        match volume.source {
            MountSource::UserParameter => {
                let confined = policy
                    .allowed_mount_roots
                    .iter()
                    .any(|root| paths::is_strictly_within(&host, root));
                if !confined {
                    violations.push(Violation {
                        rule: SecurityRule::UnconfinedHostPath,
                        detail: format!(
                            "user-supplied path '{}' is outside the mountable roots",
                            volume.host_path
                        ),
                    });
                }
            }
            MountSource::Template => {
                if !paths::is_within(&host, &policy.base_root) {
                    violations.push(Violation {
                        rule: SecurityRule::UnconfinedHostPath,
                        detail: format!(
                            "template path '{}' is outside the engine base directory",
                            volume.host_path
                        ),
                    });
                }
            }
        }
    }
}

/// Return the protected target a path collides with, if any
///
/// A path collides when it equals a target, sits beneath one, or is
/// an ancestor of one (mounting /var exposes /var/run).
fn forbidden_target(host: &Path) -> Option<&'static str> {
    // "/" is only a collision when mounted itself; every absolute
    // path trivially sits beneath it
    if host == Path::new("/") {
        return Some("/");
    }

    FORBIDDEN_MOUNT_TARGETS
        .iter()
        .copied()
        .filter(|target| *target != "/")
        .find(|target| {
            let target_path = Path::new(*target);
            host.starts_with(target_path) || target_path.starts_with(host)
        })
}

/// The ownership pair is pinned to the operational default; a
/// caller-supplied override (in particular uid 0) is rejected
fn check_identity(
    descriptor: &DeploymentDescriptor,
    policy: &SecurityPolicy,
    violations: &mut Vec<Violation>,
) {
    let expected = [
        ("PUID", policy.default_uid),
        ("PGID", policy.default_gid),
    ];

    for (key, default) in expected {
        if let Some(value) = descriptor.environment.get(key) {
            if value.parse::<u32>() != Ok(default) {
                violations.push(Violation {
                    rule: SecurityRule::IdentityOverride,
                    detail: format!(
                        "{} must be the operational default {}, got '{}'",
                        key, default, value
                    ),
                });
            }
        }
    }
}
