//! Lexical path normalization for confinement checks
//!
//! The validator must never touch the filesystem, so paths are
//! normalized purely lexically: `.` segments drop, `..` segments pop.
//! A relative path, or a traversal that escapes the root, fails
//! normalization and the caller treats that as rejection.

use std::path::{Component, Path, PathBuf};

/// Normalize an absolute path without filesystem access
///
/// Returns None for relative paths, empty paths, and traversals that
/// escape the root.
pub fn normalize(raw: &str) -> Option<PathBuf> {
    let path = Path::new(raw);
    let mut components = path.components();

    match components.next() {
        Some(Component::RootDir) => {}
        _ => return None,
    }

    let mut normalized = PathBuf::from("/");
    for component in components {
        match component {
            Component::Normal(segment) => normalized.push(segment),
            Component::CurDir => {}
            Component::ParentDir => {
                // Popping past the root is an escape attempt
                if !normalized.pop() || normalized == Path::new("") {
                    return None;
                }
                if normalized.as_os_str().is_empty() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    Some(normalized)
}

/// Whether a raw path spells any literal `.` or `..` segments
///
/// Checked on the raw string, not on components: `Path::components`
/// already folds `.` away, but the raw text is what gets persisted
/// and later re-resolved by the container runtime.
pub fn has_dot_segments(raw: &str) -> bool {
    raw.split('/').any(|segment| segment == "." || segment == "..")
}

/// Whether `path` is `root` or sits beneath it
pub fn is_within(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}

/// Whether `path` sits strictly beneath `root`
pub fn is_strictly_within(path: &Path, root: &Path) -> bool {
    path.starts_with(root) && path != root
}
