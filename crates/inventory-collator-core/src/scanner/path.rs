use std::path::{Component, Path};

/// Path of `path` below `root`, joined with `/` whatever the platform.
/// Returns `None` when `path` is not under `root`, is the root itself, or
/// has a component that is not valid UTF-8.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let stripped = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in stripped.components() {
        if let Component::Normal(part) = component {
            // A lossy conversion would give distinct names the same key.
            parts.push(part.to_str()?);
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Ordered components of a canonical relative path, file name last.
pub fn path_components(relative_path: &str) -> Vec<&str> {
    relative_path
        .split('/')
        .filter(|part| !part.is_empty())
        .collect()
}
