//! Filesystem tools confined to an agent's working directory

use std::path::{Component, Path, PathBuf};

use super::ToolError;

/// Resolve a model-supplied relative path inside `root`
///
/// Absolute paths and `..` components that climb above `root` are rejected.
/// The deepest part of the target that already exists is canonicalized, so a
/// symlinked file or directory anywhere on the path cannot lead out.
pub fn resolve_in(root: &Path, requested: &str) -> Result<PathBuf, ToolError> {
    let requested = requested.trim();
    let rel = Path::new(requested);
    let escape = || ToolError::PathEscape(requested.to_string());

    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop().ok_or_else(escape)?;
            }
            Component::RootDir | Component::Prefix(_) => return Err(escape()),
        }
    }

    let mut resolved = root.to_path_buf();
    resolved.extend(parts);

    if !stays_within(root, &resolved) {
        return Err(escape());
    }
    Ok(resolved)
}

/// Whether the existing portion of `target` resolves to a place under `root`
fn stays_within(root: &Path, target: &Path) -> bool {
    let Ok(real_root) = root.canonicalize() else {
        // Nothing below a missing root exists yet
        return true;
    };
    let existing = target
        .ancestors()
        .find(|p| p.symlink_metadata().is_ok())
        .unwrap_or(root);
    match existing.canonicalize() {
        Ok(real) => real.starts_with(&real_root),
        // Dangling symlink
        Err(_) => false,
    }
}

pub async fn read_file(root: &Path, path: &str) -> Result<String, ToolError> {
    let target = resolve_in(root, path)?;
    let bytes = tokio::fs::read(&target)
        .await
        .map_err(|e| ToolError::Io(format!("cannot read {path}: {e}")))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub async fn write_file(root: &Path, path: &str, content: &str) -> Result<String, ToolError> {
    let target = resolve_in(root, path)?;
    if target == root {
        return Err(ToolError::InvalidArgument("path must name a file".to_string()));
    }
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ToolError::Io(format!("cannot create directory for {path}: {e}")))?;
        if !stays_within(root, parent) {
            return Err(ToolError::PathEscape(path.trim().to_string()));
        }
    }
    tokio::fs::write(&target, content)
        .await
        .map_err(|e| ToolError::Io(format!("cannot write {path}: {e}")))?;
    Ok(format!("Wrote {} bytes to {}", content.len(), path.trim()))
}

pub async fn list_files(root: &Path, path: &str) -> Result<String, ToolError> {
    let target = resolve_in(root, path)?;
    let mut dir = tokio::fs::read_dir(&target)
        .await
        .map_err(|e| ToolError::Io(format!("cannot list {}: {e}", display_path(path))))?;

    let mut entries = Vec::new();
    while let Some(entry) = dir
        .next_entry()
        .await
        .map_err(|e| ToolError::Io(e.to_string()))?
    {
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
            name.push('/');
        }
        entries.push(name);
    }
    entries.sort();

    if entries.is_empty() {
        Ok("(empty directory)".to_string())
    } else {
        Ok(entries.join("\n"))
    }
}

fn display_path(path: &str) -> &str {
    if path.trim().is_empty() {
        "."
    } else {
        path
    }
}
