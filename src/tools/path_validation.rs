//! Sandbox path validation for file tools.
//!
//! Every file tool resolves its `path` argument against the files directory.
//! Traversal components, absolute paths outside the sandbox and symlinks that
//! resolve outside it are rejected.

use std::path::{Component, Path, PathBuf};

use super::types::ToolError;

/// Check if a path contains traversal sequences that could escape a sandbox.
pub fn is_path_safe(path: &str) -> bool {
    !Path::new(path)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
}

/// Create (if needed) and canonicalize the sandbox root.
pub fn sandbox_root(root: &Path) -> Result<PathBuf, ToolError> {
    std::fs::create_dir_all(root)
        .map_err(|e| ToolError::Execution(format!("cannot create files directory: {e}")))?;
    root.canonicalize()
        .map_err(|e| ToolError::Execution(format!("invalid files directory: {e}")))
}

/// Sanitize a path for user-facing messages: shown relative to the sandbox.
pub fn display_path(path: &Path, root: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_owned(),
        Ok(rel) => rel.display().to_string(),
        Err(_) => path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "[path]".to_owned()),
    }
}

/// Resolve `path` inside the sandbox `root` for reading or listing.
///
/// Returns an absolute path under the canonical root. The target need not exist.
pub fn resolve_in_sandbox(path: &str, root: &Path) -> Result<PathBuf, ToolError> {
    let root = sandbox_root(root)?;
    let absolute = lexical_target(path, &root)?;

    if let Ok(canonical) = absolute.canonicalize() {
        if !canonical.starts_with(&root) {
            return Err(ToolError::InvalidArgs(format!(
                "access denied: '{}' resolves outside the files directory",
                display_path(&absolute, &root)
            )));
        }
        return Ok(canonical);
    }

    let ancestor = first_existing_ancestor(&absolute)
        .and_then(|a| a.canonicalize().ok())
        .ok_or_else(|| ToolError::InvalidArgs("path parent does not exist".into()))?;
    if !ancestor.starts_with(&root) {
        return Err(ToolError::InvalidArgs(
            "access denied: path parent escapes the files directory".into(),
        ));
    }
    Ok(absolute)
}

/// Resolve `path` for writing: as [`resolve_in_sandbox`], and additionally
/// refuse the sandbox root itself and writes through symlinks.
pub fn resolve_write_path(path: &str, root: &Path) -> Result<PathBuf, ToolError> {
    if path.trim().is_empty() {
        return Err(ToolError::InvalidArgs("path is empty".into()));
    }
    let canonical_root = sandbox_root(root)?;
    let lexical = lexical_target(path, &canonical_root)?;
    if std::fs::symlink_metadata(&lexical).is_ok_and(|m| m.file_type().is_symlink()) {
        return Err(ToolError::InvalidArgs(
            "cannot write through symlink path".into(),
        ));
    }
    let resolved = resolve_in_sandbox(path, root)?;
    if resolved == canonical_root {
        return Err(ToolError::InvalidArgs(
            "path must name a file inside the files directory".into(),
        ));
    }
    Ok(resolved)
}

/// Join `path` onto the canonical root without touching the filesystem
/// beyond rebasing absolute inputs.
fn lexical_target(path: &str, canonical_root: &Path) -> Result<PathBuf, ToolError> {
    let path = path.trim();
    if path.is_empty() || path == "." {
        return Ok(canonical_root.to_path_buf());
    }
    if !is_path_safe(path) {
        return Err(ToolError::InvalidArgs(
            "path contains directory traversal".into(),
        ));
    }
    let input = PathBuf::from(path);
    if input.is_absolute() {
        rebase_absolute(&input, canonical_root).ok_or_else(|| {
            ToolError::InvalidArgs(format!(
                "access denied: '{path}' is outside the files directory"
            ))
        })
    } else {
        Ok(canonical_root.join(input))
    }
}

/// Map an absolute input path onto the canonical root, accepting it when it
/// lies under the root (canonical or as given).
fn rebase_absolute(input: &Path, canonical_root: &Path) -> Option<PathBuf> {
    if input.starts_with(canonical_root) {
        return Some(input.to_path_buf());
    }
    // The root may have been spelled through a symlink (`/var` vs `/private/var`).
    let mut probe = input.to_path_buf();
    let mut tail = Vec::new();
    loop {
        if let Ok(canonical) = probe.canonicalize() {
            if !canonical.starts_with(canonical_root) {
                return None;
            }
            let mut rebased = canonical;
            for part in tail.iter().rev() {
                rebased.push(part);
            }
            return Some(rebased);
        }
        let name = probe.file_name()?.to_os_string();
        tail.push(name);
        if !probe.pop() {
            return None;
        }
    }
}

fn first_existing_ancestor(path: &Path) -> Option<&Path> {
    let mut current = Some(path);
    while let Some(p) = current {
        if p.exists() {
            return Some(p);
        }
        current = p.parent();
    }
    None
}
