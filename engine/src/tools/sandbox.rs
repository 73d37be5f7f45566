//! Filesystem containment: every tool path resolves through here before any
//! IO happens.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Why a path was refused.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("path outside sandbox")]
    Outside,
    #[error("not an absolute path")]
    NotAbsolute,
    #[error("home directory unavailable")]
    NoHome,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Resolve symlinks when the path exists; otherwise normalize lexically so
/// the containment check still applies to create-cases.
fn resolve_or_normalize(path: &Path) -> io::Result<PathBuf> {
    match std::fs::canonicalize(path) {
        Ok(resolved) => Ok(resolved),
        Err(_) => lexical_absolute(path),
    }
}

/// Absolute form of `path` with `.` and `..` segments folded away, without
/// touching the filesystem.
fn lexical_absolute(path: &Path) -> io::Result<PathBuf> {
    let mut absolute = if path.is_absolute() {
        PathBuf::new()
    } else {
        std::env::current_dir()?
    };
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                absolute.pop();
            }
            other => absolute.push(other),
        }
    }
    Ok(absolute)
}

/// Join `target` (relative) onto `root` and require the result to stay
/// within `root` after symlink resolution.
pub fn safe_path(root: &Path, target: &str) -> Result<PathBuf, SandboxError> {
    let abs_root = resolve_or_normalize(root)?;
    let joined = abs_root.join(target);
    let abs_target = resolve_or_normalize(&joined)?;
    if abs_target.starts_with(&abs_root) {
        Ok(abs_target)
    } else {
        Err(SandboxError::Outside)
    }
}

/// Admit an already-absolute (or `~/`-prefixed) path if, after symlink
/// resolution on both sides, it sits under any of the allowed roots.
pub fn safe_abs_path(target: &str, roots: &[PathBuf]) -> Result<PathBuf, SandboxError> {
    let expanded = if let Some(rest) = target.strip_prefix("~/") {
        dirs::home_dir().ok_or(SandboxError::NoHome)?.join(rest)
    } else {
        PathBuf::from(target)
    };
    if !expanded.is_absolute() {
        return Err(SandboxError::NotAbsolute);
    }
    let abs_target = resolve_or_normalize(&expanded)?;
    for root in roots {
        let Ok(abs_root) = resolve_or_normalize(root) else {
            continue;
        };
        if abs_target.starts_with(&abs_root) {
            return Ok(abs_target);
        }
    }
    Err(SandboxError::Outside)
}

/// Absolute tool paths are admitted against the sandbox root plus the
/// well-known agent dotdirs under the user home.
pub fn resolve_abs_path(target: &str, root_dir: &Path) -> Result<PathBuf, SandboxError> {
    let mut roots = vec![root_dir.to_path_buf()];
    if let Some(home) = dirs::home_dir() {
        roots.push(home.join(".claude"));
        roots.push(home.join(".openlink"));
        roots.push(home.join(".agent"));
    }
    safe_abs_path(target, &roots)
}

/// Sandbox-resolve a tool `path` argument: relative paths join the root,
/// absolute paths go through the allow-list.
pub fn resolve_tool_path(path: &str, root_dir: &Path) -> Result<PathBuf, SandboxError> {
    if Path::new(path).is_absolute() {
        resolve_abs_path(path, root_dir)
    } else {
        safe_path(root_dir, path)
    }
}
