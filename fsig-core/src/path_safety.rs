use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::error::{Result, SignatureError};

#[derive(Clone, Copy, Debug, Default)]
pub struct PathPolicy {
    pub follow_symlinks: bool,
}

/// Confirm `path` names an existing regular file.
pub fn check_file_path(path: &Path) -> Result<PathBuf> {
    let meta = std::fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => SignatureError::PathNotFound(path.to_path_buf()),
        _ => SignatureError::io(path, e),
    })?;
    if !meta.is_file() {
        return Err(SignatureError::NotAFile(path.to_path_buf()));
    }
    Ok(path.to_path_buf())
}

/// Spelling-independent key for `path`: relative paths are joined onto the
/// working directory and `.` components are dropped. No filesystem access.
pub fn lexical_key(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };
    joined.components().filter(|c| !matches!(c, Component::CurDir)).collect()
}

/// Resolve a name stored in a sidecar against the sidecar's directory.
///
/// The name must stay inside `dir`: no absolute paths, no `..`. Symlinks are
/// refused unless `follow_symlinks`, in which case the canonical target must
/// still live under `dir`.
pub fn resolve_named(dir: &Path, name: &str, policy: PathPolicy) -> Result<PathBuf> {
    let rel = Path::new(name);
    let unsafe_path = |reason| SignatureError::UnsafePath { path: rel.to_path_buf(), reason };
    if name.is_empty() {
        return Err(unsafe_path("empty name"));
    }
    if rel.is_absolute() || rel.has_root() {
        return Err(unsafe_path("absolute paths are not allowed"));
    }
    if rel.components().any(|c| matches!(c, Component::ParentDir | Component::Prefix(_))) {
        return Err(unsafe_path("parent traversal not allowed"));
    }
    let candidate = dir.join(rel);
    if !policy.follow_symlinks {
        let mut cur = dir.to_path_buf();
        for comp in rel.components() {
            cur.push(comp);
            if let Ok(m) = std::fs::symlink_metadata(&cur) {
                if m.file_type().is_symlink() {
                    return Err(SignatureError::UnsafePath {
                        path: cur,
                        reason: "symlink encountered (not following)",
                    });
                }
            }
        }
        return Ok(candidate);
    }
    let canonical = |p: &Path| {
        std::fs::canonicalize(p).map_err(|e| match e.kind() {
            ErrorKind::NotFound => SignatureError::PathNotFound(p.to_path_buf()),
            _ => SignatureError::io(p, e),
        })
    };
    let dir_can = canonical(dir)?;
    let cand_can = canonical(&candidate)?;
    if !cand_can.starts_with(&dir_can) {
        return Err(unsafe_path("path escapes signature directory"));
    }
    Ok(cand_can)
}
