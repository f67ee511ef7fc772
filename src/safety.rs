use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Directory names that are never written into.
const FORBIDDEN_DIRS: &[&str] = &[".git"];

/// Boundary check for every file the driver writes.
///
/// The destination tree may not exist yet, so paths are resolved through
/// their deepest existing ancestor: that part is canonicalized (following
/// symlinks) and the rest is appended lexically.
#[derive(Debug, Clone)]
pub struct OutputGuard {
    /// Canonical output root
    root: PathBuf,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("path is outside the output root: {path} (root: {root})")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("path is in forbidden directory: {path} ({dir})")]
    ForbiddenPath { path: PathBuf, dir: String },

    #[error("failed to canonicalize path: {0}")]
    Canonicalize(#[from] std::io::Error),
}

impl OutputGuard {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        Ok(Self {
            root: resolve(&lexical(root.as_ref()))?,
        })
    }

    /// Check that `path` may be written. Relative paths are taken against
    /// the output root. Returns the resolved absolute path.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let resolved = resolve(&lexical(&absolute))?;

        let Ok(inside) = resolved.strip_prefix(&self.root) else {
            return Err(SafetyError::OutsideRoot {
                path: resolved,
                root: self.root.clone(),
            });
        };
        if let Some(dir) = inside
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .find(|part| FORBIDDEN_DIRS.contains(part))
        {
            return Err(SafetyError::ForbiddenPath {
                dir: dir.to_string(),
                path: resolved,
            });
        }

        Ok(resolved)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Drop `.` and fold `..` without touching the filesystem.
fn lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn resolve(path: &Path) -> Result<PathBuf, SafetyError> {
    let mut existing = path;
    let mut tail: Vec<&OsStr> = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name);
                existing = parent;
            }
            _ => break,
        }
    }

    let mut resolved = if existing.as_os_str().is_empty() {
        std::env::current_dir()?
    } else {
        existing.canonicalize()?
    };
    for name in tail.into_iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}
