//! Real-filesystem implementation of `orc_repair::WorkspaceFs`, rooted at a
//! workspace directory owned per request: `create_dir_all` under a fixed
//! base path, deterministic writes -- no wall-clock timestamps ever enter a
//! written file's content.

use orc_repair::{WorkspaceFs, WorkspaceFsError};
use std::fs;
use std::path::{Path, PathBuf};

/// Rejects any relative path that would resolve outside `root` (`..`
/// segments, absolute paths) -- the Repair Agent's gate already restricts
/// actions to `allowed_files`, but the adapter itself never trusts a path it
/// is handed.
pub struct RealWorkspaceFs {
    root: PathBuf,
}

impl RealWorkspaceFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, WorkspaceFsError> {
        let relative = Path::new(path);
        if relative.is_absolute() || relative.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
            return Err(WorkspaceFsError::Io {
                path: path.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "path escapes workspace root"),
            });
        }
        Ok(self.root.join(relative))
    }
}

impl WorkspaceFs for RealWorkspaceFs {
    fn exists(&self, path: &str) -> Result<bool, WorkspaceFsError> {
        Ok(self.resolve(path)?.exists())
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, WorkspaceFsError> {
        let full = self.resolve(path)?;
        if !full.exists() {
            return Err(WorkspaceFsError::NotFound(path.to_string()));
        }
        fs::read(&full).map_err(|source| WorkspaceFsError::Io {
            path: path.to_string(),
            source,
        })
    }

    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), WorkspaceFsError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|source| WorkspaceFsError::Io {
                path: path.to_string(),
                source,
            })?;
        }
        fs::write(&full, bytes).map_err(|source| WorkspaceFsError::Io {
            path: path.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let dir = std::env::temp_dir().join(format!("orc-workspace-fs-test-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let fs_adapter = RealWorkspaceFs::new(&dir);

        fs_adapter.write("src/nested/a.ts", b"hello").unwrap();
        assert!(fs_adapter.exists("src/nested/a.ts").unwrap());
        assert_eq!(fs_adapter.read("src/nested/a.ts").unwrap(), b"hello");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn a_path_escaping_the_root_is_refused() {
        let dir = std::env::temp_dir().join("orc-workspace-fs-test-escape");
        let fs_adapter = RealWorkspaceFs::new(&dir);
        let err = fs_adapter.read("../../etc/passwd").unwrap_err();
        assert!(matches!(err, WorkspaceFsError::Io { .. }));
    }
}
