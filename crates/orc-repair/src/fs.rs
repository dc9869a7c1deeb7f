//! The Workspace FS Adapter's narrow interface. Defined here, in the Repair
//! Agent's own crate, rather than in the adapter implementation crate --
//! `orc-workspace-fs` depends on this crate to implement the trait, not the
//! other way around.

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceFsError {
    #[error("path not found: {0}")]
    NotFound(String),
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Relative paths are rooted at a workspace directory owned per request.
pub trait WorkspaceFs: Send + Sync {
    fn exists(&self, path: &str) -> Result<bool, WorkspaceFsError>;
    fn read(&self, path: &str) -> Result<Vec<u8>, WorkspaceFsError>;
    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), WorkspaceFsError>;
}
