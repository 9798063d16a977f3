use crate::Result;
use std::path::{Path, PathBuf};

/// The isolated user-data-dir our Chrome instances run with.
///
/// The directory is persistent: it keeps the Zendesk login between
/// invocations and is never removed.
#[derive(Debug, Clone)]
pub struct ProfileDir {
    path: PathBuf,
}

impl ProfileDir {
    /// Wrap `path` without touching the filesystem.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create the directory (and parents) if missing.
    pub fn ensure(&self) -> Result<&Path> {
        if !self.path.exists() {
            tracing::debug!("Creating Chrome profile at {}", self.path.display());
            std::fs::create_dir_all(&self.path)?;
        }
        Ok(&self.path)
    }

}
