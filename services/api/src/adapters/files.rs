//! services/api/src/adapters/files.rs
//!
//! Local-disk implementation of the `FileStore` port. Files are served back
//! by the router under `/uploads`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use quillwright_core::ports::{FileStore, PortError, PortResult};
use tracing::debug;

pub const UPLOADS_URL_PREFIX: &str = "/uploads";

#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the upload directory if it does not exist yet.
    pub async fn ensure_root(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Only flat names are accepted.
    fn path_for(&self, name: &str) -> PortResult<PathBuf> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(PortError::InvalidInput(format!("Invalid file name: {name}")));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn save(&self, name: &str, bytes: &[u8]) -> PortResult<String> {
        let path = self.path_for(name)?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to write {}: {e}", path.display())))?;
        debug!(file = name, size = bytes.len(), "Stored upload");
        Ok(format!("{UPLOADS_URL_PREFIX}/{name}"))
    }

    async fn delete(&self, name: &str) -> PortResult<()> {
        let path = self.path_for(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PortError::NotFound(format!("File {name} not found")))
            }
            Err(e) => Err(PortError::Unexpected(format!(
                "Failed to delete {}: {e}",
                path.display()
            ))),
        }
    }
}
