//! Local blob storage for uploaded document images.
//!
//! Files live flat under one directory. References handed to callers have
//! the form `/uploads/{name}`; every accessor also accepts a bare name.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::StorageError;

pub const UPLOAD_PREFIX: &str = "/uploads/";

#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `reference` points at a file in this store rather than a remote URL.
    pub fn is_local_reference(reference: &str) -> bool {
        reference.starts_with(UPLOAD_PREFIX)
    }

    /// Strip the `/uploads/` prefix if present.
    pub fn name_from_reference(reference: &str) -> &str {
        reference.strip_prefix(UPLOAD_PREFIX).unwrap_or(reference)
    }

    /// Write `bytes` under `name`, creating the directory on first use.
    pub async fn store(&self, name: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let path = self.resolve(name)?;
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(&path, bytes).await?;
        debug!("FileStorage: stored '{}' ({} bytes)", name, bytes.len());
        Ok(format!("{}{}", UPLOAD_PREFIX, name))
    }

    pub async fn fetch(&self, reference: &str) -> Result<Vec<u8>, StorageError> {
        let name = Self::name_from_reference(reference);
        let path = self.resolve(name)?;
        tokio::fs::read(&path).await.map_err(|e| not_found_or_io(e, name))
    }

    pub async fn remove(&self, reference: &str) -> Result<(), StorageError> {
        let name = Self::name_from_reference(reference);
        let path = self.resolve(name)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| not_found_or_io(e, name))?;
        debug!("FileStorage: removed '{}'", name);
        Ok(())
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, StorageError> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(|c: char| c == '/' || c == '\\' || c == '\0');
        if !valid {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }
}

fn not_found_or_io(err: std::io::Error, name: &str) -> StorageError {
    if err.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(name.to_string())
    } else {
        StorageError::Io(err)
    }
}
