//! Storage for uploaded model artifacts
//!
//! The upload directory is the host side of the shared volume mounted
//! into every model workload. The serving image loads a fixed file name
//! from it, so each upload replaces the previous artifact.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// File name the serving image loads from the model directory
pub const MODEL_FILE_NAME: &str = "model.h5";

#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the upload directory if needed and check that it is a directory
    pub async fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        let meta = fs::metadata(&self.dir).await?;
        if !meta.is_dir() {
            return Err(Error::validation(format!(
                "{} is not a directory",
                self.dir.display()
            )));
        }
        Ok(())
    }

    /// Persist an uploaded artifact and return where it landed
    pub async fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        if bytes.is_empty() {
            return Err(Error::validation(format!(
                "uploaded model '{}' is empty",
                file_name
            )));
        }
        fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(MODEL_FILE_NAME);
        fs::write(&path, bytes).await?;
        info!(
            file_name = %file_name,
            path = %path.display(),
            size_bytes = bytes.len(),
            "Stored uploaded model"
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_writes_fixed_file_name() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path().join("shared-models"));

        let path = store.save("Fraud_Model.h5", b"weights").await.unwrap();
        assert_eq!(path, dir.path().join("shared-models").join(MODEL_FILE_NAME));
        assert_eq!(fs::read(&path).await.unwrap(), b"weights");
    }

    #[tokio::test]
    async fn test_save_replaces_previous_upload() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());

        store.save("a.h5", b"first").await.unwrap();
        let path = store.save("b.h5", b"second").await.unwrap();
        assert_eq!(fs::read(&path).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_empty_upload_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());

        let err = store.save("empty.h5", b"").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(!dir.path().join(MODEL_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_prepare_rejects_file_path() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();

        tokio_test::assert_ok!(ModelStore::new(dir.path().join("new")).prepare().await);
        tokio_test::assert_err!(ModelStore::new(&file).prepare().await);
    }
}
