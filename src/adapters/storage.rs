use crate::domain::ports::ArtifactStore;
use crate::utils::error::{DemoError, Result};
use crate::utils::validation::validate_artifact_key;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// 以本機目錄存放產出物
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    base_path: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        validate_artifact_key("artifact_key", key)?;
        Ok(self.base_path.join(key))
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let full_path = self.resolve(key)?;

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&full_path, data).await?;
        tracing::debug!("💾 Stored {} ({} bytes)", full_path.display(), data.len());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let full_path = self.resolve(key)?;
        match tokio::fs::read(&full_path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(DemoError::NotFound {
                resource: "artifact".to_string(),
                id: key.to_string(),
            }),
            Err(e) => Err(DemoError::IoError(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_creates_parent_dirs_and_get_reads_back() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalArtifactStore::new(temp_dir.path());

        store.put("reports/abc.zip", b"zip-bytes").await.unwrap();

        assert!(temp_dir.path().join("reports").join("abc.zip").exists());
        assert_eq!(store.get("reports/abc.zip").await.unwrap(), b"zip-bytes");
    }

    #[tokio::test]
    async fn test_missing_key_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalArtifactStore::new(temp_dir.path());

        let result = store.get("reports/missing.zip").await;
        assert!(matches!(result, Err(DemoError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalArtifactStore::new(temp_dir.path());

        for key in ["../outside.txt", "/etc/passwd", "reports/../../x", "a\0b", ""] {
            assert!(store.put(key, b"x").await.is_err(), "accepted {:?}", key);
        }
    }
}
