use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lumen_atoms::error::StoreError;
use lumen_atoms::storage::{AssetStat, FileStorage};

/// Local filesystem storage: objects live as plain files under a static
/// directory, the way the admin's upload directory works.
#[derive(Debug, Clone)]
pub struct DiskStorage {
    static_dir: PathBuf,
}

impl DiskStorage {
    pub fn new(static_dir: impl Into<PathBuf>) -> Self {
        Self {
            static_dir: static_dir.into(),
        }
    }

    pub async fn ensure_dir(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.static_dir)
            .await
            .map_err(|e| {
                StoreError::Storage(format!(
                    "failed to create {}: {}",
                    self.static_dir.display(),
                    e
                ))
            })
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        // object names are bare filenames; anything path-like is refused
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(StoreError::Storage(format!("unsafe object name: {}", name)));
        }
        Ok(self.static_dir.join(name))
    }
}

#[async_trait]
impl FileStorage for DiskStorage {
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StoreError::Storage(format!("write {}: {}", name, e)))
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(name)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| StoreError::Storage(format!("read {}: {}", name, e)))
    }

    async fn stat(&self, name: &str) -> Result<AssetStat, StoreError> {
        let path = self.path_for(name)?;
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| StoreError::Storage(format!("stat {}: {}", name, e)))?;
        let modified = meta
            .modified()
            .map_err(|e| StoreError::Storage(format!("stat {}: {}", name, e)))?;
        Ok(AssetStat {
            size: meta.len(),
            modified_at: DateTime::<Utc>::from(modified),
        })
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| StoreError::Storage(format!("delete {}: {}", name, e)))
    }

    async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        let path = self.path_for(name)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::Storage(format!("probe {}: {}", name, e)))
    }
}
