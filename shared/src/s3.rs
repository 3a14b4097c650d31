use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use chrono::{DateTime, Utc};
use lumen_atoms::error::StoreError;
use lumen_atoms::storage::{AssetStat, FileStorage};

/// S3-backed storage. Objects live under `{prefix}/{name}` in one bucket;
/// `stat` is served from `head_object`.
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: S3Client,
    bucket: String,
    prefix: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: &str, prefix: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            prefix: prefix.trim_matches('/').to_string(),
        }
    }

    fn key_for(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.prefix, name)
        }
    }
}

#[async_trait]
impl FileStorage for S3Storage {
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.key_for(name))
            .body(ByteStream::from(bytes.to_vec()))
            .send()
            .await
            .map_err(|e| StoreError::Storage(format!("S3 put_object error: {}", e)))?;
        Ok(())
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.key_for(name))
            .send()
            .await
            .map_err(|e| StoreError::Storage(format!("S3 get_object error: {}", e)))?;
        let bytes = object
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Storage(format!("S3 body read error: {}", e)))?;
        Ok(bytes.to_vec())
    }

    async fn stat(&self, name: &str) -> Result<AssetStat, StoreError> {
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(self.key_for(name))
            .send()
            .await
            .map_err(|e| StoreError::Storage(format!("S3 head_object error: {}", e)))?;

        let size = head.content_length().unwrap_or(0).max(0) as u64;
        let modified_at = head
            .last_modified()
            .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
            .unwrap_or_else(Utc::now);
        Ok(AssetStat { size, modified_at })
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.key_for(name))
            .send()
            .await
            .map_err(|e| StoreError::Storage(format!("S3 delete_object error: {}", e)))?;
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(self.key_for(name))
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                let service = err.into_service_error();
                if service.is_not_found() {
                    Ok(false)
                } else {
                    Err(StoreError::Storage(format!(
                        "S3 head_object error: {}",
                        service
                    )))
                }
            }
        }
    }
}
