use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::model::MediaRecord;
use crate::error::StoreError;

/// Record metadata persistence. Each call applies atomically for a single
/// record id; cross-call serialization is the service's job.
#[async_trait]
pub trait RecordIndex: Send + Sync {
    async fn put(&self, record: &MediaRecord) -> Result<(), StoreError>;

    async fn get(&self, record_id: &str) -> Result<Option<MediaRecord>, StoreError>;

    async fn delete(&self, record_id: &str) -> Result<(), StoreError>;

    async fn list(&self) -> Result<Vec<MediaRecord>, StoreError>;
}

/// In-memory index for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    records: Mutex<HashMap<String, MediaRecord>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordIndex for MemoryIndex {
    async fn put(&self, record: &MediaRecord) -> Result<(), StoreError> {
        let mut records = lock(&self.records)?;
        records.insert(record.record_id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, record_id: &str) -> Result<Option<MediaRecord>, StoreError> {
        let records = lock(&self.records)?;
        Ok(records.get(record_id).cloned())
    }

    async fn delete(&self, record_id: &str) -> Result<(), StoreError> {
        let mut records = lock(&self.records)?;
        records.remove(record_id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<MediaRecord>, StoreError> {
        let records = lock(&self.records)?;
        let mut all: Vec<MediaRecord> = records.values().cloned().collect();
        all.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.record_id.cmp(&b.record_id))
        });
        Ok(all)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::Storage("index mutex poisoned".to_string()))
}
