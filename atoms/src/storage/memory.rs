use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{AssetStat, FileStorage};
use crate::error::StoreError;

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    modified_at: DateTime<Utc>,
}

/// In-memory storage backend for embedding and tests. Counts byte-level
/// mutations so callers can assert an operation performed zero writes.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, StoredObject>>,
    mutations: AtomicU64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of write/delete calls the backend has served.
    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileStorage for MemoryStorage {
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let mut objects = lock(&self.objects)?;
        objects.insert(
            name.to_string(),
            StoredObject {
                bytes: bytes.to_vec(),
                modified_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let objects = lock(&self.objects)?;
        objects
            .get(name)
            .map(|o| o.bytes.clone())
            .ok_or_else(|| StoreError::Storage(format!("no such object: {}", name)))
    }

    async fn stat(&self, name: &str) -> Result<AssetStat, StoreError> {
        let objects = lock(&self.objects)?;
        objects
            .get(name)
            .map(|o| AssetStat {
                size: o.bytes.len() as u64,
                modified_at: o.modified_at,
            })
            .ok_or_else(|| StoreError::Storage(format!("no such object: {}", name)))
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let mut objects = lock(&self.objects)?;
        objects
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::Storage(format!("no such object: {}", name)))
    }

    async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        let objects = lock(&self.objects)?;
        Ok(objects.contains_key(name))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::Storage("storage mutex poisoned".to_string()))
}
