pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;

pub use memory::MemoryStorage;

/// Point-in-time view of a stored object as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssetStat {
    pub size: u64,
    pub modified_at: DateTime<Utc>,
}

/// File storage adapter. Objects are addressed by their generated filename;
/// backends map names to whatever location scheme they use.
#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError>;

    async fn read(&self, name: &str) -> Result<Vec<u8>, StoreError>;

    async fn stat(&self, name: &str) -> Result<AssetStat, StoreError>;

    async fn delete(&self, name: &str) -> Result<(), StoreError>;

    async fn exists(&self, name: &str) -> Result<bool, StoreError>;
}

/// Hook for derived renditions. Invoked only on asset-write paths; a
/// metadata-only record update never reaches this trait.
#[async_trait]
pub trait DerivativeGenerator: Send + Sync {
    async fn on_asset_written(&self, storage: &dyn FileStorage, filename: &str, bytes: &[u8]);

    async fn on_asset_removed(&self, storage: &dyn FileStorage, filename: &str);
}

/// Used where no rendition pipeline is wired.
#[derive(Debug, Default)]
pub struct NoDerivatives;

#[async_trait]
impl DerivativeGenerator for NoDerivatives {
    async fn on_asset_written(&self, _storage: &dyn FileStorage, _filename: &str, _bytes: &[u8]) {}

    async fn on_asset_removed(&self, _storage: &dyn FileStorage, _filename: &str) {}
}
