use std::sync::Arc;

use derivatives_block::ImageDerivatives;
use lumen_atoms::fields::model::CollectionConfig;
use lumen_atoms::records::index::RecordIndex;
use lumen_atoms::records::service::RecordLocks;
use lumen_atoms::storage::{DerivativeGenerator, FileStorage};

use crate::config;
use crate::disk::DiskStorage;
use crate::dynamo::DynamoIndex;
use crate::s3::S3Storage;

/// Shared application state: the wired collaborators for the media store.
pub struct AppState {
    pub index: Arc<dyn RecordIndex>,
    pub storage: Arc<dyn FileStorage>,
    pub derivatives: Arc<dyn DerivativeGenerator>,
    pub collection: CollectionConfig,
    pub locks: RecordLocks,
}

impl AppState {
    /// Wire collaborators from the environment. `MEDIA_STORAGE` selects the
    /// byte backend; records always index through DynamoDB here.
    pub async fn from_env() -> Self {
        let aws_config = aws_config::load_from_env().await;
        let dynamo_client = aws_sdk_dynamodb::Client::new(&aws_config);

        let collection = config::media_collection();
        let sizes = collection
            .upload
            .as_ref()
            .map(|u| u.image_sizes.clone())
            .unwrap_or_default();

        let storage: Arc<dyn FileStorage> = match config::storage_backend().as_str() {
            "disk" => {
                let disk = DiskStorage::new(config::static_dir());
                if let Err(e) = disk.ensure_dir().await {
                    tracing::warn!("static dir unavailable: {}", e);
                }
                Arc::new(disk)
            }
            _ => {
                let s3_client = aws_sdk_s3::Client::new(&aws_config);
                Arc::new(S3Storage::new(s3_client, &config::bucket_name(), "media"))
            }
        };

        Self {
            index: Arc::new(DynamoIndex::new(dynamo_client, &config::table_name())),
            storage,
            derivatives: Arc::new(ImageDerivatives::new(sizes)),
            collection,
            locks: RecordLocks::new(),
        }
    }
}
