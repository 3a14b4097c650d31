use std::sync::Arc;

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use super::index::RecordIndex;
use super::model::{AssetMeta, CreateRecordPayload, MediaRecord, UpdateRecordPayload, UploadFile};
use crate::error::StoreError;
use crate::fields::model::{CallerContext, CollectionConfig};
use crate::fields::service::{check_access, validate_fields, validate_partial};
use crate::storage::{DerivativeGenerator, FileStorage};

/// Per-record write locks. Update and delete for the same id are serialized
/// so a metadata update can never interleave with a concurrent asset replace.
#[derive(Debug, Default)]
pub struct RecordLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RecordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    async fn acquire(&self, record_id: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let cell = self
            .locks
            .entry(record_id.to_string())
            .or_default()
            .clone();
        cell.lock_owned().await
    }
}

/// Create a record, writing the asset bytes first when a file is supplied.
/// An index failure rolls the freshly written asset back.
pub async fn create_record(
    index: &dyn RecordIndex,
    storage: &dyn FileStorage,
    derivatives: &dyn DerivativeGenerator,
    collection: &CollectionConfig,
    ctx: &CallerContext,
    payload: CreateRecordPayload,
) -> Result<MediaRecord, StoreError> {
    check_access(collection.access.create, ctx, "create")?;
    let fields = validate_fields(&collection.fields, &payload.fields)?;

    let asset = match &payload.file {
        Some(file) => Some(write_asset(storage, derivatives, file).await?),
        None => None,
    };

    let now = chrono::Utc::now().to_rfc3339();
    let record = MediaRecord {
        record_id: uuid::Uuid::new_v4().to_string(),
        fields,
        asset,
        created_at: now.clone(),
        updated_at: now,
    };

    if let Err(e) = index.put(&record).await {
        if let Some(asset) = &record.asset {
            remove_asset_bytes(storage, derivatives, &asset.filename).await;
        }
        return Err(e);
    }

    tracing::info!(
        "created record {} in {} (asset: {:?})",
        record.record_id,
        collection.slug,
        record.asset.as_ref().map(|a| a.filename.as_str()),
    );
    Ok(record)
}

/// Fetch a record. Asset size and modification time are refreshed from a
/// live storage stat so callers observe the storage object's truth.
pub async fn get_record(
    index: &dyn RecordIndex,
    storage: &dyn FileStorage,
    collection: &CollectionConfig,
    ctx: &CallerContext,
    record_id: &str,
) -> Result<MediaRecord, StoreError> {
    check_access(collection.access.read, ctx, "read")?;
    let mut record = index
        .get(record_id)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("record {}", record_id)))?;
    refresh_asset(storage, &mut record).await?;
    Ok(record)
}

/// List all records in the collection, oldest first.
pub async fn list_records(
    index: &dyn RecordIndex,
    storage: &dyn FileStorage,
    collection: &CollectionConfig,
    ctx: &CallerContext,
) -> Result<Vec<MediaRecord>, StoreError> {
    check_access(collection.access.read, ctx, "read")?;
    let mut records = index.list().await?;
    for record in &mut records {
        refresh_asset(storage, record).await?;
    }
    Ok(records)
}

/// Update a record. Without a file this is a strictly metadata path: the
/// storage adapter is never invoked and the stored bytes stay bit-identical.
/// With a file, the new bytes are written under a fresh name before the index
/// commit, and the superseded bytes are removed only after it.
pub async fn update_record(
    index: &dyn RecordIndex,
    storage: &dyn FileStorage,
    derivatives: &dyn DerivativeGenerator,
    collection: &CollectionConfig,
    locks: &RecordLocks,
    ctx: &CallerContext,
    record_id: &str,
    payload: UpdateRecordPayload,
) -> Result<MediaRecord, StoreError> {
    check_access(collection.access.update, ctx, "update")?;
    let _guard = locks.acquire(record_id).await;

    let mut record = index
        .get(record_id)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("record {}", record_id)))?;

    let changes = validate_partial(&collection.fields, &payload.fields)?;
    for (name, value) in changes {
        if value.is_null() {
            record.fields.remove(&name);
        } else {
            record.fields.insert(name, value);
        }
    }

    let mut superseded: Option<AssetMeta> = None;
    if let Some(file) = &payload.file {
        let new_asset = write_asset(storage, derivatives, file).await?;
        superseded = record.asset.replace(new_asset);
    }

    record.updated_at = chrono::Utc::now().to_rfc3339();

    if let Err(e) = index.put(&record).await {
        if payload.file.is_some() {
            if let Some(asset) = &record.asset {
                remove_asset_bytes(storage, derivatives, &asset.filename).await;
            }
        }
        return Err(e);
    }

    if let Some(old) = superseded {
        remove_asset_bytes(storage, derivatives, &old.filename).await;
        tracing::info!(
            "record {} asset superseded: {} -> {}",
            record_id,
            old.filename,
            record
                .asset
                .as_ref()
                .map(|a| a.filename.as_str())
                .unwrap_or(""),
        );
    }

    Ok(record)
}

/// Delete a record and its asset bytes. The index entry is removed first and
/// restored if the byte delete fails, so a failed delete stays uncommitted.
pub async fn delete_record(
    index: &dyn RecordIndex,
    storage: &dyn FileStorage,
    derivatives: &dyn DerivativeGenerator,
    collection: &CollectionConfig,
    locks: &RecordLocks,
    ctx: &CallerContext,
    record_id: &str,
) -> Result<(), StoreError> {
    check_access(collection.access.delete, ctx, "delete")?;
    let _guard = locks.acquire(record_id).await;

    let record = index
        .get(record_id)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("record {}", record_id)))?;

    index.delete(record_id).await?;

    if let Some(asset) = &record.asset {
        if let Err(e) = storage.delete(&asset.filename).await {
            if let Err(restore) = index.put(&record).await {
                tracing::error!(
                    "failed to restore record {} after delete error: {}",
                    record_id,
                    restore
                );
            }
            return Err(e);
        }
        derivatives.on_asset_removed(storage, &asset.filename).await;
    }

    tracing::info!("deleted record {} from {}", record_id, collection.slug);
    Ok(())
}

async fn write_asset(
    storage: &dyn FileStorage,
    derivatives: &dyn DerivativeGenerator,
    file: &UploadFile,
) -> Result<AssetMeta, StoreError> {
    let filename = derive_unique_filename(storage, &file.name).await?;
    storage.write(&filename, &file.data).await?;

    let stat = match storage.stat(&filename).await {
        Ok(stat) => stat,
        Err(e) => {
            if let Err(cleanup) = storage.delete(&filename).await {
                tracing::warn!("failed to remove {} after stat error: {}", filename, cleanup);
            }
            return Err(e);
        }
    };

    derivatives
        .on_asset_written(storage, &filename, &file.data)
        .await;

    Ok(AssetMeta {
        filename,
        mime_type: file.mime_type.clone(),
        size: stat.size,
        modified_at: stat.modified_at.to_rfc3339(),
        checksum: sha256_hex(&file.data),
    })
}

async fn remove_asset_bytes(
    storage: &dyn FileStorage,
    derivatives: &dyn DerivativeGenerator,
    filename: &str,
) {
    if let Err(e) = storage.delete(filename).await {
        tracing::warn!("failed to delete asset {}: {}", filename, e);
    }
    derivatives.on_asset_removed(storage, filename).await;
}

async fn refresh_asset(
    storage: &dyn FileStorage,
    record: &mut MediaRecord,
) -> Result<(), StoreError> {
    if let Some(asset) = record.asset.as_mut() {
        let stat = storage.stat(&asset.filename).await?;
        asset.size = stat.size;
        asset.modified_at = stat.modified_at.to_rfc3339();
    }
    Ok(())
}

/// Derive a collision-resistant name from the uploaded file's own, probing
/// the backend and appending `-1`, `-2`, ... until the name is free.
async fn derive_unique_filename(
    storage: &dyn FileStorage,
    original: &str,
) -> Result<String, StoreError> {
    let sanitized = sanitize_filename(original);
    let (stem, ext) = split_name(&sanitized);

    let mut candidate = sanitized.clone();
    let mut attempt = 0u32;
    while storage.exists(&candidate).await? {
        attempt += 1;
        candidate = match ext {
            Some(ext) => format!("{}-{}.{}", stem, attempt, ext),
            None => format!("{}-{}", stem, attempt),
        };
    }
    Ok(candidate)
}

fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '-');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::DateTime;
    use serde_json::json;

    use super::*;
    use crate::fields::model::{AccessConfig, FieldDef};
    use crate::records::index::MemoryIndex;
    use crate::storage::{AssetStat, MemoryStorage, NoDerivatives};

    fn media_collection() -> CollectionConfig {
        CollectionConfig {
            slug: "media".to_string(),
            fields: vec![FieldDef::text("alt")],
            access: AccessConfig::default(),
            upload: Some(Default::default()),
        }
    }

    fn anonymous() -> CallerContext {
        CallerContext::default()
    }

    fn jpeg_upload(name: &str, len: usize) -> UploadFile {
        UploadFile {
            name: name.to_string(),
            mime_type: "image/jpeg".to_string(),
            data: vec![0xAB; len],
        }
    }

    fn alt_fields(value: &str) -> serde_json::Map<String, serde_json::Value> {
        serde_json::from_value(json!({ "alt": value })).unwrap()
    }

    fn parse_ts(ts: &str) -> DateTime<chrono::Utc> {
        DateTime::parse_from_rfc3339(ts).unwrap().into()
    }

    #[tokio::test]
    async fn metadata_update_leaves_asset_untouched() {
        let index = MemoryIndex::new();
        let storage = MemoryStorage::new();
        let locks = RecordLocks::new();
        let collection = media_collection();

        let created = create_record(
            &index,
            &storage,
            &NoDerivatives,
            &collection,
            &anonymous(),
            CreateRecordPayload {
                fields: alt_fields(""),
                file: Some(jpeg_upload("test-image.jpg", 1024)),
            },
        )
        .await
        .unwrap();

        let before = created.asset.clone().unwrap();
        assert_eq!(before.size, 1024);
        let mutations_before = storage.mutation_count();

        let updated = update_record(
            &index,
            &storage,
            &NoDerivatives,
            &collection,
            &locks,
            &anonymous(),
            &created.record_id,
            UpdateRecordPayload {
                fields: alt_fields("Updated alt text"),
                file: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.fields.get("alt"), Some(&json!("Updated alt text")));
        let after = updated.asset.unwrap();
        assert_eq!(after.size, before.size);
        assert_eq!(after.modified_at, before.modified_at);
        assert_eq!(after.checksum, before.checksum);
        assert_eq!(storage.mutation_count(), mutations_before);

        // the storage object itself is untouched
        let stat = storage.stat(&before.filename).await.unwrap();
        assert_eq!(stat.size, 1024);
        assert_eq!(stat.modified_at.to_rfc3339(), before.modified_at);
    }

    #[tokio::test]
    async fn replacing_the_file_supersedes_old_bytes() {
        let index = MemoryIndex::new();
        let storage = MemoryStorage::new();
        let locks = RecordLocks::new();
        let collection = media_collection();

        let created = create_record(
            &index,
            &storage,
            &NoDerivatives,
            &collection,
            &anonymous(),
            CreateRecordPayload {
                fields: alt_fields(""),
                file: Some(jpeg_upload("test-image.jpg", 1024)),
            },
        )
        .await
        .unwrap();
        let before = created.asset.clone().unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let updated = update_record(
            &index,
            &storage,
            &NoDerivatives,
            &collection,
            &locks,
            &anonymous(),
            &created.record_id,
            UpdateRecordPayload {
                fields: Default::default(),
                file: Some(jpeg_upload("test-image.jpg", 2048)),
            },
        )
        .await
        .unwrap();

        let after = updated.asset.unwrap();
        assert_eq!(after.size, 2048);
        assert!(parse_ts(&after.modified_at) > parse_ts(&before.modified_at));
        assert_ne!(after.filename, before.filename);
        assert!(!storage.exists(&before.filename).await.unwrap());
    }

    #[tokio::test]
    async fn create_applies_defaults_and_roundtrips_fields() {
        let index = MemoryIndex::new();
        let storage = MemoryStorage::new();
        let collection = CollectionConfig {
            slug: "media".to_string(),
            fields: vec![
                FieldDef::text("alt").with_default(json!("")),
                FieldDef::number("priority"),
            ],
            access: AccessConfig::default(),
            upload: None,
        };

        let created = create_record(
            &index,
            &storage,
            &NoDerivatives,
            &collection,
            &anonymous(),
            CreateRecordPayload {
                fields: serde_json::from_value(json!({ "priority": 4 })).unwrap(),
                file: None,
            },
        )
        .await
        .unwrap();

        let fetched = get_record(&index, &storage, &collection, &anonymous(), &created.record_id)
            .await
            .unwrap();
        assert_eq!(fetched.fields.get("alt"), Some(&json!("")));
        assert_eq!(fetched.fields.get("priority"), Some(&json!(4)));
        assert!(fetched.asset.is_none());
    }

    #[tokio::test]
    async fn get_after_delete_is_not_found() {
        let index = MemoryIndex::new();
        let storage = MemoryStorage::new();
        let locks = RecordLocks::new();
        let collection = media_collection();

        let created = create_record(
            &index,
            &storage,
            &NoDerivatives,
            &collection,
            &anonymous(),
            CreateRecordPayload {
                fields: alt_fields("x"),
                file: Some(jpeg_upload("gone.jpg", 16)),
            },
        )
        .await
        .unwrap();
        let filename = created.asset.clone().unwrap().filename;

        delete_record(
            &index,
            &storage,
            &NoDerivatives,
            &collection,
            &locks,
            &anonymous(),
            &created.record_id,
        )
        .await
        .unwrap();

        let err = get_record(&index, &storage, &collection, &anonymous(), &created.record_id)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(!storage.exists(&filename).await.unwrap());

        // delete is not idempotent: a second call reports NotFound
        let err = delete_record(
            &index,
            &storage,
            &NoDerivatives,
            &collection,
            &locks,
            &anonymous(),
            &created.record_id,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn colliding_upload_names_get_a_suffix() {
        let index = MemoryIndex::new();
        let storage = MemoryStorage::new();
        let collection = media_collection();

        let mut names = Vec::new();
        for _ in 0..3 {
            let record = create_record(
                &index,
                &storage,
                &NoDerivatives,
                &collection,
                &anonymous(),
                CreateRecordPayload {
                    fields: Default::default(),
                    file: Some(jpeg_upload("photo.jpg", 8)),
                },
            )
            .await
            .unwrap();
            names.push(record.asset.unwrap().filename);
        }
        assert_eq!(names, vec!["photo.jpg", "photo-1.jpg", "photo-2.jpg"]);
    }

    #[tokio::test]
    async fn unsafe_upload_names_are_sanitized() {
        let index = MemoryIndex::new();
        let storage = MemoryStorage::new();
        let collection = media_collection();

        let record = create_record(
            &index,
            &storage,
            &NoDerivatives,
            &collection,
            &anonymous(),
            CreateRecordPayload {
                fields: Default::default(),
                file: Some(UploadFile {
                    name: "../../etc/pass wd.jpg".to_string(),
                    mime_type: "image/jpeg".to_string(),
                    data: vec![1, 2, 3],
                }),
            },
        )
        .await
        .unwrap();

        let filename = record.asset.unwrap().filename;
        assert!(!filename.contains('/'));
        assert!(!filename.starts_with('.'));
        assert_eq!(filename, "pass-wd.jpg");
    }

    struct FailingIndex {
        inner: MemoryIndex,
        fail_puts: AtomicBool,
    }

    #[async_trait]
    impl RecordIndex for FailingIndex {
        async fn put(&self, record: &MediaRecord) -> Result<(), StoreError> {
            if self.fail_puts.load(Ordering::SeqCst) {
                return Err(StoreError::Storage("index unavailable".to_string()));
            }
            self.inner.put(record).await
        }

        async fn get(&self, record_id: &str) -> Result<Option<MediaRecord>, StoreError> {
            self.inner.get(record_id).await
        }

        async fn delete(&self, record_id: &str) -> Result<(), StoreError> {
            self.inner.delete(record_id).await
        }

        async fn list(&self) -> Result<Vec<MediaRecord>, StoreError> {
            self.inner.list().await
        }
    }

    #[tokio::test]
    async fn failed_index_commit_rolls_back_uploaded_bytes() {
        let index = FailingIndex {
            inner: MemoryIndex::new(),
            fail_puts: AtomicBool::new(false),
        };
        let storage = MemoryStorage::new();
        let locks = RecordLocks::new();
        let collection = media_collection();

        let created = create_record(
            &index,
            &storage,
            &NoDerivatives,
            &collection,
            &anonymous(),
            CreateRecordPayload {
                fields: alt_fields("keep"),
                file: Some(jpeg_upload("stable.jpg", 64)),
            },
        )
        .await
        .unwrap();
        let before = created.asset.clone().unwrap();

        index.fail_puts.store(true, Ordering::SeqCst);

        let err = update_record(
            &index,
            &storage,
            &NoDerivatives,
            &collection,
            &locks,
            &anonymous(),
            &created.record_id,
            UpdateRecordPayload {
                fields: alt_fields("lost"),
                file: Some(jpeg_upload("replacement.jpg", 128)),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));

        // old bytes intact, new bytes rolled back, record unchanged
        assert!(storage.exists(&before.filename).await.unwrap());
        assert!(!storage.exists("replacement.jpg").await.unwrap());
        let kept = index.inner.get(&created.record_id).await.unwrap().unwrap();
        assert_eq!(kept.fields.get("alt"), Some(&json!("keep")));
        assert_eq!(kept.asset, Some(before));
    }

    struct StuckStorage {
        inner: MemoryStorage,
        fail_deletes: AtomicBool,
    }

    #[async_trait]
    impl FileStorage for StuckStorage {
        async fn write(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
            self.inner.write(name, bytes).await
        }

        async fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
            self.inner.read(name).await
        }

        async fn stat(&self, name: &str) -> Result<AssetStat, StoreError> {
            self.inner.stat(name).await
        }

        async fn delete(&self, name: &str) -> Result<(), StoreError> {
            if self.fail_deletes.load(Ordering::SeqCst) {
                return Err(StoreError::Storage("delete refused".to_string()));
            }
            self.inner.delete(name).await
        }

        async fn exists(&self, name: &str) -> Result<bool, StoreError> {
            self.inner.exists(name).await
        }
    }

    #[tokio::test]
    async fn failed_byte_delete_restores_the_record() {
        let index = MemoryIndex::new();
        let storage = StuckStorage {
            inner: MemoryStorage::new(),
            fail_deletes: AtomicBool::new(false),
        };
        let locks = RecordLocks::new();
        let collection = media_collection();

        let created = create_record(
            &index,
            &storage,
            &NoDerivatives,
            &collection,
            &anonymous(),
            CreateRecordPayload {
                fields: alt_fields("x"),
                file: Some(jpeg_upload("sticky.jpg", 32)),
            },
        )
        .await
        .unwrap();

        storage.fail_deletes.store(true, Ordering::SeqCst);

        let err = delete_record(
            &index,
            &storage,
            &NoDerivatives,
            &collection,
            &locks,
            &anonymous(),
            &created.record_id,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));

        // operation is uncommitted: record and bytes both still present
        let restored = get_record(&index, &storage, &collection, &anonymous(), &created.record_id)
            .await
            .unwrap();
        assert_eq!(restored.record_id, created.record_id);
        assert!(storage
            .exists(&created.asset.unwrap().filename)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn denied_access_has_no_side_effects() {
        fn nobody(_ctx: &CallerContext) -> bool {
            false
        }

        let index = MemoryIndex::new();
        let storage = MemoryStorage::new();
        let collection = CollectionConfig {
            access: AccessConfig {
                create: nobody,
                ..Default::default()
            },
            ..media_collection()
        };

        let err = create_record(
            &index,
            &storage,
            &NoDerivatives,
            &collection,
            &anonymous(),
            CreateRecordPayload {
                fields: Default::default(),
                file: Some(jpeg_upload("never.jpg", 8)),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StoreError::Forbidden(_)));
        assert_eq!(storage.mutation_count(), 0);
        assert!(index.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_returns_records_oldest_first() {
        let index = MemoryIndex::new();
        let storage = MemoryStorage::new();
        let collection = media_collection();

        for alt in ["first", "second"] {
            create_record(
                &index,
                &storage,
                &NoDerivatives,
                &collection,
                &anonymous(),
                CreateRecordPayload {
                    fields: alt_fields(alt),
                    file: None,
                },
            )
            .await
            .unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let all = list_records(&index, &storage, &collection, &anonymous())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].fields.get("alt"), Some(&json!("first")));
        assert_eq!(all[1].fields.get("alt"), Some(&json!("second")));
    }
}
