use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use lumen_atoms::error::StoreError;
use lumen_atoms::records::index::RecordIndex;
use lumen_atoms::records::model::{AssetMeta, MediaRecord};

/// DynamoDB-backed record index. Single-table layout with
/// PK = SK = "MEDIA#{record_id}"; the field map is stored as one JSON
/// document attribute.
#[derive(Debug, Clone)]
pub struct DynamoIndex {
    client: DynamoClient,
    table_name: String,
}

impl DynamoIndex {
    pub fn new(client: DynamoClient, table_name: &str) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
        }
    }

    fn pk(record_id: &str) -> String {
        format!("MEDIA#{}", record_id)
    }
}

#[async_trait]
impl RecordIndex for DynamoIndex {
    async fn put(&self, record: &MediaRecord) -> Result<(), StoreError> {
        let pk = Self::pk(&record.record_id);
        let fields_json = serde_json::to_string(&record.fields)
            .map_err(|e| StoreError::Storage(format!("failed to serialize fields: {}", e)))?;

        let mut builder = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .item("PK", AttributeValue::S(pk.clone()))
            .item("SK", AttributeValue::S(pk))
            .item("fields", AttributeValue::S(fields_json))
            .item("created_at", AttributeValue::S(record.created_at.clone()))
            .item("updated_at", AttributeValue::S(record.updated_at.clone()));

        if let Some(asset) = &record.asset {
            builder = builder
                .item("asset_filename", AttributeValue::S(asset.filename.clone()))
                .item(
                    "asset_mime_type",
                    AttributeValue::S(asset.mime_type.clone()),
                )
                .item("asset_size", AttributeValue::N(asset.size.to_string()))
                .item(
                    "asset_modified_at",
                    AttributeValue::S(asset.modified_at.clone()),
                )
                .item("asset_checksum", AttributeValue::S(asset.checksum.clone()));
        }

        builder
            .send()
            .await
            .map_err(|e| StoreError::Storage(format!("DynamoDB put_item error: {}", e)))?;
        Ok(())
    }

    async fn get(&self, record_id: &str) -> Result<Option<MediaRecord>, StoreError> {
        let pk = Self::pk(record_id);
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(pk.clone()))
            .key("SK", AttributeValue::S(pk))
            .send()
            .await
            .map_err(|e| StoreError::Storage(format!("DynamoDB get_item error: {}", e)))?;

        Ok(result
            .item()
            .map(|item| record_from_item(record_id, item)))
    }

    async fn delete(&self, record_id: &str) -> Result<(), StoreError> {
        let pk = Self::pk(record_id);
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(pk.clone()))
            .key("SK", AttributeValue::S(pk))
            .send()
            .await
            .map_err(|e| StoreError::Storage(format!("DynamoDB delete_item error: {}", e)))?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<MediaRecord>, StoreError> {
        let result = self
            .client
            .scan()
            .table_name(&self.table_name)
            .filter_expression("begins_with(PK, :prefix)")
            .expression_attribute_values(":prefix", AttributeValue::S("MEDIA#".to_string()))
            .send()
            .await
            .map_err(|e| StoreError::Storage(format!("DynamoDB scan error: {}", e)))?;

        let mut records = Vec::new();
        for item in result.items() {
            if let Some(record_id) = item
                .get("PK")
                .and_then(|v| v.as_s().ok())
                .and_then(|s| s.strip_prefix("MEDIA#"))
            {
                records.push(record_from_item(record_id, item));
            }
        }
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.record_id.cmp(&b.record_id))
        });
        Ok(records)
    }
}

fn record_from_item(record_id: &str, item: &HashMap<String, AttributeValue>) -> MediaRecord {
    let fields = item
        .get("fields")
        .and_then(|v| v.as_s().ok())
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default();

    let asset = item
        .get("asset_filename")
        .and_then(|v| v.as_s().ok())
        .map(|filename| AssetMeta {
            filename: filename.to_string(),
            mime_type: item
                .get("asset_mime_type")
                .and_then(|v| v.as_s().ok())
                .map(|s| s.to_string())
                .unwrap_or_default(),
            size: item
                .get("asset_size")
                .and_then(|v| v.as_n().ok())
                .and_then(|n| n.parse().ok())
                .unwrap_or(0),
            modified_at: item
                .get("asset_modified_at")
                .and_then(|v| v.as_s().ok())
                .map(|s| s.to_string())
                .unwrap_or_default(),
            checksum: item
                .get("asset_checksum")
                .and_then(|v| v.as_s().ok())
                .map(|s| s.to_string())
                .unwrap_or_default(),
        });

    MediaRecord {
        record_id: record_id.to_string(),
        fields,
        asset,
        created_at: item
            .get("created_at")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string())
            .unwrap_or_default(),
        updated_at: item
            .get("updated_at")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string())
            .unwrap_or_default(),
    }
}
