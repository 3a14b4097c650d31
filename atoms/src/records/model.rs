use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Media record domain model - structured fields plus an optional uploaded
/// asset.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MediaRecord {
    pub record_id: String,
    pub fields: Map<String, Value>,
    pub asset: Option<AssetMeta>,
    pub created_at: String,
    pub updated_at: String,
}

/// Metadata for the file backing a record. `size` and `modified_at` mirror
/// the storage object; reads refresh them from a live stat.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AssetMeta {
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    pub modified_at: String,
    pub checksum: String,
}

/// Raw upload carried by a create or update payload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct CreateRecordPayload {
    pub fields: Map<String, Value>,
    pub file: Option<UploadFile>,
}

#[derive(Debug, Default)]
pub struct UpdateRecordPayload {
    pub fields: Map<String, Value>,
    pub file: Option<UploadFile>,
}
