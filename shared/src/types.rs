// ========== RECORDS ==========
pub use lumen_atoms::records::model::{
    AssetMeta, CreateRecordPayload, MediaRecord, UpdateRecordPayload, UploadFile,
};

// ========== COLLECTION ==========
pub use lumen_atoms::fields::model::{
    AccessConfig, CallerContext, CollectionConfig, FieldDef, FieldType, ImageSize, UploadConfig,
};
