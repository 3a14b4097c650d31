use std::env;

use derivatives_block::default_image_sizes;
use lumen_atoms::fields::model::{AccessConfig, CollectionConfig, FieldDef, UploadConfig};

/// The media collection: a single optional `alt` text field, anonymous
/// create/read access, and image renditions on upload.
pub fn media_collection() -> CollectionConfig {
    CollectionConfig {
        slug: "media".to_string(),
        fields: vec![FieldDef::text("alt")],
        access: AccessConfig::default(),
        upload: Some(UploadConfig {
            image_sizes: default_image_sizes(),
        }),
    }
}

pub fn table_name() -> String {
    env::var("MEDIA_TABLE_NAME").unwrap_or_else(|_| "lumen".to_string())
}

pub fn bucket_name() -> String {
    env::var("S3_BUCKET_NAME").unwrap_or_else(|_| "lumen-media".to_string())
}

pub fn static_dir() -> String {
    env::var("MEDIA_STATIC_DIR").unwrap_or_else(|_| "media".to_string())
}

/// Which byte backend to wire: "s3" (default) or "disk".
pub fn storage_backend() -> String {
    env::var("MEDIA_STORAGE").unwrap_or_else(|_| "s3".to_string())
}
