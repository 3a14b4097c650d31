// Re-export model types and service functions
pub mod model;
pub mod service;

pub use model::{
    AccessConfig, CallerContext, CollectionConfig, FieldDef, FieldType, ImageSize, UploadConfig,
};
pub use service::*;
