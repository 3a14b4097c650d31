// Re-export model types, the index seam, and service/handler functions
pub mod http;
pub mod index;
pub mod model;
pub mod service;

pub use index::{MemoryIndex, RecordIndex};
pub use model::{AssetMeta, CreateRecordPayload, MediaRecord, UpdateRecordPayload, UploadFile};
pub use service::*;
pub use http::*;
