use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Scalar field kinds a collection can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Checkbox,
}

/// One declared field of a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub default: Option<Value>,
}

impl FieldDef {
    pub fn text(name: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: FieldType::Text,
            required: false,
            default: None,
        }
    }

    pub fn number(name: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: FieldType::Number,
            required: false,
            default: None,
        }
    }

    pub fn checkbox(name: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: FieldType::Checkbox,
            required: false,
            default: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// Who is calling. Filled by the router from request headers.
#[derive(Debug, Clone, Default)]
pub struct CallerContext {
    pub user_id: Option<String>,
}

/// Access predicates are pure functions over the caller context.
pub type AccessFn = fn(&CallerContext) -> bool;

pub fn allow_anyone(_ctx: &CallerContext) -> bool {
    true
}

pub fn require_user(ctx: &CallerContext) -> bool {
    ctx.user_id.is_some()
}

/// Per-operation access policy of a collection.
#[derive(Debug, Clone, Copy)]
pub struct AccessConfig {
    pub create: AccessFn,
    pub read: AccessFn,
    pub update: AccessFn,
    pub delete: AccessFn,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            create: allow_anyone,
            read: allow_anyone,
            update: allow_anyone,
            delete: allow_anyone,
        }
    }
}

/// A named rendition size for uploaded images.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSize {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

/// Upload behavior of a collection.
#[derive(Debug, Clone, Default)]
pub struct UploadConfig {
    pub image_sizes: Vec<ImageSize>,
}

/// Declarative collection configuration: fields, access, upload behavior.
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    pub slug: String,
    pub fields: Vec<FieldDef>,
    pub access: AccessConfig,
    pub upload: Option<UploadConfig>,
}
