use thiserror::Error;

/// Error taxonomy shared by every atom. The HTTP layer maps variants to
/// status codes; services propagate with `?`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),
}
