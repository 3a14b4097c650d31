use base64::Engine;
use lambda_http::{http::StatusCode, Body, Error as LambdaError, Response};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::index::RecordIndex;
use super::model::{CreateRecordPayload, UpdateRecordPayload, UploadFile};
use super::service::{
    create_record, delete_record, get_record, list_records, update_record, RecordLocks,
};
use crate::error::StoreError;
use crate::fields::model::{CallerContext, CollectionConfig};
use crate::storage::{DerivativeGenerator, FileStorage};

/// Wire shape of the optional file part: raw bytes travel base64-encoded.
#[derive(Debug, Deserialize)]
struct FilePart {
    name: String,
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct RecordBody {
    #[serde(default)]
    fields: Map<String, Value>,
    file: Option<FilePart>,
}

fn decode_file(part: FilePart) -> Result<UploadFile, StoreError> {
    let data = base64::engine::general_purpose::STANDARD
        .decode(part.data.as_bytes())
        .map_err(|e| StoreError::Validation(format!("file data is not valid base64: {}", e)))?;
    Ok(UploadFile {
        name: part.name,
        mime_type: part.mime_type,
        data,
    })
}

fn parse_body(body: &[u8]) -> Result<(Map<String, Value>, Option<UploadFile>), StoreError> {
    let parsed: RecordBody = serde_json::from_slice(body)
        .map_err(|e| StoreError::Validation(format!("invalid request body: {}", e)))?;
    let file = match parsed.file {
        Some(part) => Some(decode_file(part)?),
        None => None,
    };
    Ok((parsed.fields, file))
}

/// HTTP Handler: POST /media
pub async fn create_record_handler(
    index: &dyn RecordIndex,
    storage: &dyn FileStorage,
    derivatives: &dyn DerivativeGenerator,
    collection: &CollectionConfig,
    ctx: &CallerContext,
    body: &[u8],
) -> Result<Response<Body>, LambdaError> {
    let (fields, file) = match parse_body(body) {
        Ok(parts) => parts,
        Err(e) => return error_response(e),
    };

    match create_record(
        index,
        storage,
        derivatives,
        collection,
        ctx,
        CreateRecordPayload { fields, file },
    )
    .await
    {
        Ok(record) => Ok(Response::builder()
            .status(StatusCode::CREATED)
            .header("Content-Type", "application/json")
            .header("Access-Control-Allow-Origin", "*")
            .body(serde_json::to_string(&record)?.into())
            .map_err(Box::new)?),
        Err(e) => error_response(e),
    }
}

/// HTTP Handler: GET /media/{id}
pub async fn get_record_handler(
    index: &dyn RecordIndex,
    storage: &dyn FileStorage,
    collection: &CollectionConfig,
    ctx: &CallerContext,
    record_id: &str,
) -> Result<Response<Body>, LambdaError> {
    match get_record(index, storage, collection, ctx, record_id).await {
        Ok(record) => Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "application/json")
            .header("Access-Control-Allow-Origin", "*")
            .body(serde_json::to_string(&record)?.into())
            .map_err(Box::new)?),
        Err(e) => error_response(e),
    }
}

/// HTTP Handler: GET /media
pub async fn list_records_handler(
    index: &dyn RecordIndex,
    storage: &dyn FileStorage,
    collection: &CollectionConfig,
    ctx: &CallerContext,
) -> Result<Response<Body>, LambdaError> {
    match list_records(index, storage, collection, ctx).await {
        Ok(records) => Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "application/json")
            .header("Access-Control-Allow-Origin", "*")
            .body(serde_json::to_string(&records)?.into())
            .map_err(Box::new)?),
        Err(e) => error_response(e),
    }
}

/// HTTP Handler: PATCH /media/{id}
pub async fn update_record_handler(
    index: &dyn RecordIndex,
    storage: &dyn FileStorage,
    derivatives: &dyn DerivativeGenerator,
    collection: &CollectionConfig,
    locks: &RecordLocks,
    ctx: &CallerContext,
    record_id: &str,
    body: &[u8],
) -> Result<Response<Body>, LambdaError> {
    let (fields, file) = match parse_body(body) {
        Ok(parts) => parts,
        Err(e) => return error_response(e),
    };

    match update_record(
        index,
        storage,
        derivatives,
        collection,
        locks,
        ctx,
        record_id,
        UpdateRecordPayload { fields, file },
    )
    .await
    {
        Ok(record) => Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "application/json")
            .header("Access-Control-Allow-Origin", "*")
            .body(serde_json::to_string(&record)?.into())
            .map_err(Box::new)?),
        Err(e) => error_response(e),
    }
}

/// HTTP Handler: DELETE /media/{id}
pub async fn delete_record_handler(
    index: &dyn RecordIndex,
    storage: &dyn FileStorage,
    derivatives: &dyn DerivativeGenerator,
    collection: &CollectionConfig,
    locks: &RecordLocks,
    ctx: &CallerContext,
    record_id: &str,
) -> Result<Response<Body>, LambdaError> {
    match delete_record(index, storage, derivatives, collection, locks, ctx, record_id).await {
        Ok(()) => Ok(Response::builder()
            .status(StatusCode::NO_CONTENT)
            .header("Access-Control-Allow-Origin", "*")
            .body(Body::Empty)
            .map_err(Box::new)?),
        Err(e) => error_response(e),
    }
}

fn error_response(err: StoreError) -> Result<Response<Body>, LambdaError> {
    let status = match &err {
        StoreError::Validation(_) => StatusCode::BAD_REQUEST,
        StoreError::Forbidden(_) => StatusCode::FORBIDDEN,
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("record operation failed: {}", err);
    }
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(
            serde_json::json!({"error": err.to_string()})
                .to_string()
                .into(),
        )
        .map_err(Box::new)?)
}
