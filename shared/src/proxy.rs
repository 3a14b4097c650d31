use lambda_http::{http::StatusCode, Body, Error, Response};
use lumen_atoms::storage::FileStorage;

/// Serve stored asset bytes through the API (GET /media-file/{filename}).
/// Renditions resolve the same way as originals.
pub async fn proxy_asset(
    storage: &dyn FileStorage,
    filename: &str,
) -> Result<Response<Body>, Error> {
    if filename.is_empty() {
        return not_found();
    }

    match storage.read(filename).await {
        Ok(bytes) => Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", content_type_for(filename))
            .header("Cache-Control", "public, max-age=86400")
            .header("Access-Control-Allow-Origin", "*")
            .body(Body::Binary(bytes))
            .map_err(Box::new)?),
        Err(e) => {
            tracing::warn!("asset proxy miss for {}: {}", filename, e);
            not_found()
        }
    }
}

fn not_found() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(
            serde_json::json!({"error": "Not found"})
                .to_string()
                .into(),
        )
        .map_err(Box::new)?)
}

fn content_type_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .unwrap_or("");
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
