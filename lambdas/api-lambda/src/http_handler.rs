use std::sync::Arc;

use lambda_http::http::header::{HeaderValue, VARY};
use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, Response,
};
use lumen_atoms as atoms;
use lumen_atoms::fields::model::CallerContext;
use lumen_shared::{proxy, AppState};

fn with_cors_headers(mut resp: Response<Body>, request_origin: Option<&str>) -> Response<Body> {
    let headers = resp.headers_mut();
    match request_origin.and_then(|o| HeaderValue::from_str(o).ok()) {
        Some(origin) => {
            headers.insert("Access-Control-Allow-Origin", origin);
            headers.append(VARY, HeaderValue::from_static("Origin"));
        }
        None => {
            headers.insert(
                "Access-Control-Allow-Origin",
                HeaderValue::from_static("*"),
            );
        }
    }
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET,POST,PATCH,DELETE,OPTIONS"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type,X-User-Id"),
    );
    resp
}

fn finalize_response(
    resp: Result<Response<Body>, Error>,
    request_origin: Option<&str>,
) -> Result<Response<Body>, Error> {
    resp.map(|r| with_cors_headers(r, request_origin))
}

fn caller_context(event: &Request) -> CallerContext {
    CallerContext {
        user_id: event
            .headers()
            .get("X-User-Id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string()),
    }
}

/// Main Lambda handler - routes requests to the media store endpoints
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let method = event.method();
    let path = event.uri().path();
    let body = event.body();
    let request_origin = event.headers().get("Origin").and_then(|v| v.to_str().ok());
    tracing::info!("🚀 API Lambda invoked - Method: {} Path: {}", method, path);

    // Handle CORS preflight
    if method == "OPTIONS" {
        let resp = Response::builder()
            .status(StatusCode::OK)
            .body(Body::Empty)
            .map_err(Box::new)?;
        return Ok(with_cors_headers(resp, request_origin));
    }

    // Asset proxy route (public - serves stored bytes and renditions)
    if path.starts_with("/media-file/") {
        let filename = path.strip_prefix("/media-file/").unwrap_or("");
        return finalize_response(
            proxy::proxy_asset(state.storage.as_ref(), filename).await,
            request_origin,
        );
    }

    // Media record routes
    if path.starts_with("/media") {
        let ctx = caller_context(&event);
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let resp = match (method, parts.as_slice()) {
            // POST /media - create record (optional file part)
            (&Method::POST, ["media"]) => {
                atoms::records::create_record_handler(
                    state.index.as_ref(),
                    state.storage.as_ref(),
                    state.derivatives.as_ref(),
                    &state.collection,
                    &ctx,
                    body,
                )
                .await
            }
            // GET /media - list records
            (&Method::GET, ["media"]) => {
                atoms::records::list_records_handler(
                    state.index.as_ref(),
                    state.storage.as_ref(),
                    &state.collection,
                    &ctx,
                )
                .await
            }
            // GET /media/{id} - get record
            (&Method::GET, ["media", record_id]) => {
                atoms::records::get_record_handler(
                    state.index.as_ref(),
                    state.storage.as_ref(),
                    &state.collection,
                    &ctx,
                    record_id,
                )
                .await
            }
            // PATCH /media/{id} - update record (metadata-only unless a file
            // part is supplied)
            (&Method::PATCH, ["media", record_id]) => {
                atoms::records::update_record_handler(
                    state.index.as_ref(),
                    state.storage.as_ref(),
                    state.derivatives.as_ref(),
                    &state.collection,
                    &state.locks,
                    &ctx,
                    record_id,
                    body,
                )
                .await
            }
            // DELETE /media/{id} - delete record and asset bytes
            (&Method::DELETE, ["media", record_id]) => {
                atoms::records::delete_record_handler(
                    state.index.as_ref(),
                    state.storage.as_ref(),
                    state.derivatives.as_ref(),
                    &state.collection,
                    &state.locks,
                    &ctx,
                    record_id,
                )
                .await
            }
            _ => not_found(),
        };

        return finalize_response(resp, request_origin);
    }

    // No matching route
    tracing::warn!("⚠️ No route matched - Method: {} Path: {}", method, path);
    finalize_response(not_found(), request_origin)
}

fn not_found() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::json!({"error": "Not found"}).to_string().into())
        .map_err(Box::new)?)
}
