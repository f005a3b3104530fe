//! Direct blob upload and retrieval.
//!
//! Upload requires a valid token; the returned url is stable and publicly
//! readable. Blob names are server-generated, so serving them back never
//! touches user-controlled paths.

use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::info;

use murmur_core::defaults;

use crate::{ApiError, AppState, RequireAuth};

/// POST /api/upload — store one file, return `{ "url": ... }`.
pub async fn upload(
    State(state): State<AppState>,
    _auth: RequireAuth,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            let _ = field.bytes().await;
            continue;
        }
        let filename = field.file_name().unwrap_or("upload.bin").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {}", e)))?
            .to_vec();
        if bytes.is_empty() {
            return Err(ApiError::BadRequest("uploaded file is empty".to_string()));
        }

        let url = state.blobs.put(&filename, &bytes).await?;
        info!(blob_url = %url, size_bytes = bytes.len(), "file uploaded");
        return Ok(Json(serde_json::json!({ "url": url })));
    }

    Err(ApiError::BadRequest("missing 'file' field".to_string()))
}

/// GET /uploads/:name — serve a stored blob.
pub async fn serve(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let url = format!("{}{}", defaults::UPLOAD_URL_PREFIX, name);
    let bytes = state.blobs.get(&url).await?;
    let content_type = content_type_for(&name);
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

fn content_type_for(name: &str) -> &'static str {
    match name.rsplit('.').next().unwrap_or("") {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "ogg" => "audio/ogg",
        "webm" => "audio/webm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("a.png"), "image/png");
        assert_eq!(content_type_for("b.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("rec.wav"), "audio/wav");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }
}
