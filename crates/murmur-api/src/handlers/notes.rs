//! Note CRUD handlers.
//!
//! Create and update consume multipart bodies: scalar fields arrive as text
//! parts, media as file parts. Repeated `image` parts pair positionally with
//! repeated `caption` parts. On update, the `existingImages` part carries the
//! ordered JSON list of surviving already-persisted images; its absence means
//! the existing list is untouched.

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::{debug, warn};
use uuid::Uuid;

use murmur_core::{Note, NoteImage};
use murmur_media::{NewImage, StagedAudio};

use crate::services::{CreateNote, UpdateNote};
use crate::{ApiError, AppState, RequireAuth};

fn bad_multipart(err: MultipartError) -> ApiError {
    ApiError::BadRequest(format!("malformed multipart body: {}", err))
}

fn parse_bool(raw: &str) -> Result<bool, ApiError> {
    match raw.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(ApiError::BadRequest(format!(
            "expected boolean, got '{}'",
            other
        ))),
    }
}

/// Pair repeated caption parts with image parts by position. Extra captions
/// are dropped; missing ones leave the caption empty.
fn apply_captions(images: &mut [NewImage], captions: Vec<String>) {
    for (image, caption) in images.iter_mut().zip(captions) {
        image.caption = caption;
    }
}

/// GET /api/notes — all of the caller's notes, newest first.
pub async fn list(
    State(state): State<AppState>,
    auth: RequireAuth,
) -> Result<Json<Vec<Note>>, ApiError> {
    let notes = state.service.list(auth.owner_id).await?;
    Ok(Json(notes))
}

/// GET /api/notes/favourites — favorite subset, same ordering.
pub async fn favourites(
    State(state): State<AppState>,
    auth: RequireAuth,
) -> Result<Json<Vec<Note>>, ApiError> {
    let notes = state.service.list_favorites(auth.owner_id).await?;
    Ok(Json(notes))
}

/// POST /api/notes — create a note from a multipart form.
pub async fn create(
    State(state): State<AppState>,
    auth: RequireAuth,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Note>), ApiError> {
    let mut title = String::new();
    let mut content = String::new();
    let mut duration: Option<String> = None;
    let mut audio_bytes: Option<Vec<u8>> = None;
    let mut audio_mime: Option<String> = None;
    let mut images: Vec<NewImage> = Vec::new();
    let mut captions: Vec<String> = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "title" => title = field.text().await.map_err(bad_multipart)?,
            "content" => content = field.text().await.map_err(bad_multipart)?,
            // The flag is derived from the audio part itself; accepted for
            // wire compatibility.
            "isAudio" => {
                let _ = field.text().await.map_err(bad_multipart)?;
            }
            "duration" => duration = Some(field.text().await.map_err(bad_multipart)?),
            "audio" => {
                audio_mime = field.content_type().map(str::to_string);
                audio_bytes = Some(field.bytes().await.map_err(bad_multipart)?.to_vec());
            }
            "image" => {
                let filename = field.file_name().unwrap_or("image.png").to_string();
                let bytes = field.bytes().await.map_err(bad_multipart)?.to_vec();
                images.push(NewImage {
                    bytes,
                    filename,
                    caption: String::new(),
                });
            }
            "caption" => captions.push(field.text().await.map_err(bad_multipart)?),
            other => {
                debug!(field = other, "ignoring unknown multipart field");
                let _ = field.bytes().await;
            }
        }
    }
    apply_captions(&mut images, captions);

    let audio = audio_bytes
        .filter(|bytes| !bytes.is_empty())
        .map(|bytes| StagedAudio {
            bytes,
            duration: duration.unwrap_or_else(|| "00:00".to_string()),
        });

    // When dictation produced nothing client-side, fill the content from the
    // batch speech backend if one is configured. A backend failure is soft:
    // the note is saved with an empty transcript.
    if content.trim().is_empty() {
        if let (Some(engine), Some(staged)) = (&state.speech, &audio) {
            match engine
                .transcribe(&staged.bytes, audio_mime.as_deref().unwrap_or("audio/wav"))
                .await
            {
                Ok(text) => content = text,
                Err(e) => warn!(error = %e, "server-side transcription failed"),
            }
        }
    }

    let note = state
        .service
        .create(
            auth.owner_id,
            CreateNote {
                title,
                content,
                audio,
                images,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(note)))
}

/// PATCH /api/notes/:id — partial update from a multipart form.
pub async fn update(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<Note>, ApiError> {
    let mut req = UpdateNote::default();
    let mut duration: Option<String> = None;
    let mut audio_bytes: Option<Vec<u8>> = None;
    let mut captions: Vec<String> = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "title" => req.title = Some(field.text().await.map_err(bad_multipart)?),
            "content" => req.content = Some(field.text().await.map_err(bad_multipart)?),
            "isFavorite" => {
                let raw = field.text().await.map_err(bad_multipart)?;
                req.is_favorite = Some(parse_bool(&raw)?);
            }
            "existingImages" => {
                let raw = field.text().await.map_err(bad_multipart)?;
                let survivors: Vec<NoteImage> = serde_json::from_str(&raw).map_err(|e| {
                    ApiError::BadRequest(format!("invalid existingImages: {}", e))
                })?;
                req.existing_images = Some(survivors);
            }
            "duration" => duration = Some(field.text().await.map_err(bad_multipart)?),
            "audio" => {
                audio_bytes = Some(field.bytes().await.map_err(bad_multipart)?.to_vec());
            }
            "image" => {
                let filename = field.file_name().unwrap_or("image.png").to_string();
                let bytes = field.bytes().await.map_err(bad_multipart)?.to_vec();
                req.new_images.push(NewImage {
                    bytes,
                    filename,
                    caption: String::new(),
                });
            }
            "caption" => captions.push(field.text().await.map_err(bad_multipart)?),
            other => {
                debug!(field = other, "ignoring unknown multipart field");
                let _ = field.bytes().await;
            }
        }
    }
    apply_captions(&mut req.new_images, captions);

    req.audio = audio_bytes
        .filter(|bytes| !bytes.is_empty())
        .map(|bytes| StagedAudio {
            bytes,
            duration: duration.unwrap_or_else(|| "00:00".to_string()),
        });

    let note = state.service.update(id, auth.owner_id, req).await?;
    Ok(Json(note))
}

/// POST /api/notes/:id/favourite — flip the favorite flag.
pub async fn toggle_favourite(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<Note>, ApiError> {
    let note = state.service.toggle_favorite(id, auth.owner_id).await?;
    Ok(Json(note))
}

/// DELETE /api/notes/:id.
pub async fn delete(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.service.delete(id, auth.owner_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
