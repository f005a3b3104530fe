//! # murmur-api
//!
//! The HTTP server for murmur: axum router, authentication extractor,
//! error-to-status mapping, and the note service sitting between handlers
//! and the store traits.
//!
//! `main.rs` wires this up against PostgreSQL and filesystem blob storage;
//! tests build the same router over in-memory stores via
//! [`AppState::in_memory`].

pub mod handlers;
pub mod services;

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use murmur_core::{defaults, BlobStore, CredentialStore, NoteStore};
use murmur_media::HttpSpeechEngine;
use murmur_store::{MemoryBlobStore, MemoryCredentialStore, MemoryNoteStore};

use services::NoteService;

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// Shared server state. Store boundaries are trait objects so tests can
/// inject in-memory implementations.
#[derive(Clone)]
pub struct AppState {
    pub service: NoteService,
    pub blobs: Arc<dyn BlobStore>,
    pub credentials: Arc<dyn CredentialStore>,
    /// Batch speech backend for server-side transcription; `None` disables it.
    pub speech: Option<Arc<HttpSpeechEngine>>,
}

impl AppState {
    pub fn new(
        notes: Arc<dyn NoteStore>,
        blobs: Arc<dyn BlobStore>,
        credentials: Arc<dyn CredentialStore>,
        speech: Option<Arc<HttpSpeechEngine>>,
    ) -> Self {
        Self {
            service: NoteService::new(notes, blobs.clone()),
            blobs,
            credentials,
            speech,
        }
    }

    /// Fully in-memory state, used by tests and `--memory` mode.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryNoteStore::new()),
            Arc::new(MemoryBlobStore::new()),
            Arc::new(MemoryCredentialStore::new()),
            None,
        )
    }
}

// =============================================================================
// REQUEST CORRELATION
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
///
/// UUIDv7 embeds a Unix timestamp, so IDs sort chronologically in log
/// aggregation.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// AUTHENTICATION
// =============================================================================

/// Extractor that requires a valid bearer token.
///
/// A missing header, malformed token, or expired token all reject with the
/// same 401; the server never tells a caller which case it hit.
#[derive(Debug, Clone)]
pub struct RequireAuth {
    pub owner_id: Uuid,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
            Some(t) => t.trim(),
            None => {
                return Err(ApiError::Unauthorized(
                    "Authentication required".to_string(),
                ))
            }
        };

        let owner_id = state.credentials.verify(token).await?;
        Ok(RequireAuth { owner_id })
    }
}

// =============================================================================
// ERROR HANDLING
// =============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Internal(murmur_core::Error),
}

impl From<murmur_core::Error> for ApiError {
    fn from(err: murmur_core::Error) -> Self {
        match err {
            murmur_core::Error::Validation(msg) => ApiError::BadRequest(msg),
            murmur_core::Error::Unauthorized(msg) => ApiError::Unauthorized(msg),
            murmur_core::Error::NotFound(msg) => ApiError::NotFound(msg),
            other => ApiError::Internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

// =============================================================================
// ROUTER
// =============================================================================

fn parse_allowed_origins() -> Vec<HeaderValue> {
    let origins_str = std::env::var("ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000,http://localhost:8081".to_string());

    origins_str
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<HeaderValue>().ok()
        })
        .collect()
}

/// Build the full application router over the given state.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/auth/signup", post(handlers::auth::signup))
        .route("/api/auth/signin", post(handlers::auth::signin))
        .route(
            "/api/notes",
            get(handlers::notes::list).post(handlers::notes::create),
        )
        .route("/api/notes/favourites", get(handlers::notes::favourites))
        .route(
            "/api/notes/:id",
            patch(handlers::notes::update).delete(handlers::notes::delete),
        )
        .route(
            "/api/notes/:id/favourite",
            post(handlers::notes::toggle_favourite),
        )
        .route("/api/upload", post(handlers::uploads::upload))
        .route("/uploads/:name", get(handlers::uploads::serve))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(parse_allowed_origins()))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
                .max_age(std::time::Duration::from_secs(3600)),
        )
        // Body limit sized for the largest audio upload.
        .layer(DefaultBodyLimit::max(defaults::MAX_UPLOAD_BYTES))
        .layer(RequestBodyLimitLayer::new(defaults::MAX_UPLOAD_BYTES))
        .with_state(state)
}
