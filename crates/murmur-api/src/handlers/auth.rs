//! Signup and signin.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use murmur_core::Session;

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Register a new user and return a fresh session.
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<Credentials>,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "username and password are required".to_string(),
        ));
    }
    let session = state
        .credentials
        .signup(req.username.trim(), &req.password)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// Verify credentials and issue a fresh token.
pub async fn signin(
    State(state): State<AppState>,
    Json(req): Json<Credentials>,
) -> Result<Json<Session>, ApiError> {
    let session = state
        .credentials
        .authenticate(req.username.trim(), &req.password)
        .await?;
    Ok(Json(session))
}
