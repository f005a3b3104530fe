//! Data model and external-boundary traits for murmur.
//!
//! The three collaborators the service depends on — the note record store,
//! blob storage, and the credential store — are opaque behind the traits
//! defined here. `murmur-store` ships the PostgreSQL and in-memory
//! implementations; tests inject fresh in-memory ones.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Generate a time-ordered UUIDv7 for store-assigned record ids.
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Format whole seconds as a zero-padded `mm:ss` clock string.
///
/// Durations are stored and displayed in this shape; 60 seconds renders as
/// `01:00`.
pub fn format_mm_ss(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

// =============================================================================
// NOTE
// =============================================================================

/// One captioned image attached to a note. Insertion order is display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteImage {
    pub url: String,
    #[serde(default)]
    pub caption: String,
}

/// A persisted note, owned by exactly one user.
///
/// Invariants:
/// - `title` and `content` are both set before the note is persisted.
/// - `audio_url` and `duration` are either both present or both absent,
///   matching `is_audio`.
/// - `images` never contains two entries with the same url.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Store-assigned id (UUIDv7).
    #[serde(rename = "_id")]
    pub id: Uuid,
    /// Owning user. Not part of the transfer representation.
    #[serde(skip_serializing, default = "Uuid::nil")]
    pub owner_id: Uuid,
    pub title: String,
    pub content: String,
    pub is_audio: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    /// Recording length as `mm:ss`, present iff `is_audio`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    pub is_favorite: bool,
    #[serde(default)]
    pub images: Vec<NoteImage>,
    /// Store-assigned at creation, immutable afterwards.
    pub created_at: DateTime<Utc>,
}

/// Insert request consumed by [`NoteStore::insert`].
///
/// Media has already been uploaded by the time this is built: `audio_url`
/// and `images` carry blob urls, never raw bytes.
#[derive(Debug, Clone)]
pub struct InsertNote {
    pub owner_id: Uuid,
    pub title: String,
    pub content: String,
    pub is_audio: bool,
    pub audio_url: Option<String>,
    pub duration: Option<String>,
    pub images: Vec<NoteImage>,
}

/// Audio replacement applied as a unit: url and duration always move together.
#[derive(Debug, Clone)]
pub struct AudioPatch {
    pub audio_url: String,
    pub duration: String,
}

/// Partial update for [`NoteStore::update`].
///
/// Each `None` means "untouched", never "set to empty". This is the explicit
/// optional-field struct the dynamic "whatever fields are present" update of
/// the wire protocol resolves into.
#[derive(Debug, Clone, Default)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub is_favorite: Option<bool>,
    /// Full replacement image list (already merged and deduplicated).
    pub images: Option<Vec<NoteImage>>,
    /// Replacement audio; sets `is_audio` true.
    pub audio: Option<AudioPatch>,
}

impl NotePatch {
    /// True when the patch would leave the note untouched.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.is_favorite.is_none()
            && self.images.is_none()
            && self.audio.is_none()
    }
}

/// Validate the note-level invariant: title and content both present.
///
/// Content may be an empty transcript only when the caller explicitly says
/// dictation produced none.
pub fn validate_note_fields(title: &str, content: &str, transcript_empty_ok: bool) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::Validation("title is required".into()));
    }
    if content.is_empty() && !transcript_empty_ok {
        return Err(Error::Validation("content is required".into()));
    }
    Ok(())
}

/// Record store boundary: durable document storage for notes.
///
/// Every single-note operation takes `(id, owner_id)` and must treat a note
/// owned by someone else exactly like a missing one, so existence never leaks
/// across owners.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Insert a new note; the store assigns `id` and `created_at`.
    async fn insert(&self, req: InsertNote) -> Result<Note>;

    /// Fetch one note scoped to its owner.
    async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<Note>;

    /// All notes for an owner, newest-first by `created_at`.
    async fn list(&self, owner_id: Uuid) -> Result<Vec<Note>>;

    /// Favorite subset, same ordering as [`NoteStore::list`].
    async fn list_favorites(&self, owner_id: Uuid) -> Result<Vec<Note>>;

    /// Apply a partial update atomically and return the updated note.
    async fn update(&self, id: Uuid, owner_id: Uuid, patch: NotePatch) -> Result<Note>;

    /// Remove the record. Associated blobs are not touched.
    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<()>;
}

// =============================================================================
// BLOB STORAGE
// =============================================================================

/// Blob storage boundary: durable storage for uploaded binary media.
///
/// `put` returns a stable relative url of the form `/uploads/<name>`, where
/// `<name>` is collision-resistant and never derived from user input (only
/// the extension of the filename hint survives).
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write bytes; returns the public url.
    async fn put(&self, filename_hint: &str, data: &[u8]) -> Result<String>;

    /// Read back the bytes for a url previously returned by `put`.
    async fn get(&self, url: &str) -> Result<Vec<u8>>;
}

// =============================================================================
// USERS & AUTHENTICATION
// =============================================================================

/// A registered user. The password hash never leaves the credential store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub username: String,
}

/// Result of a successful signup or signin: the user plus a signed,
/// time-limited bearer token.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub user: User,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Credential store boundary.
///
/// `verify` collapses missing/malformed/expired into one `Unauthorized`
/// error; callers surface all of them as a forced re-login.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Register a new user. Fails with `Validation` if the username is taken.
    async fn signup(&self, username: &str, password: &str) -> Result<Session>;

    /// Verify username/password and issue a fresh token.
    async fn authenticate(&self, username: &str, password: &str) -> Result<Session>;

    /// Resolve a bearer token to the owning user id.
    async fn verify(&self, token: &str) -> Result<Uuid>;
}
