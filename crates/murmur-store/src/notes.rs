//! PostgreSQL note store implementation.

use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use murmur_core::{new_v7, Error, InsertNote, Note, NoteImage, NotePatch, NoteStore, Result};

/// PostgreSQL implementation of [`NoteStore`].
///
/// Every single-note query filters on `id AND owner_id`, so a note belonging
/// to another owner is indistinguishable from a missing one.
pub struct PgNoteStore {
    pool: PgPool,
}

impl PgNoteStore {
    /// Create a new PgNoteStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn not_found(id: Uuid) -> Error {
        Error::NotFound(format!("Note {} not found", id))
    }
}

const NOTE_COLUMNS: &str =
    "id, owner_id, title, content, is_audio, audio_url, duration, is_favorite, images, created_at";

fn note_from_row(row: &PgRow) -> Result<Note> {
    let images: Vec<NoteImage> = serde_json::from_value(row.get("images"))?;
    Ok(Note {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        title: row.get("title"),
        content: row.get("content"),
        is_audio: row.get("is_audio"),
        audio_url: row.get("audio_url"),
        duration: row.get("duration"),
        is_favorite: row.get("is_favorite"),
        images,
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl NoteStore for PgNoteStore {
    async fn insert(&self, req: InsertNote) -> Result<Note> {
        let id = new_v7();
        let images = serde_json::to_value(&req.images)?;
        let row = sqlx::query(&format!(
            r#"INSERT INTO note
               (id, owner_id, title, content, is_audio, audio_url, duration, images)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING {NOTE_COLUMNS}"#,
        ))
        .bind(id)
        .bind(req.owner_id)
        .bind(&req.title)
        .bind(&req.content)
        .bind(req.is_audio)
        .bind(&req.audio_url)
        .bind(&req.duration)
        .bind(images)
        .fetch_one(&self.pool)
        .await?;

        note_from_row(&row)
    }

    async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<Note> {
        let row = sqlx::query(&format!(
            "SELECT {NOTE_COLUMNS} FROM note WHERE id = $1 AND owner_id = $2",
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Self::not_found(id))?;

        note_from_row(&row)
    }

    async fn list(&self, owner_id: Uuid) -> Result<Vec<Note>> {
        let rows = sqlx::query(&format!(
            "SELECT {NOTE_COLUMNS} FROM note WHERE owner_id = $1
             ORDER BY created_at DESC, id DESC",
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(note_from_row).collect()
    }

    async fn list_favorites(&self, owner_id: Uuid) -> Result<Vec<Note>> {
        let rows = sqlx::query(&format!(
            "SELECT {NOTE_COLUMNS} FROM note WHERE owner_id = $1 AND is_favorite
             ORDER BY created_at DESC, id DESC",
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(note_from_row).collect()
    }

    async fn update(&self, id: Uuid, owner_id: Uuid, patch: NotePatch) -> Result<Note> {
        if patch.is_empty() {
            return self.fetch(id, owner_id).await;
        }

        // $1 = id, $2 = owner_id, dynamic params start at $3.
        let mut updates: Vec<String> = Vec::new();
        let mut param_idx = 3;

        if patch.title.is_some() {
            updates.push(format!("title = ${}", param_idx));
            param_idx += 1;
        }
        if patch.content.is_some() {
            updates.push(format!("content = ${}", param_idx));
            param_idx += 1;
        }
        if patch.is_favorite.is_some() {
            updates.push(format!("is_favorite = ${}", param_idx));
            param_idx += 1;
        }
        if patch.images.is_some() {
            updates.push(format!("images = ${}", param_idx));
            param_idx += 1;
        }
        if patch.audio.is_some() {
            updates.push(format!(
                "is_audio = true, audio_url = ${}, duration = ${}",
                param_idx,
                param_idx + 1
            ));
        }

        let query = format!(
            "UPDATE note SET {} WHERE id = $1 AND owner_id = $2 RETURNING {NOTE_COLUMNS}",
            updates.join(", "),
        );

        let mut q = sqlx::query(&query).bind(id).bind(owner_id);
        if let Some(title) = &patch.title {
            q = q.bind(title);
        }
        if let Some(content) = &patch.content {
            q = q.bind(content);
        }
        if let Some(fav) = patch.is_favorite {
            q = q.bind(fav);
        }
        if let Some(images) = &patch.images {
            q = q.bind(serde_json::to_value(images)?);
        }
        if let Some(audio) = &patch.audio {
            q = q.bind(&audio.audio_url).bind(&audio.duration);
        }

        let row = q
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Self::not_found(id))?;

        note_from_row(&row)
    }

    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM note WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Self::not_found(id));
        }
        Ok(())
    }
}
