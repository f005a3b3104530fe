//! Note lifecycle service.
//!
//! Sits between the HTTP handlers and the store traits: uploads staged media
//! to blob storage, merges image lists on update, and enforces the note-level
//! invariants before anything touches the record store.
//!
//! Upload ordering is strict: all blob writes complete before the record
//! write starts, so a persisted note never references a missing blob. Blobs
//! written before a failed record write are left behind (accepted leak).

use std::sync::Arc;

use murmur_core::{
    validate_note_fields, AudioPatch, BlobStore, Error, InsertNote, Note, NoteImage, NotePatch,
    NoteStore, Result,
};
use murmur_media::{NewImage, StagedAudio};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Everything needed to persist a new note. Media arrives as staged bytes,
/// not urls; the service uploads them.
#[derive(Debug, Default)]
pub struct CreateNote {
    pub title: String,
    pub content: String,
    pub audio: Option<StagedAudio>,
    pub images: Vec<NewImage>,
}

/// Partial update. `None` fields are untouched. Image changes follow the
/// merge protocol: `existing_images` is the ordered list of survivors (with
/// caption edits applied); when it is `None` and no new images arrive, the
/// image list is left alone entirely.
#[derive(Debug, Default)]
pub struct UpdateNote {
    pub title: Option<String>,
    pub content: Option<String>,
    pub is_favorite: Option<bool>,
    pub existing_images: Option<Vec<NoteImage>>,
    pub new_images: Vec<NewImage>,
    pub audio: Option<StagedAudio>,
}

impl UpdateNote {
    fn touches_images(&self) -> bool {
        self.existing_images.is_some() || !self.new_images.is_empty()
    }
}

/// Orchestrates note CRUD against the injected store boundaries.
#[derive(Clone)]
pub struct NoteService {
    notes: Arc<dyn NoteStore>,
    blobs: Arc<dyn BlobStore>,
}

impl NoteService {
    pub fn new(notes: Arc<dyn NoteStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { notes, blobs }
    }

    /// Create a note. Audio is uploaded first, then images in staged order,
    /// then the record is written.
    pub async fn create(&self, owner_id: Uuid, req: CreateNote) -> Result<Note> {
        let is_audio = req.audio.is_some();
        validate_note_fields(&req.title, &req.content, is_audio)?;

        let (audio_url, duration) = match req.audio {
            Some(audio) => {
                let url = self
                    .blobs
                    .put(murmur_core::defaults::RECORDING_FILENAME, &audio.bytes)
                    .await?;
                (Some(url), Some(audio.duration))
            }
            None => (None, None),
        };

        let images = self.upload_images(req.images).await?;

        let note = self
            .notes
            .insert(InsertNote {
                owner_id,
                title: req.title,
                content: req.content,
                is_audio,
                audio_url,
                duration,
                images: dedup_by_url(images),
            })
            .await?;

        info!(
            op = "create",
            note_id = %note.id,
            owner_id = %owner_id,
            image_count = note.images.len(),
            is_audio = note.is_audio,
            "note created"
        );
        Ok(note)
    }

    pub async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<Note> {
        self.notes.fetch(id, owner_id).await
    }

    /// All of an owner's notes, newest first.
    pub async fn list(&self, owner_id: Uuid) -> Result<Vec<Note>> {
        let notes = self.notes.list(owner_id).await?;
        debug!(
            op = "list",
            owner_id = %owner_id,
            result_count = notes.len(),
            "notes listed"
        );
        Ok(notes)
    }

    /// Favorite subset, same ordering as `list`.
    pub async fn list_favorites(&self, owner_id: Uuid) -> Result<Vec<Note>> {
        let notes = self.notes.list_favorites(owner_id).await?;
        debug!(
            op = "list_favorites",
            owner_id = %owner_id,
            result_count = notes.len(),
            "favorites listed"
        );
        Ok(notes)
    }

    /// Apply a partial update, merging image changes.
    ///
    /// The final image list is the surviving existing entries in their
    /// original relative order (captions already updated by the caller),
    /// followed by new uploads in staged order, deduplicated by url with the
    /// first occurrence winning.
    pub async fn update(&self, id: Uuid, owner_id: Uuid, req: UpdateNote) -> Result<Note> {
        // Ownership check up front; a foreign id fails here as NotFound
        // before any blob is written.
        let current = self.notes.fetch(id, owner_id).await?;

        if let Some(title) = &req.title {
            if title.trim().is_empty() {
                return Err(Error::Validation("title is required".into()));
            }
        }
        if let Some(content) = &req.content {
            if content.is_empty() && !current.is_audio {
                return Err(Error::Validation("content is required".into()));
            }
        }

        let audio = match req.audio {
            Some(ref staged) => {
                let url = self
                    .blobs
                    .put(murmur_core::defaults::RECORDING_FILENAME, &staged.bytes)
                    .await?;
                Some(AudioPatch {
                    audio_url: url,
                    duration: staged.duration.clone(),
                })
            }
            None => None,
        };

        let images = if req.touches_images() {
            let mut merged = req
                .existing_images
                .unwrap_or_else(|| current.images.clone());
            merged.extend(self.upload_images(req.new_images).await?);
            Some(dedup_by_url(merged))
        } else {
            None
        };

        let patch = NotePatch {
            title: req.title,
            content: req.content,
            is_favorite: req.is_favorite,
            images,
            audio,
        };
        let note = self.notes.update(id, owner_id, patch).await?;
        info!(
            op = "update",
            note_id = %id,
            owner_id = %owner_id,
            image_count = note.images.len(),
            "note updated"
        );
        Ok(note)
    }

    /// Flip the favorite flag and return the updated note.
    pub async fn toggle_favorite(&self, id: Uuid, owner_id: Uuid) -> Result<Note> {
        let current = self.notes.fetch(id, owner_id).await?;
        let note = self
            .notes
            .update(
                id,
                owner_id,
                NotePatch {
                    is_favorite: Some(!current.is_favorite),
                    ..Default::default()
                },
            )
            .await?;
        info!(
            op = "toggle_favorite",
            note_id = %id,
            owner_id = %owner_id,
            is_favorite = note.is_favorite,
            "favorite toggled"
        );
        Ok(note)
    }

    /// Delete the record. Referenced blobs are left behind.
    pub async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<()> {
        self.notes.delete(id, owner_id).await?;
        info!(
            op = "delete",
            note_id = %id,
            owner_id = %owner_id,
            "note deleted"
        );
        Ok(())
    }

    async fn upload_images(&self, images: Vec<NewImage>) -> Result<Vec<NoteImage>> {
        let mut uploaded = Vec::with_capacity(images.len());
        for image in images {
            let url = self.blobs.put(&image.filename, &image.bytes).await?;
            uploaded.push(NoteImage {
                url,
                caption: image.caption,
            });
        }
        Ok(uploaded)
    }
}

/// Drop later duplicates of the same url, keeping first-occurrence order.
fn dedup_by_url(images: Vec<NoteImage>) -> Vec<NoteImage> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(images.len());
    for img in images {
        if seen.insert(img.url.clone()) {
            out.push(img);
        } else {
            warn!(blob_url = %img.url, "duplicate image url dropped");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_by_url_first_wins() {
        let images = vec![
            NoteImage {
                url: "/uploads/a".into(),
                caption: "first".into(),
            },
            NoteImage {
                url: "/uploads/b".into(),
                caption: String::new(),
            },
            NoteImage {
                url: "/uploads/a".into(),
                caption: "second".into(),
            },
        ];
        let out = dedup_by_url(images);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].caption, "first");
        assert_eq!(out[1].url, "/uploads/b");
    }
}
