//! In-memory note store.
//!
//! Backs unit and integration tests (which always inject a fresh instance)
//! and the server's `--memory` mode. Semantics mirror the PostgreSQL store:
//! store-assigned ids and timestamps, per-owner scoping on every single-note
//! operation, newest-first listing.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use murmur_core::{new_v7, Error, InsertNote, Note, NotePatch, NoteStore, Result};

/// In-memory implementation of [`NoteStore`].
#[derive(Default)]
pub struct MemoryNoteStore {
    // Insertion order is creation order; listings iterate in reverse so
    // ordering stays stable even when two notes share a timestamp.
    notes: Mutex<Vec<Note>>,
}

impl MemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn not_found(id: Uuid) -> Error {
        Error::NotFound(format!("Note {} not found", id))
    }
}

fn apply_patch(note: &mut Note, patch: NotePatch) {
    if let Some(title) = patch.title {
        note.title = title;
    }
    if let Some(content) = patch.content {
        note.content = content;
    }
    if let Some(fav) = patch.is_favorite {
        note.is_favorite = fav;
    }
    if let Some(images) = patch.images {
        note.images = images;
    }
    if let Some(audio) = patch.audio {
        note.is_audio = true;
        note.audio_url = Some(audio.audio_url);
        note.duration = Some(audio.duration);
    }
}

#[async_trait]
impl NoteStore for MemoryNoteStore {
    async fn insert(&self, req: InsertNote) -> Result<Note> {
        let note = Note {
            id: new_v7(),
            owner_id: req.owner_id,
            title: req.title,
            content: req.content,
            is_audio: req.is_audio,
            audio_url: req.audio_url,
            duration: req.duration,
            is_favorite: false,
            images: req.images,
            created_at: Utc::now(),
        };
        self.notes.lock().unwrap().push(note.clone());
        Ok(note)
    }

    async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<Note> {
        self.notes
            .lock()
            .unwrap()
            .iter()
            .find(|n| n.id == id && n.owner_id == owner_id)
            .cloned()
            .ok_or_else(|| Self::not_found(id))
    }

    async fn list(&self, owner_id: Uuid) -> Result<Vec<Note>> {
        Ok(self
            .notes
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|n| n.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn list_favorites(&self, owner_id: Uuid) -> Result<Vec<Note>> {
        Ok(self
            .notes
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|n| n.owner_id == owner_id && n.is_favorite)
            .cloned()
            .collect())
    }

    async fn update(&self, id: Uuid, owner_id: Uuid, patch: NotePatch) -> Result<Note> {
        let mut notes = self.notes.lock().unwrap();
        let note = notes
            .iter_mut()
            .find(|n| n.id == id && n.owner_id == owner_id)
            .ok_or_else(|| Self::not_found(id))?;
        apply_patch(note, patch);
        Ok(note.clone())
    }

    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<()> {
        let mut notes = self.notes.lock().unwrap();
        let before = notes.len();
        notes.retain(|n| !(n.id == id && n.owner_id == owner_id));
        if notes.len() == before {
            return Err(Self::not_found(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_core::NoteImage;

    fn insert_req(owner: Uuid, title: &str) -> InsertNote {
        InsertNote {
            owner_id: owner,
            title: title.into(),
            content: "body".into(),
            is_audio: false,
            audio_url: None,
            duration: None,
            images: vec![],
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_timestamp() {
        let store = MemoryNoteStore::new();
        let owner = Uuid::new_v4();
        let note = store.insert(insert_req(owner, "first")).await.unwrap();
        assert_ne!(note.id, Uuid::nil());
        assert!(!note.is_favorite);
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let store = MemoryNoteStore::new();
        let owner = Uuid::new_v4();
        store.insert(insert_req(owner, "a")).await.unwrap();
        store.insert(insert_req(owner, "b")).await.unwrap();
        store.insert(insert_req(owner, "c")).await.unwrap();

        let titles: Vec<_> = store
            .list(owner)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.title)
            .collect();
        assert_eq!(titles, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_owner_isolation_on_fetch_update_delete() {
        let store = MemoryNoteStore::new();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let note = store.insert(insert_req(owner, "mine")).await.unwrap();

        assert!(matches!(
            store.fetch(note.id, stranger).await.unwrap_err(),
            Error::NotFound(_)
        ));
        assert!(matches!(
            store
                .update(note.id, stranger, NotePatch::default())
                .await
                .unwrap_err(),
            Error::NotFound(_)
        ));
        assert!(matches!(
            store.delete(note.id, stranger).await.unwrap_err(),
            Error::NotFound(_)
        ));

        // Foreign access attempts leave the note unchanged and fetchable.
        let unchanged = store.fetch(note.id, owner).await.unwrap();
        assert_eq!(unchanged.title, "mine");
    }

    #[tokio::test]
    async fn test_partial_update_leaves_other_fields() {
        let store = MemoryNoteStore::new();
        let owner = Uuid::new_v4();
        let mut req = insert_req(owner, "keep");
        req.images = vec![NoteImage {
            url: "/uploads/a.png".into(),
            caption: "a".into(),
        }];
        let note = store.insert(req).await.unwrap();

        let patch = NotePatch {
            is_favorite: Some(true),
            ..Default::default()
        };
        let updated = store.update(note.id, owner, patch).await.unwrap();
        assert!(updated.is_favorite);
        assert_eq!(updated.title, "keep");
        assert_eq!(updated.content, "body");
        assert_eq!(updated.images.len(), 1);
    }

    #[tokio::test]
    async fn test_audio_patch_sets_all_three_fields() {
        let store = MemoryNoteStore::new();
        let owner = Uuid::new_v4();
        let note = store.insert(insert_req(owner, "t")).await.unwrap();

        let patch = NotePatch {
            audio: Some(murmur_core::AudioPatch {
                audio_url: "/uploads/x.wav".into(),
                duration: "00:31".into(),
            }),
            ..Default::default()
        };
        let updated = store.update(note.id, owner, patch).await.unwrap();
        assert!(updated.is_audio);
        assert_eq!(updated.audio_url.as_deref(), Some("/uploads/x.wav"));
        assert_eq!(updated.duration.as_deref(), Some("00:31"));
    }

    #[tokio::test]
    async fn test_favorites_subset_same_order() {
        let store = MemoryNoteStore::new();
        let owner = Uuid::new_v4();
        let a = store.insert(insert_req(owner, "a")).await.unwrap();
        store.insert(insert_req(owner, "b")).await.unwrap();
        let c = store.insert(insert_req(owner, "c")).await.unwrap();

        for id in [a.id, c.id] {
            store
                .update(
                    id,
                    owner,
                    NotePatch {
                        is_favorite: Some(true),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }

        let favs: Vec<_> = store
            .list_favorites(owner)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.title)
            .collect();
        assert_eq!(favs, vec!["c", "a"]);
    }
}
