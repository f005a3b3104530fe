//! Service-level tests over in-memory stores: media upload ordering, the
//! image merge protocol, and owner scoping.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use murmur_api::services::{CreateNote, NoteService, UpdateNote};
use murmur_core::{BlobStore, Error, NoteImage, NoteStore, Result};
use murmur_media::{NewImage, StagedAudio};
use murmur_store::{MemoryBlobStore, MemoryNoteStore};
use uuid::Uuid;

/// Blob store that accepts a fixed number of writes, then fails.
struct FlakyBlobStore {
    inner: MemoryBlobStore,
    allowed: usize,
    puts: AtomicUsize,
}

impl FlakyBlobStore {
    fn failing_after(allowed: usize) -> Self {
        Self {
            inner: MemoryBlobStore::new(),
            allowed,
            puts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl BlobStore for FlakyBlobStore {
    async fn put(&self, filename_hint: &str, data: &[u8]) -> Result<String> {
        let n = self.puts.fetch_add(1, Ordering::SeqCst);
        if n >= self.allowed {
            return Err(Error::Storage("disk full".to_string()));
        }
        self.inner.put(filename_hint, data).await
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        self.inner.get(url).await
    }
}

fn service() -> (NoteService, Arc<MemoryNoteStore>, Arc<MemoryBlobStore>) {
    let notes = Arc::new(MemoryNoteStore::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    let service = NoteService::new(notes.clone(), blobs.clone());
    (service, notes, blobs)
}

fn image(name: &str, caption: &str) -> NewImage {
    NewImage {
        bytes: vec![1, 2, 3],
        filename: name.to_string(),
        caption: caption.to_string(),
    }
}

fn text_note(title: &str, content: &str) -> CreateNote {
    CreateNote {
        title: title.to_string(),
        content: content.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_create_then_list_round_trip() {
    let (service, _, _) = service();
    let owner = Uuid::now_v7();

    let created = service
        .create(owner, text_note("Ideas", "draft"))
        .await
        .unwrap();
    let listed = service.list(owner).await.unwrap();

    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, created.id);
    assert_eq!(listed[0].title, "Ideas");
    assert_eq!(listed[0].content, "draft");
    assert!(!listed[0].is_favorite);
}

#[tokio::test]
async fn test_list_is_newest_first() {
    let (service, _, _) = service();
    let owner = Uuid::now_v7();

    for title in ["first", "second", "third"] {
        service.create(owner, text_note(title, "x")).await.unwrap();
    }

    let titles: Vec<_> = service
        .list(owner)
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.title)
        .collect();
    assert_eq!(titles, vec!["third", "second", "first"]);
}

#[tokio::test]
async fn test_create_audio_note_pairs_url_and_duration() {
    let (service, _, blobs) = service();
    let owner = Uuid::now_v7();

    let note = service
        .create(
            owner,
            CreateNote {
                title: "Voice memo".into(),
                content: String::new(),
                audio: Some(StagedAudio {
                    bytes: vec![0u8; 16],
                    duration: "00:42".into(),
                }),
                images: vec![],
            },
        )
        .await
        .unwrap();

    assert!(note.is_audio);
    assert_eq!(note.duration.as_deref(), Some("00:42"));
    let url = note.audio_url.unwrap();
    assert!(url.starts_with("/uploads/"));
    assert_eq!(blobs.len(), 1);
}

#[tokio::test]
async fn test_create_rejects_empty_title() {
    let (service, _, _) = service();
    let err = service
        .create(Uuid::now_v7(), text_note("   ", "body"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_empty_content_needs_audio() {
    let (service, _, _) = service();
    let owner = Uuid::now_v7();

    let err = service
        .create(owner, text_note("Ideas", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_blob_failure_prevents_record_write() {
    let notes = Arc::new(MemoryNoteStore::new());
    let blobs = Arc::new(FlakyBlobStore::failing_after(0));
    let service = NoteService::new(notes.clone(), blobs);
    let owner = Uuid::now_v7();

    let err = service
        .create(
            owner,
            CreateNote {
                title: "Pics".into(),
                content: "gallery".into(),
                images: vec![image("a.png", "")],
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Storage(_)));
    assert!(notes.list(owner).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_partial_upload_failure_leaves_orphan_but_no_record() {
    let notes = Arc::new(MemoryNoteStore::new());
    let blobs = Arc::new(FlakyBlobStore::failing_after(1));
    let service = NoteService::new(notes.clone(), blobs.clone());
    let owner = Uuid::now_v7();

    let err = service
        .create(
            owner,
            CreateNote {
                title: "Pics".into(),
                content: "gallery".into(),
                images: vec![image("a.png", ""), image("b.png", "")],
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Storage(_)));
    // The first blob went through and is now orphaned; the record never
    // references it.
    assert_eq!(blobs.puts.load(Ordering::SeqCst), 2);
    assert!(notes.list(owner).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_partial_update_leaves_other_fields_untouched() {
    let (service, _, _) = service();
    let owner = Uuid::now_v7();
    let note = service
        .create(owner, text_note("Ideas", "draft"))
        .await
        .unwrap();

    let updated = service
        .update(
            note.id,
            owner,
            UpdateNote {
                is_favorite: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(updated.is_favorite);
    assert_eq!(updated.title, "Ideas");
    assert_eq!(updated.content, "draft");
    assert_eq!(updated.created_at, note.created_at);
}

#[tokio::test]
async fn test_image_merge_keeps_order_and_captions() {
    let (service, _, _) = service();
    let owner = Uuid::now_v7();

    // Start with images A, B, C.
    let note = service
        .create(
            owner,
            CreateNote {
                title: "Trip".into(),
                content: "photos".into(),
                images: vec![image("a.png", "aaa"), image("b.png", ""), image("c.png", "")],
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let urls: Vec<_> = note.images.iter().map(|i| i.url.clone()).collect();

    // Remove B, recaption A, add D.
    let survivors = vec![
        NoteImage {
            url: urls[0].clone(),
            caption: "recaptioned".into(),
        },
        NoteImage {
            url: urls[2].clone(),
            caption: String::new(),
        },
    ];
    let updated = service
        .update(
            note.id,
            owner,
            UpdateNote {
                existing_images: Some(survivors),
                new_images: vec![image("d.png", "fresh")],
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.images.len(), 3);
    assert_eq!(updated.images[0].url, urls[0]);
    assert_eq!(updated.images[0].caption, "recaptioned");
    assert_eq!(updated.images[1].url, urls[2]);
    assert_eq!(updated.images[2].caption, "fresh");
    assert_ne!(updated.images[2].url, urls[1]);
}

#[tokio::test]
async fn test_update_without_image_fields_leaves_images_alone() {
    let (service, _, _) = service();
    let owner = Uuid::now_v7();
    let note = service
        .create(
            owner,
            CreateNote {
                title: "Trip".into(),
                content: "photos".into(),
                images: vec![image("a.png", "keep me")],
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let updated = service
        .update(
            note.id,
            owner,
            UpdateNote {
                content: Some("photos, annotated".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.images.len(), 1);
    assert_eq!(updated.images[0].caption, "keep me");
}

#[tokio::test]
async fn test_update_replaces_audio_as_a_pair() {
    let (service, _, _) = service();
    let owner = Uuid::now_v7();
    let note = service
        .create(owner, text_note("Memo", "typed"))
        .await
        .unwrap();
    assert!(!note.is_audio);

    let updated = service
        .update(
            note.id,
            owner,
            UpdateNote {
                audio: Some(StagedAudio {
                    bytes: vec![9; 8],
                    duration: "00:09".into(),
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(updated.is_audio);
    assert!(updated.audio_url.is_some());
    assert_eq!(updated.duration.as_deref(), Some("00:09"));
}

#[tokio::test]
async fn test_foreign_note_is_not_found_and_uploads_nothing() {
    let (service, _, blobs) = service();
    let owner = Uuid::now_v7();
    let stranger = Uuid::now_v7();
    let note = service
        .create(owner, text_note("Private", "secret"))
        .await
        .unwrap();

    let err = service
        .update(
            note.id,
            stranger,
            UpdateNote {
                new_images: vec![image("spy.png", "")],
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    // Ownership is checked before any blob write.
    assert_eq!(blobs.len(), 0);

    let err = service.delete(note.id, stranger).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(service.list(owner).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_toggle_favorite_round_trip() {
    let (service, _, _) = service();
    let owner = Uuid::now_v7();
    let note = service
        .create(owner, text_note("Ideas", "draft"))
        .await
        .unwrap();

    let on = service.toggle_favorite(note.id, owner).await.unwrap();
    assert!(on.is_favorite);
    assert_eq!(service.list_favorites(owner).await.unwrap().len(), 1);

    let off = service.toggle_favorite(note.id, owner).await.unwrap();
    assert!(!off.is_favorite);
    assert!(service.list_favorites(owner).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_favorites_keep_list_ordering() {
    let (service, _, _) = service();
    let owner = Uuid::now_v7();

    let mut ids = Vec::new();
    for title in ["one", "two", "three"] {
        ids.push(service.create(owner, text_note(title, "x")).await.unwrap().id);
    }
    service.toggle_favorite(ids[0], owner).await.unwrap();
    service.toggle_favorite(ids[2], owner).await.unwrap();

    let titles: Vec<_> = service
        .list_favorites(owner)
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.title)
        .collect();
    // Newest-first, same as the full list.
    assert_eq!(titles, vec!["three", "one"]);
}

#[tokio::test]
async fn test_delete_then_fetch_is_not_found() {
    let (service, _, _) = service();
    let owner = Uuid::now_v7();
    let note = service
        .create(owner, text_note("Gone", "soon"))
        .await
        .unwrap();

    service.delete(note.id, owner).await.unwrap();
    let err = service.fetch(note.id, owner).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    let err = service.delete(note.id, owner).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}
