//! Staged media for one editing session.
//!
//! The stager exclusively owns pending media — new images, caption edits,
//! removals of already-persisted images, and at most one audio attachment —
//! until `snapshot()` hands an immutable view to the note service at save
//! time. After a successful save the stager is cleared.

use murmur_core::{Error, NoteImage, Result};

/// An already-persisted image, tracked with a kept/removed flag.
///
/// Marking one removed only drops it from the note's image list on next
/// save; the underlying blob is never deleted (accepted leak, blob garbage
/// collection is out of scope).
#[derive(Debug, Clone)]
pub struct ExistingImage {
    pub url: String,
    pub caption: String,
    pub removed: bool,
}

/// A newly attached image, not yet uploaded.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub caption: String,
}

/// The single pending audio attachment.
#[derive(Debug, Clone)]
pub struct StagedAudio {
    pub bytes: Vec<u8>,
    /// Recording length as `mm:ss`.
    pub duration: String,
}

/// Immutable view handed to the note service at save time.
#[derive(Debug, Clone, Default)]
pub struct MediaSnapshot {
    /// Surviving existing images, original relative order, captions updated.
    pub kept_existing: Vec<NoteImage>,
    /// New images in the order they were staged.
    pub new_images: Vec<NewImage>,
    pub audio: Option<StagedAudio>,
}

/// Holds pending media for one note's editing session.
#[derive(Debug, Default)]
pub struct MediaStager {
    existing: Vec<ExistingImage>,
    new: Vec<NewImage>,
    audio: Option<StagedAudio>,
}

impl MediaStager {
    /// Empty stager for a brand-new note.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stager pre-loaded with a persisted note's current images, for edits.
    pub fn for_note(images: &[NoteImage]) -> Self {
        Self {
            existing: images
                .iter()
                .map(|img| ExistingImage {
                    url: img.url.clone(),
                    caption: img.caption.clone(),
                    removed: false,
                })
                .collect(),
            new: Vec::new(),
            audio: None,
        }
    }

    /// Append new images in call order. Captions start empty.
    pub fn add_images(&mut self, files: impl IntoIterator<Item = (String, Vec<u8>)>) {
        for (filename, bytes) in files {
            self.new.push(NewImage {
                bytes,
                filename,
                caption: String::new(),
            });
        }
    }

    /// Mark an Existing entry removed, or delete a New entry outright.
    pub fn remove_image(&mut self, index: usize, is_existing: bool) -> Result<()> {
        if is_existing {
            let img = self
                .existing
                .get_mut(index)
                .ok_or_else(|| Error::Validation(format!("no existing image at {}", index)))?;
            img.removed = true;
        } else {
            if index >= self.new.len() {
                return Err(Error::Validation(format!("no new image at {}", index)));
            }
            self.new.remove(index);
        }
        Ok(())
    }

    /// Update a caption in place.
    pub fn set_caption(&mut self, index: usize, is_existing: bool, caption: &str) -> Result<()> {
        let slot = if is_existing {
            self.existing
                .get_mut(index)
                .map(|img| &mut img.caption)
                .ok_or_else(|| Error::Validation(format!("no existing image at {}", index)))?
        } else {
            self.new
                .get_mut(index)
                .map(|img| &mut img.caption)
                .ok_or_else(|| Error::Validation(format!("no new image at {}", index)))?
        };
        *slot = caption.to_string();
        Ok(())
    }

    /// Set the pending audio. A note has at most one audio attachment:
    /// attaching twice replaces, never appends.
    pub fn attach_audio(&mut self, bytes: Vec<u8>, duration: String) {
        self.audio = Some(StagedAudio { bytes, duration });
    }

    /// Drop the pending audio without touching images.
    pub fn discard_audio(&mut self) {
        self.audio = None;
    }

    /// True when nothing is staged beyond the unmodified existing list.
    pub fn is_clean(&self) -> bool {
        self.new.is_empty() && self.audio.is_none() && self.existing.iter().all(|i| !i.removed)
    }

    /// Immutable view for the note service.
    pub fn snapshot(&self) -> MediaSnapshot {
        MediaSnapshot {
            kept_existing: self
                .existing
                .iter()
                .filter(|img| !img.removed)
                .map(|img| NoteImage {
                    url: img.url.clone(),
                    caption: img.caption.clone(),
                })
                .collect(),
            new_images: self.new.clone(),
            audio: self.audio.clone(),
        }
    }

    /// Reset after a successful save.
    pub fn clear(&mut self) {
        self.existing.clear();
        self.new.clear();
        self.audio = None;
    }
}
