//! # murmur-core
//!
//! Core types, traits, and abstractions shared by every murmur crate:
//!
//! - The [`Note`] data model and its wire representation
//! - External-collaborator traits: [`NoteStore`], [`BlobStore`],
//!   [`CredentialStore`]
//! - The [`Error`] taxonomy and [`Result`] alias
//! - Structured logging field constants ([`logging`])
//! - Shared default constants ([`defaults`])

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;

pub use error::{Error, Result};
pub use models::{
    format_mm_ss, new_v7, validate_note_fields, AudioPatch, BlobStore, CredentialStore, InsertNote,
    Note, NoteImage, NotePatch, NoteStore, Session, User,
};
