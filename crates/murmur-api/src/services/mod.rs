//! Service layer between HTTP handlers and the store boundaries.

pub mod notes;

pub use notes::{CreateNote, NoteService, UpdateNote};
