//! Note domain model.
//!
//! # Responsibility
//! - Define the canonical note record cached by the manager.
//! - Provide name/folder projections derived from the note path.
//!
//! # Invariants
//! - `id` is stable and never reused for another note.
//! - `path` is unique among existing notes; enforced by the path index,
//!   not by this type.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a note.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type NoteId = Uuid;

/// Path-addressed document record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Stable global ID used by index, cache, and repository.
    pub id: NoteId,
    /// `/`-delimited location; the last segment is the display name.
    pub path: String,
    /// Opaque payload, never interpreted by core.
    pub content: String,
    /// Epoch milliseconds of the last durable save. `0` until first save.
    pub updated_at: i64,
}

impl Note {
    /// Creates a note with a generated stable ID.
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), path, content)
    }

    /// Creates a note with a caller-provided stable ID.
    ///
    /// Used by import and repository read paths where identity already exists.
    pub fn with_id(id: NoteId, path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id,
            path: path.into(),
            content: content.into(),
            updated_at: 0,
        }
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        match self.path.rfind('/') {
            Some(idx) => &self.path[idx + 1..],
            None => self.path.as_str(),
        }
    }

    /// Folder containing this note; `/` for top-level notes.
    pub fn parent_folder(&self) -> &str {
        match self.path.rfind('/') {
            Some(0) | None => "/",
            Some(idx) => &self.path[..idx],
        }
    }
}
