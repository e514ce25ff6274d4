//! Domain model for path-addressed notes.
//!
//! # Responsibility
//! - Define the note record shared by repositories, index, and cache.
//! - Own path normalization and folder-prefix arithmetic.
//!
//! # Invariants
//! - Every note is identified by a stable `NoteId` that never changes.
//! - Paths handed to the index are always normalized.

pub mod actor;
pub mod note;
pub mod path;
