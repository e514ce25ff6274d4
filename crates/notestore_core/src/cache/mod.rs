//! Bounded, pin-aware cache of materialized notes.

pub mod note_cache;
