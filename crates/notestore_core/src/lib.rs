//! Core note store: a bounded, pin-aware note cache over a durable
//! repository, indexed by stable id and by hierarchical path.
//! This crate is the single source of truth for path uniqueness and cache
//! residency invariants.

pub mod cache;
pub mod config;
pub mod db;
pub mod index;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use cache::note_cache::{NoteCache, PinGuard, SharedNote};
pub use config::{ConfigError, NoteStoreConfig, DEFAULT_NOTE_CACHE_THRESHOLD};
pub use index::path_index::{PathChange, PathIndex, PathIndexError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::actor::Actor;
pub use model::note::{Note, NoteId};
pub use model::path::{normalize_folder_path, normalize_note_path, PathError};
pub use repo::memory::InMemoryNoteRepository;
pub use repo::sqlite::SqliteNoteRepository;
pub use repo::{NoteInfo, NoteRepository, RepoError, RepoResult};
pub use service::note_manager::{NoteManager, NoteManagerError, NoteManagerResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
