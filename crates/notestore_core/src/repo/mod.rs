//! Repository adapter contract and implementations.
//!
//! # Responsibility
//! - Define the durable store boundary consumed by `NoteManager`.
//! - Provide in-memory and SQLite-backed adapters.
//!
//! # Invariants
//! - Repositories are keyed by `NoteId`; they never enforce path uniqueness.
//! - Absence is reported as `RepoError::NotFound`, never as an empty note.
//! - Adapters do not retry; retry semantics belong to callers above core.

use crate::db::DbError;
use crate::model::actor::Actor;
use crate::model::note::{Note, NoteId};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod memory;
pub mod sqlite;

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors reported by repository adapters.
#[derive(Debug)]
pub enum RepoError {
    /// No durable entry exists for the id.
    NotFound(NoteId),
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Persisted data cannot be converted into a valid note.
    InvalidData(String),
    /// Adapter-specific I/O failure.
    Backend(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "note not found in repository: {id}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "note repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted note data: {message}"),
            Self::Backend(message) => write!(f, "repository failure: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Lightweight `(id, path)` pair enumerated without loading content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteInfo {
    pub id: NoteId,
    pub path: String,
}

/// Durable note store keyed by id.
///
/// `actor` parameters are passed through for audit; adapters may record them
/// but core never interprets them.
pub trait NoteRepository: Send + Sync {
    /// Loads one note with full content.
    fn load(&self, id: NoteId) -> RepoResult<Note>;
    /// Inserts or overwrites one note. Returns the stored `updated_at`.
    fn save(&self, note: &Note, actor: &Actor) -> RepoResult<i64>;
    /// Deletes one note.
    fn delete(&self, id: NoteId, actor: &Actor) -> RepoResult<()>;
    /// Enumerates every stored note's id and path.
    fn list(&self) -> RepoResult<Vec<NoteInfo>>;

    /// Persists a path change. Returns the stored `updated_at`.
    fn rename(
        &self,
        id: NoteId,
        _old_path: &str,
        new_path: &str,
        actor: &Actor,
    ) -> RepoResult<i64> {
        let mut note = self.load(id)?;
        note.path = new_path.to_string();
        self.save(&note, actor)
    }
}

pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}
