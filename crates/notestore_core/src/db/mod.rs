//! SQLite storage for `SqliteNoteRepository`.
//!
//! # Responsibility
//! - Open note store databases with a busy timeout.
//! - Bring the `notes` table schema up to date before the repository sees
//!   the connection.
//!
//! # Invariants
//! - The schema version lives in `PRAGMA user_version`.
//! - A database written by a newer build is refused, never downgraded.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

/// Result type for database bootstrap.
pub type DbResult<T> = Result<T, DbError>;

/// Failures while opening or migrating a note store database.
#[derive(Debug)]
pub enum DbError {
    /// SQLite rejected an open, pragma, or migration statement.
    Sqlite(rusqlite::Error),
    /// The database was migrated by a newer build.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "note store database error: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "note store schema is at version {db_version}, but this build only knows up to {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
